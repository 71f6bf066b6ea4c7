//! The per-block compilation front-end.
//!
//! [`BlockTranslator`] consumes guest instructions starting at one address
//! and emits IR until a rule signals block-ending control flow (or the block
//! budget runs out). Rules follow a fixed contract: compiler state in, IR
//! appended, `compiler_pc` already advanced past the instruction being
//! compiled when the rule runs.
//!
//! Delay slots are compiled inline, coupled to their branch. For ordinary
//! branches the slot's IR lands ahead of the exits and executes exactly once
//! on either path; the condition still reads the pre-slot register values,
//! so operands the slot overwrites are latched into scratch slots first.
//! Likely branches nullify the slot when not taken, so they test the
//! inverted condition before the slot instead. A branch encountered
//! *inside* a delay slot is an architecture violation; it is reported (once
//! per class) and degraded to the generic interpret fallback.

use allegrex_ir::{IrOp, IrWriter, TEMP_LHS, TEMP_RHS};
use allegrex_mips::{
    categorize, cycle_estimate, instr_info, written_gpr, InstrCategory, InstrInfo, MipsOpcode,
    VfpuPrefixReg, WrittenGpr, INSTR_SIZE, REG_RA,
};

use crate::bus::FetchBus;
use crate::cache::{BlockFlags, IrBlock};
use crate::config::BlockLimits;
use crate::jit::StickyFlags;
use crate::report::{ViolationClass, ViolationReports};
use crate::state::CompileState;

/// Constant-pool headroom kept in reserve so no single rule (branch + delay
/// slot + prefix flush) can overflow the pool mid-instruction.
const CONSTANT_RESERVE: usize = 16;

pub(crate) struct BlockTranslator<'a, B: FetchBus> {
    bus: &'a B,
    state: CompileState,
    ir: IrWriter,
    flags: &'a mut StickyFlags,
    reports: &'a mut ViolationReports,
    limits: BlockLimits,
}

impl<'a, B: FetchBus> BlockTranslator<'a, B> {
    pub fn new(
        bus: &'a B,
        address: u32,
        flags: &'a mut StickyFlags,
        reports: &'a mut ViolationReports,
        limits: BlockLimits,
    ) -> Self {
        // Once the default-prefix assumption has been retired, blocks start
        // with unknown prefix state instead.
        let assume_default = !flags.default_prefix.acknowledged();
        Self {
            bus,
            state: CompileState::new(address, assume_default),
            ir: IrWriter::new(),
            flags,
            reports,
            limits,
        }
    }

    /// Produce exactly one sealed block.
    pub fn translate(mut self) -> IrBlock {
        let budget = self.limits.max_instrs.max(1);
        while self.state.compiling {
            self.compile_one();
            if self.state.compiling
                && (self.state.num_instructions >= budget
                    || self.ir.constants_headroom() < CONSTANT_RESERVE)
            {
                // Budget exhausted: end the block at the current pc.
                self.state.prefixes.flush(&mut self.ir);
                let c = self.ir.add_constant(self.state.compiler_pc);
                self.ir.write(IrOp::ExitToConst, 0, c, 0);
                self.state.compiling = false;
            }
        }
        debug_assert!(
            !self.state.in_delay_slot,
            "sealed a block with an unresolved delay slot"
        );

        // A live (or unknowable) prefix at block end while we assumed default
        // prefixes means every such block is suspect; record the observation
        // for the supervisor.
        if self.state.started_default_prefix && self.state.prefixes.may_have_prefix() {
            self.flags.default_prefix.mark_observed();
        }

        let mut flags = BlockFlags::empty();
        if self.state.started_default_prefix {
            flags |= BlockFlags::DEFAULT_PREFIXES_ASSUMED;
        }
        if self.state.rounding_checked {
            flags |= BlockFlags::ROUNDING_CHECKS;
        }

        let (insts, constants) = self.ir.take();
        IrBlock {
            start: self.state.block_start,
            guest_byte_len: self.state.guest_byte_len(),
            num_instructions: self.state.num_instructions,
            downcount: self.state.downcount,
            flags,
            insts,
            constants,
        }
    }

    /// Fetch, account and compile the instruction at `compiler_pc`.
    fn compile_one(&mut self) {
        let op = self.bus.fetch_instruction(self.state.compiler_pc);
        self.state.compiler_pc = self.state.compiler_pc.wrapping_add(INSTR_SIZE);
        self.state.num_instructions += 1;
        self.state.downcount = self.state.downcount.saturating_add(cycle_estimate(op));
        self.compile_op(op);
    }

    fn compile_op(&mut self, op: MipsOpcode) {
        match categorize(op) {
            InstrCategory::AluReg => self.comp_alu_reg(op),
            InstrCategory::AluImm => self.comp_alu_imm(op),
            InstrCategory::Branch { likely, link } => self.comp_branch(op, likely, link),
            InstrCategory::Jump { link } => self.comp_jump(op, link),
            InstrCategory::JumpReg { link } => self.comp_jump_reg(op, link),
            InstrCategory::Syscall => self.comp_syscall(op),
            InstrCategory::Break => self.comp_break(),
            InstrCategory::FpuCtrl => self.comp_fpu_ctrl(op),
            InstrCategory::Vfpu => self.comp_vfpu(op),
            InstrCategory::VfpuPrefix(reg) => self.comp_vfpu_prefix(op, reg),
            InstrCategory::Fpu => self.comp_fpu(op),
            InstrCategory::LoadStore | InstrCategory::Unknown => self.comp_generic(op),
        }
    }

    /// Compile the instruction following a branch as logically part of it.
    fn compile_delay_slot(&mut self) {
        self.state.in_delay_slot = true;
        self.compile_one();
        self.state.in_delay_slot = false;
    }

    /// Consume the next instruction without translating it (fused patterns).
    fn eat_instruction(&mut self, op: MipsOpcode) {
        if instr_info(op).contains(InstrInfo::DELAY_SLOT) {
            self.reports
                .report(ViolationClass::AteDelaySlotOp, self.state.compiler_pc);
        }
        if self.state.in_delay_slot {
            self.reports
                .report(ViolationClass::AteInDelaySlot, self.state.compiler_pc);
        }
        self.state.compiler_pc = self.state.compiler_pc.wrapping_add(INSTR_SIZE);
        self.state.num_instructions += 1;
        self.state.downcount = self.state.downcount.saturating_add(cycle_estimate(op));
    }

    // ---- Rules ----------------------------------------------------------

    fn comp_alu_reg(&mut self, op: MipsOpcode) {
        let rd = op.rd();
        if rd == 0 {
            // Writes to $zero are architectural no-ops (this covers NOP).
            return;
        }
        let ir_op = match op.funct() {
            0x20 | 0x21 => IrOp::Add,
            0x22 | 0x23 => IrOp::Sub,
            0x24 => IrOp::And,
            0x25 => IrOp::Or,
            0x26 => IrOp::Xor,
            _ => return self.comp_generic(op),
        };
        self.ir.write(ir_op, rd, op.rs(), op.rt());
    }

    fn comp_alu_imm(&mut self, op: MipsOpcode) {
        let rt = op.rt();
        if rt == 0 {
            return;
        }
        match op.primary() {
            // addi/addiu: no overflow trap emulation.
            0x08 | 0x09 => {
                let c = self.ir.add_constant(op.simm16() as u32);
                self.ir.write(IrOp::AddConst, rt, op.rs(), c);
            }
            0x0a => {
                let c = self.ir.add_constant(op.simm16() as u32);
                self.ir.write(IrOp::SltConst, rt, op.rs(), c);
            }
            0x0c => {
                let c = self.ir.add_constant(u32::from(op.imm16()));
                self.ir.write(IrOp::AndConst, rt, op.rs(), c);
            }
            0x0d => {
                let c = self.ir.add_constant(u32::from(op.imm16()));
                self.ir.write(IrOp::OrConst, rt, op.rs(), c);
            }
            0x0e => {
                let c = self.ir.add_constant(u32::from(op.imm16()));
                self.ir.write(IrOp::XorConst, rt, op.rs(), c);
            }
            0x0f => self.comp_lui(op),
            _ => self.comp_generic(op),
        }
    }

    /// `LUI`, fusing a following `ORI rt, rt, lo` into one constant load.
    fn comp_lui(&mut self, op: MipsOpcode) {
        let rt = op.rt();
        let hi = u32::from(op.imm16()) << 16;
        let next = self.bus.fetch_instruction(self.state.compiler_pc);
        let fusable = !self.state.in_delay_slot
            && next.primary() == 0x0d
            && next.rs() == rt
            && next.rt() == rt;
        let value = if fusable {
            hi | u32::from(next.imm16())
        } else {
            hi
        };
        let c = self.ir.add_constant(value);
        self.ir.write(IrOp::SetConst, rt, c, 0);
        if fusable {
            self.eat_instruction(next);
        }
    }

    fn comp_branch(&mut self, op: MipsOpcode, likely: bool, link: bool) {
        if self.state.in_delay_slot {
            self.reports.report(
                ViolationClass::BranchInDelaySlot,
                self.state.compiler_pc.wrapping_sub(INSTR_SIZE),
            );
            return self.comp_generic(op);
        }

        // Target is relative to the delay-slot address, which is where
        // `compiler_pc` points right now.
        let target = self
            .state
            .compiler_pc
            .wrapping_add((op.simm16() << 2) as u32);
        let fallthrough = self.state.compiler_pc.wrapping_add(INSTR_SIZE);
        let (taken, not_taken, compares_rt) = branch_condition(op);
        let (mut rs, mut rt) = (op.rs(), if compares_rt { op.rt() } else { 0 });

        if link {
            // $ra is written when the branch executes, taken or not.
            let c = self.ir.add_constant(fallthrough);
            self.ir.write(IrOp::SetConst, REG_RA, c, 0);
        }

        if likely {
            // The slot is nullified on the not-taken path: test the
            // inverted condition first, then the slot runs taken-only.
            self.state.prefixes.flush(&mut self.ir);
            let f = self.ir.add_constant(fallthrough);
            self.ir.write(not_taken, f, rs, rt);
            self.compile_delay_slot();
            self.state.prefixes.flush(&mut self.ir);
            let t = self.ir.add_constant(target);
            self.ir.write(IrOp::ExitToConst, 0, t, 0);
        } else {
            // The slot's IR runs before the condition is tested, but the
            // condition must read the pre-slot register values. Latch the
            // operands when the slot writes (or may write) one of them.
            let slot = self.bus.fetch_instruction(self.state.compiler_pc);
            if clobbers(slot, rs) || (compares_rt && clobbers(slot, rt)) {
                self.ir.write(IrOp::Mov, TEMP_LHS, rs, 0);
                rs = TEMP_LHS;
                if compares_rt {
                    self.ir.write(IrOp::Mov, TEMP_RHS, rt, 0);
                    rt = TEMP_RHS;
                }
            }
            self.compile_delay_slot();
            self.state.prefixes.flush(&mut self.ir);
            let t = self.ir.add_constant(target);
            self.ir.write(taken, t, rs, rt);
            let f = self.ir.add_constant(fallthrough);
            self.ir.write(IrOp::ExitToConst, 0, f, 0);
        }
        self.state.compiling = false;
    }

    fn comp_jump(&mut self, op: MipsOpcode, link: bool) {
        if self.state.in_delay_slot {
            self.reports.report(
                ViolationClass::BranchInDelaySlot,
                self.state.compiler_pc.wrapping_sub(INSTR_SIZE),
            );
            return self.comp_generic(op);
        }

        let target = op.jump_target(self.state.compiler_pc);
        if link {
            // $ra is written when the jump itself executes, before the slot.
            let c = self.ir.add_constant(self.state.compiler_pc.wrapping_add(INSTR_SIZE));
            self.ir.write(IrOp::SetConst, REG_RA, c, 0);
        }
        self.compile_delay_slot();
        self.state.prefixes.flush(&mut self.ir);
        let c = self.ir.add_constant(target);
        self.ir.write(IrOp::ExitToConst, 0, c, 0);
        self.state.compiling = false;
    }

    fn comp_jump_reg(&mut self, op: MipsOpcode, link: bool) {
        if self.state.in_delay_slot {
            self.reports.report(
                ViolationClass::BranchInDelaySlot,
                self.state.compiler_pc.wrapping_sub(INSTR_SIZE),
            );
            return self.comp_generic(op);
        }

        // The jump register is read before the slot executes; latch it when
        // the slot overwrites it.
        let mut rs = op.rs();
        let slot = self.bus.fetch_instruction(self.state.compiler_pc);
        if clobbers(slot, rs) {
            self.ir.write(IrOp::Mov, TEMP_LHS, rs, 0);
            rs = TEMP_LHS;
        }
        if link && op.rd() != 0 {
            let c = self.ir.add_constant(self.state.compiler_pc.wrapping_add(INSTR_SIZE));
            self.ir.write(IrOp::SetConst, op.rd(), c, 0);
        }
        self.compile_delay_slot();
        self.state.prefixes.flush(&mut self.ir);
        self.ir.write(IrOp::ExitToReg, 0, rs, 0);
        self.state.compiling = false;
    }

    fn comp_syscall(&mut self, op: MipsOpcode) {
        if self.state.in_delay_slot {
            self.reports.report(
                ViolationClass::BranchInDelaySlot,
                self.state.compiler_pc.wrapping_sub(INSTR_SIZE),
            );
            return self.comp_generic(op);
        }

        self.state.prefixes.flush(&mut self.ir);
        self.restore_rounding_mode(false);
        let c = self.ir.add_constant(op.0);
        self.ir.write(IrOp::Syscall, 0, c, 0);
        let f = self.ir.add_constant(self.state.compiler_pc);
        self.ir.write(IrOp::ExitToConst, 0, f, 0);
        self.state.compiling = false;
    }

    fn comp_break(&mut self) {
        self.state.prefixes.flush(&mut self.ir);
        self.ir.write_op(IrOp::Breakpoint);
        // Stop at the break itself so the surrounding debugger sees it.
        let c = self
            .ir
            .add_constant(self.state.compiler_pc.wrapping_sub(INSTR_SIZE));
        self.ir.write(IrOp::ExitToConst, 0, c, 0);
        self.state.compiling = false;
    }

    /// `CTC1`: writing FCR31 changes the guest rounding mode, which is the
    /// canonical sticky-flag observation.
    fn comp_fpu_ctrl(&mut self, op: MipsOpcode) {
        if op.rd() != 31 {
            return self.comp_generic(op);
        }
        self.flags.rounding.mark_observed();
        self.comp_generic(op);
        self.ir.write_op(IrOp::UpdateRoundingMode);
        self.state.rounding_checked = true;
    }

    /// COP1 arithmetic: make sure the host FPU runs in the guest's rounding
    /// mode before the instruction executes.
    fn comp_fpu(&mut self, op: MipsOpcode) {
        self.apply_rounding_mode(false);
        self.comp_generic(op);
    }

    /// VFPU instruction without a dedicated rule: prefixes must be
    /// architecturally visible before the interpreter sees the instruction.
    fn comp_vfpu(&mut self, op: MipsOpcode) {
        let info = instr_info(op);
        if !info.contains(InstrInfo::VFPU_NO_PREFIX) {
            self.state.prefixes.flush(&mut self.ir);
        }
        let c = self.ir.add_constant(op.0);
        self.ir.write(IrOp::Interpret, 0, c, 0);
        if info.contains(InstrInfo::VFPU_NO_PREFIX) {
            return;
        }
        if info.contains(InstrInfo::OUT_EAT_PREFIX) {
            // The instruction applied and reset the prefixes.
            self.state.prefixes.eaten();
        } else {
            // We cannot tell what it did to them.
            self.state.prefixes.set_all_unknown();
        }
    }

    fn comp_vfpu_prefix(&mut self, op: MipsOpcode, reg: VfpuPrefixReg) {
        let value = op.0 & 0xf_ffff;
        let prefix = match reg {
            VfpuPrefixReg::S => &mut self.state.prefixes.s,
            VfpuPrefixReg::T => &mut self.state.prefixes.t,
            VfpuPrefixReg::D => &mut self.state.prefixes.d,
        };
        prefix.set_value(value);
    }

    /// Fallback: interpret one guest instruction.
    fn comp_generic(&mut self, op: MipsOpcode) {
        let c = self.ir.add_constant(op.0);
        self.ir.write(IrOp::Interpret, 0, c, 0);
        let info = instr_info(op);
        if info.contains(InstrInfo::IS_VFPU)
            && !info.contains(InstrInfo::VFPU_NO_PREFIX)
            && !info.contains(InstrInfo::OUT_EAT_PREFIX)
        {
            self.state.prefixes.set_all_unknown();
        }
    }

    /// Emit a host-rounding-mode restore, skipped while the guest has never
    /// set an interesting rounding mode.
    fn restore_rounding_mode(&mut self, force: bool) {
        if force || self.flags.rounding.observed() {
            self.ir.write_op(IrOp::RestoreRoundingMode);
            self.state.rounding_checked = true;
        }
    }

    /// Emit a guest-rounding-mode apply, with the same gating.
    fn apply_rounding_mode(&mut self, force: bool) {
        if force || self.flags.rounding.observed() {
            self.ir.write_op(IrOp::ApplyRoundingMode);
            self.state.rounding_checked = true;
        }
    }
}

/// Taken and inverted exit ops for a branch encoding, plus whether the
/// compare reads `rt`.
fn branch_condition(op: MipsOpcode) -> (IrOp, IrOp, bool) {
    match op.primary() {
        0x04 | 0x14 => (IrOp::ExitToConstIfEq, IrOp::ExitToConstIfNeq, true),
        0x05 | 0x15 => (IrOp::ExitToConstIfNeq, IrOp::ExitToConstIfEq, true),
        0x06 | 0x16 => (IrOp::ExitToConstIfLeZ, IrOp::ExitToConstIfGtZ, false),
        0x07 | 0x17 => (IrOp::ExitToConstIfGtZ, IrOp::ExitToConstIfLeZ, false),
        // REGIMM: even rt encodings are the BLTZ family, odd the BGEZ
        // family.
        _ => {
            if op.rt() & 1 == 0 {
                (IrOp::ExitToConstIfLtZ, IrOp::ExitToConstIfGeZ, false)
            } else {
                (IrOp::ExitToConstIfGeZ, IrOp::ExitToConstIfLtZ, false)
            }
        }
    }
}

/// Whether `op` may write `reg` (conservative for encodings whose GPR
/// effect the tables cannot see).
fn clobbers(op: MipsOpcode, reg: u8) -> bool {
    if reg == 0 {
        return false;
    }
    match written_gpr(op) {
        WrittenGpr::None => false,
        WrittenGpr::Reg(r) => r == reg,
        WrittenGpr::Unknown => true,
    }
}
