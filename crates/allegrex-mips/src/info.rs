use bitflags::bitflags;

use crate::MipsOpcode;

bitflags! {
    /// Per-opcode effect flags consumed by the translation front-end.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct InstrInfo: u32 {
        /// The following instruction executes in this instruction's delay slot.
        const DELAY_SLOT = 1 << 0;
        const IS_BRANCH = 1 << 1;
        const IS_JUMP = 1 << 2;
        const IS_SYSCALL = 1 << 3;
        /// Touches the VFPU and is therefore affected by pending prefixes.
        const IS_VFPU = 1 << 4;
        /// VFPU instruction that ignores prefixes entirely.
        const VFPU_NO_PREFIX = 1 << 5;
        /// VFPU instruction whose translation rule consumes (and resets) the
        /// pending prefixes. VFPU instructions *without* this flag force the
        /// front-end to treat pending prefix state as unknown.
        const OUT_EAT_PREFIX = 1 << 6;
    }
}

/// Which VFPU prefix register a prefix-set instruction writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VfpuPrefixReg {
    S,
    T,
    D,
}

/// Coarse decode of an instruction, just deep enough to pick a translation
/// rule. Full ISA decode is the execution backend's problem, not ours.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstrCategory {
    /// Three-register ALU op (SPECIAL encodings).
    AluReg,
    /// Register-immediate ALU op, including `LUI`.
    AluImm,
    /// Conditional PC-relative branch (with delay slot). Likely forms
    /// nullify the slot on the not-taken path; link forms write `$ra`.
    Branch { likely: bool, link: bool },
    /// `J` / `JAL`.
    Jump { link: bool },
    /// `JR` / `JALR`.
    JumpReg { link: bool },
    Syscall,
    Break,
    /// Any guest memory access; translated generically.
    LoadStore,
    /// Move to FPU control register (`CTC1`); writing FCR31 changes the
    /// guest rounding mode.
    FpuCtrl,
    /// Other COP1 traffic.
    Fpu,
    /// VFPU instruction without a dedicated rule.
    Vfpu,
    /// `VPFXS` / `VPFXT` / `VPFXD`.
    VfpuPrefix(VfpuPrefixReg),
    Unknown,
}

/// Look up the effect flags for `op`. Constant table; never mutated.
pub fn instr_info(op: MipsOpcode) -> InstrInfo {
    match op.primary() {
        0x00 => match op.funct() {
            0x08 => InstrInfo::IS_JUMP | InstrInfo::DELAY_SLOT,
            0x09 => InstrInfo::IS_JUMP | InstrInfo::DELAY_SLOT,
            0x0c => InstrInfo::IS_SYSCALL,
            _ => InstrInfo::empty(),
        },
        // REGIMM: BLTZ/BGEZ plus the likely and and-link variants.
        0x01 => match u32::from(op.rt()) {
            0x00..=0x03 | 0x10..=0x13 => InstrInfo::IS_BRANCH | InstrInfo::DELAY_SLOT,
            _ => InstrInfo::empty(),
        },
        0x02 | 0x03 => InstrInfo::IS_JUMP | InstrInfo::DELAY_SLOT,
        0x04..=0x07 | 0x14..=0x17 => InstrInfo::IS_BRANCH | InstrInfo::DELAY_SLOT,
        // VFPU0..VFPU3 arithmetic: applies and consumes pending prefixes.
        0x18 | 0x19 | 0x1b => InstrInfo::IS_VFPU | InstrInfo::OUT_EAT_PREFIX,
        // VFPU4 group: prefix interaction varies per sub-op; leave the eat
        // flag unset so the front-end stays conservative.
        0x34 => InstrInfo::IS_VFPU,
        // VFPU5 prefix sets: they *produce* prefix state rather than consume
        // it.
        0x37 => InstrInfo::IS_VFPU | InstrInfo::VFPU_NO_PREFIX,
        _ => InstrInfo::empty(),
    }
}

/// Route `op` to a translation rule.
pub fn categorize(op: MipsOpcode) -> InstrCategory {
    match op.primary() {
        0x00 => match op.funct() {
            0x00 | 0x02 | 0x03 => InstrCategory::AluReg, // sll/srl/sra
            0x08 => InstrCategory::JumpReg { link: false },
            0x09 => InstrCategory::JumpReg { link: true },
            0x0c => InstrCategory::Syscall,
            0x0d => InstrCategory::Break,
            0x20..=0x27 | 0x2a | 0x2b => InstrCategory::AluReg,
            _ => InstrCategory::Unknown,
        },
        0x01 => match u32::from(op.rt()) {
            // bltz/bgez
            0x00 | 0x01 => InstrCategory::Branch {
                likely: false,
                link: false,
            },
            // bltzl/bgezl
            0x02 | 0x03 => InstrCategory::Branch {
                likely: true,
                link: false,
            },
            // bltzal/bgezal
            0x10 | 0x11 => InstrCategory::Branch {
                likely: false,
                link: true,
            },
            // bltzall/bgezall
            0x12 | 0x13 => InstrCategory::Branch {
                likely: true,
                link: true,
            },
            _ => InstrCategory::Unknown,
        },
        0x02 => InstrCategory::Jump { link: false },
        0x03 => InstrCategory::Jump { link: true },
        0x04..=0x07 => InstrCategory::Branch {
            likely: false,
            link: false,
        },
        // beql/bnel/blezl/bgtzl
        0x14..=0x17 => InstrCategory::Branch {
            likely: true,
            link: false,
        },
        0x08..=0x0f => InstrCategory::AluImm,
        0x11 => match u32::from(op.rs()) {
            0x06 => InstrCategory::FpuCtrl, // ctc1
            _ => InstrCategory::Fpu,
        },
        0x18 | 0x19 | 0x1b | 0x34 => InstrCategory::Vfpu,
        0x37 => match (op.0 >> 24) & 0x3 {
            0 => InstrCategory::VfpuPrefix(VfpuPrefixReg::S),
            1 => InstrCategory::VfpuPrefix(VfpuPrefixReg::T),
            2 => InstrCategory::VfpuPrefix(VfpuPrefixReg::D),
            _ => InstrCategory::Vfpu,
        },
        0x20..=0x26 | 0x28..=0x2e => InstrCategory::LoadStore,
        0x31 | 0x39 => InstrCategory::LoadStore, // lwc1/swc1
        _ => InstrCategory::Unknown,
    }
}

/// Best-effort answer to "which GPR does `op` write".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrittenGpr {
    None,
    Reg(u8),
    /// The coarse decode cannot tell; callers must assume interference.
    Unknown,
}

/// The GPR written by `op`, as far as the coarse categorization can see.
///
/// Used by the front-end to decide whether a delay slot overwrites a branch
/// operand. Conservative: coprocessor moves into the GPR file and anything
/// uncategorized report `Unknown`.
pub fn written_gpr(op: MipsOpcode) -> WrittenGpr {
    let reg = |r: u8| {
        if r == 0 {
            WrittenGpr::None
        } else {
            WrittenGpr::Reg(r)
        }
    };
    match categorize(op) {
        InstrCategory::AluReg => reg(op.rd()),
        InstrCategory::AluImm => reg(op.rt()),
        InstrCategory::LoadStore => match op.primary() {
            // Loads write rt; stores and the coprocessor loads/stores do
            // not touch the GPR file.
            0x20..=0x26 => reg(op.rt()),
            _ => WrittenGpr::None,
        },
        InstrCategory::Jump { link: true } => WrittenGpr::Reg(crate::REG_RA),
        InstrCategory::JumpReg { link: true } => reg(op.rd()),
        InstrCategory::Branch { link: true, .. } => WrittenGpr::Reg(crate::REG_RA),
        InstrCategory::Branch { .. }
        | InstrCategory::Jump { .. }
        | InstrCategory::JumpReg { .. }
        | InstrCategory::FpuCtrl
        | InstrCategory::VfpuPrefix(_)
        | InstrCategory::Vfpu => WrittenGpr::None,
        // MFC1/CFC1 move into GPRs; syscalls and unknown encodings can
        // clobber at will.
        InstrCategory::Fpu
        | InstrCategory::Syscall
        | InstrCategory::Break
        | InstrCategory::Unknown => WrittenGpr::Unknown,
    }
}

/// Downcount contribution of one instruction.
///
/// Coarse: the scheduler only needs a stable, roughly linear estimate.
pub fn cycle_estimate(op: MipsOpcode) -> u32 {
    match categorize(op) {
        InstrCategory::LoadStore => 2,
        InstrCategory::Vfpu => 2,
        InstrCategory::Syscall => 3,
        _ => 1,
    }
}
