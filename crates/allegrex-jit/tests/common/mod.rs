//! Shared helpers for allegrex-jit integration tests: a tiny assembler for
//! the encodings the front-end understands, plus mock CPU/backend types.

#![allow(dead_code)]

use allegrex_jit::{
    BlockExit, DispatchBackend, DispatchCpu, ExitReason, FlatCodeBus, IrBlock, IrJit, JitConfig,
};

pub fn jit() -> IrJit {
    IrJit::new(JitConfig::default())
}

/// Op tags of a block's IR, for sequence assertions.
pub fn ops(block: &IrBlock) -> Vec<allegrex_ir::IrOp> {
    block.insts.iter().map(|i| i.op).collect()
}

pub fn bus(base: u32, words: Vec<u32>) -> FlatCodeBus {
    FlatCodeBus::new(base, words)
}

// ---- Assembler ----------------------------------------------------------

pub fn nop() -> u32 {
    0
}

pub fn addu(rd: u32, rs: u32, rt: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | 0x21
}

pub fn addiu(rt: u32, rs: u32, imm: i16) -> u32 {
    (0x09 << 26) | (rs << 21) | (rt << 16) | u32::from(imm as u16)
}

pub fn ori(rt: u32, rs: u32, imm: u16) -> u32 {
    (0x0d << 26) | (rs << 21) | (rt << 16) | u32::from(imm)
}

pub fn lui(rt: u32, imm: u16) -> u32 {
    (0x0f << 26) | (rt << 16) | u32::from(imm)
}

pub fn lw(rt: u32, rs: u32, off: i16) -> u32 {
    (0x23 << 26) | (rs << 21) | (rt << 16) | u32::from(off as u16)
}

pub fn beq(rs: u32, rt: u32, off: i16) -> u32 {
    (0x04 << 26) | (rs << 21) | (rt << 16) | u32::from(off as u16)
}

pub fn bne(rs: u32, rt: u32, off: i16) -> u32 {
    (0x05 << 26) | (rs << 21) | (rt << 16) | u32::from(off as u16)
}

pub fn beql(rs: u32, rt: u32, off: i16) -> u32 {
    (0x14 << 26) | (rs << 21) | (rt << 16) | u32::from(off as u16)
}

pub fn bltzal(rs: u32, off: i16) -> u32 {
    (0x01 << 26) | (rs << 21) | (0x10 << 16) | u32::from(off as u16)
}

pub fn j(target: u32) -> u32 {
    (0x02 << 26) | ((target >> 2) & 0x03ff_ffff)
}

pub fn jal(target: u32) -> u32 {
    (0x03 << 26) | ((target >> 2) & 0x03ff_ffff)
}

pub fn jr(rs: u32) -> u32 {
    (rs << 21) | 0x08
}

pub fn syscall() -> u32 {
    0x0c
}

/// `CTC1 rt, FCR31`: sets the guest rounding mode.
pub fn ctc1_fcr31(rt: u32) -> u32 {
    (0x11 << 26) | (0x06 << 21) | (rt << 16) | (31 << 11)
}

/// COP1 single-precision arithmetic (fmt = S).
pub fn fpu_arith() -> u32 {
    (0x11 << 26) | (0x10 << 21)
}

pub fn vpfxs(value: u32) -> u32 {
    (0x37 << 26) | (value & 0xf_ffff)
}

pub fn vpfxd(value: u32) -> u32 {
    (0x37 << 26) | (2 << 24) | (value & 0xf_ffff)
}

/// VFPU0-group arithmetic: consumes pending prefixes.
pub fn vfpu_arith_eats() -> u32 {
    0x18 << 26
}

/// VFPU4-group instruction: prefix effect undeclared.
pub fn vfpu_arith_unknown() -> u32 {
    0x34 << 26
}

// ---- Mock CPU / backend --------------------------------------------------

#[derive(Debug, Default)]
pub struct TestCpu {
    pub pc: u32,
}

impl TestCpu {
    pub fn at(pc: u32) -> Self {
        Self { pc }
    }
}

impl DispatchCpu for TestCpu {
    fn pc(&self) -> u32 {
        self.pc
    }

    fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }
}

/// Backend that reports a fixed exit and records what it executed.
#[derive(Debug)]
pub struct FixedExitBackend {
    pub exit: BlockExit,
    pub executed: Vec<u32>,
}

impl FixedExitBackend {
    pub fn exiting_to(next_pc: u32) -> Self {
        Self {
            exit: BlockExit {
                next_pc,
                downcount_consumed: 0,
                reason: ExitReason::BlockEnd,
            },
            executed: Vec::new(),
        }
    }
}

impl DispatchBackend for FixedExitBackend {
    type Cpu = TestCpu;

    fn execute(&mut self, _cpu: &mut TestCpu, block: &IrBlock) -> BlockExit {
        self.executed.push(block.start);
        BlockExit {
            downcount_consumed: block.downcount,
            ..self.exit
        }
    }
}
