//! Portable IR produced by the Allegrex translation front-end.
//!
//! A compiled block is an ordered sequence of fixed-layout [`IrInst`]s plus a
//! per-block constant pool. Wide immediates never live inside an instruction;
//! they go through the pool and the instruction carries the pool index in one
//! of its operand slots. Instructions are immutable once appended.
//!
//! This crate is pure data: it has no opinion on how the IR is executed. The
//! execution backend (interpreter or host codegen) lives behind the dispatch
//! seam in `allegrex-jit`.

mod disasm;
mod inst;
mod writer;

pub use disasm::disassemble;
pub use inst::{IrInst, IrOp, TEMP_LHS, TEMP_RHS};
pub use writer::{IrWriter, MAX_CONSTANTS};
