//! Guest ISA surface for the Allegrex (MIPS32-derived) CPU.
//!
//! This crate carries the constant per-opcode metadata the translation
//! front-end consumes: field accessors on the raw 32-bit encoding, effect
//! flags ([`InstrInfo`]), cycle estimates, and a coarse [`InstrCategory`]
//! decode. The categorization is deliberately shallow: just enough to route
//! an opcode to a translation rule and to recognize block-ending control
//! flow. Nothing here is mutated at runtime.

mod info;
mod opcode;

pub use info::{
    categorize, cycle_estimate, instr_info, written_gpr, InstrCategory, InstrInfo, VfpuPrefixReg,
    WrittenGpr,
};
pub use opcode::MipsOpcode;

/// All Allegrex instructions are 4 bytes.
pub const INSTR_SIZE: u32 = 4;

/// VFPU control-register indices, as seen by `SetVfpuCtrl` IR ops.
pub mod vfpu_ctrl {
    pub const SPREFIX: u8 = 0;
    pub const TPREFIX: u8 = 1;
    pub const DPREFIX: u8 = 2;
}

/// Default (identity) value of the VFPU source/target prefix registers.
pub const VFPU_PREFIX_DEFAULT_ST: u32 = 0xe4;
/// Default value of the VFPU destination prefix register.
pub const VFPU_PREFIX_DEFAULT_D: u32 = 0;

/// The link register written by `JAL`/`JALR`.
pub const REG_RA: u8 = 31;
