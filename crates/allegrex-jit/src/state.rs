//! Transient per-compilation state.
//!
//! [`CompileState`] exists only while one block is being translated. Every
//! decision it encodes must be materialized into IR or block flags before the
//! block is sealed; nothing here survives a `compile()` call.

use allegrex_ir::IrWriter;
use allegrex_mips::{vfpu_ctrl, VFPU_PREFIX_DEFAULT_D, VFPU_PREFIX_DEFAULT_ST};

/// Tracking for one VFPU prefix register (S, T or D).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VfpuPrefixState {
    value: u32,
    default_value: u32,
    /// We know the architectural value at this point in the block.
    known: bool,
    /// The known value has not yet been materialized as a `SetVfpuCtrl` op.
    dirty: bool,
}

impl VfpuPrefixState {
    fn new(default_value: u32) -> Self {
        Self {
            value: default_value,
            default_value,
            known: true,
            dirty: false,
        }
    }

    /// Reset for a new block, assuming the architectural default value.
    pub fn start_default(&mut self) {
        self.value = self.default_value;
        self.known = true;
        self.dirty = false;
    }

    /// Reset for a new block without assuming anything.
    pub fn start_unknown(&mut self) {
        self.known = false;
        self.dirty = false;
    }

    /// A prefix-set instruction wrote `value`.
    pub fn set_value(&mut self, value: u32) {
        self.value = value;
        self.known = true;
        self.dirty = true;
    }

    /// An instruction may have changed the prefix in a way the compiler
    /// cannot see. Forces conservative treatment for the rest of the block.
    pub fn set_unknown(&mut self) {
        self.known = false;
        self.dirty = false;
    }

    /// A prefix-consuming instruction applied the prefix; the hardware resets
    /// it to the default afterwards.
    pub fn eaten(&mut self) {
        self.value = self.default_value;
        self.known = true;
        self.dirty = false;
    }

    /// A flush is owed for this prefix.
    pub fn needs_flush(&self) -> bool {
        self.known && self.dirty
    }

    /// The prefix may differ from the architectural default at this point.
    pub fn may_have_prefix(&self) -> bool {
        !self.known || self.value != self.default_value
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Mark the owed flush as paid.
    pub fn flushed(&mut self) {
        self.dirty = false;
    }
}

/// All three VFPU prefix registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VfpuPrefixes {
    pub s: VfpuPrefixState,
    pub t: VfpuPrefixState,
    pub d: VfpuPrefixState,
}

impl VfpuPrefixes {
    fn new() -> Self {
        Self {
            s: VfpuPrefixState::new(VFPU_PREFIX_DEFAULT_ST),
            t: VfpuPrefixState::new(VFPU_PREFIX_DEFAULT_ST),
            d: VfpuPrefixState::new(VFPU_PREFIX_DEFAULT_D),
        }
    }

    pub fn start(&mut self, assume_default: bool) {
        if assume_default {
            self.s.start_default();
            self.t.start_default();
            self.d.start_default();
        } else {
            self.s.start_unknown();
            self.t.start_unknown();
            self.d.start_unknown();
        }
    }

    pub fn set_all_unknown(&mut self) {
        self.s.set_unknown();
        self.t.set_unknown();
        self.d.set_unknown();
    }

    pub fn eaten(&mut self) {
        self.s.eaten();
        self.t.eaten();
        self.d.eaten();
    }

    pub fn may_have_prefix(&self) -> bool {
        self.s.may_have_prefix() || self.t.may_have_prefix() || self.d.may_have_prefix()
    }

    /// Materialize every owed prefix as a `SetVfpuCtrl` op.
    pub fn flush(&mut self, ir: &mut IrWriter) {
        for (ctrl, p) in [
            (vfpu_ctrl::SPREFIX, &mut self.s),
            (vfpu_ctrl::TPREFIX, &mut self.t),
            (vfpu_ctrl::DPREFIX, &mut self.d),
        ] {
            if p.needs_flush() {
                let c = ir.add_constant(p.value());
                ir.write(allegrex_ir::IrOp::SetVfpuCtrl, ctrl, c, 0);
                p.flushed();
            }
        }
    }
}

/// Per-pass compiler state. Reset at the start of every block compilation and
/// dead once the block is sealed.
#[derive(Clone, Copy, Debug)]
pub struct CompileState {
    pub block_start: u32,
    /// Address of the *next* instruction to fetch. Advanced before a rule
    /// runs, so during a rule it points past the instruction being compiled.
    pub compiler_pc: u32,
    pub compiling: bool,
    pub in_delay_slot: bool,
    pub num_instructions: u32,
    /// Accumulated execution-cost estimate for the scheduler.
    pub downcount: u32,
    pub prefixes: VfpuPrefixes,
    /// This block was compiled assuming default prefixes on entry.
    pub started_default_prefix: bool,
    /// The block emitted defensive rounding-mode IR.
    pub rounding_checked: bool,
}

impl CompileState {
    pub fn new(block_start: u32, assume_default_prefixes: bool) -> Self {
        let mut prefixes = VfpuPrefixes::new();
        prefixes.start(assume_default_prefixes);
        Self {
            block_start,
            compiler_pc: block_start,
            compiling: true,
            in_delay_slot: false,
            num_instructions: 0,
            downcount: 0,
            prefixes,
            started_default_prefix: assume_default_prefixes,
            rounding_checked: false,
        }
    }

    /// Guest bytes covered so far.
    pub fn guest_byte_len(&self) -> u32 {
        self.compiler_pc.wrapping_sub(self.block_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allegrex_ir::{IrOp, IrWriter};

    #[test]
    fn prefix_flush_only_when_dirty() {
        let mut p = VfpuPrefixes::new();
        p.start(true);
        assert!(!p.may_have_prefix());

        let mut ir = IrWriter::new();
        p.flush(&mut ir);
        assert!(ir.is_empty(), "clean prefixes must not emit IR");

        p.s.set_value(0x1b);
        assert!(p.may_have_prefix());
        p.flush(&mut ir);
        assert_eq!(ir.len(), 1);
        assert_eq!(ir.insts()[0].op, IrOp::SetVfpuCtrl);

        // Flushed state owes nothing further, but the value still differs
        // from the default until eaten.
        p.flush(&mut ir);
        assert_eq!(ir.len(), 1);
        assert!(p.may_have_prefix());

        p.eaten();
        assert!(!p.may_have_prefix());
    }

    #[test]
    fn unknown_prefixes_cannot_be_flushed_but_stay_suspect() {
        let mut p = VfpuPrefixes::new();
        p.start(true);
        p.set_all_unknown();

        let mut ir = IrWriter::new();
        p.flush(&mut ir);
        assert!(ir.is_empty());
        assert!(p.may_have_prefix());
    }

    #[test]
    fn byte_len_follows_pc() {
        let mut st = CompileState::new(0x0880_0000, true);
        assert_eq!(st.guest_byte_len(), 0);
        st.compiler_pc += 16;
        assert_eq!(st.guest_byte_len(), 16);
    }
}
