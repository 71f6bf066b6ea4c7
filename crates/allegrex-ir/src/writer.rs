use crate::inst::{IrInst, IrOp};

/// Upper bound on constant-pool entries per block.
///
/// Pool indices are carried in 8-bit operand slots, so a block can reference
/// at most 256 distinct constants. The front-end ends a block before the pool
/// can fill (see `BlockLimits` in `allegrex-jit`).
pub const MAX_CONSTANTS: usize = 256;

/// Append-only sink the front-end emits IR into while a block is being
/// compiled. Sealed into a block by [`IrWriter::take`].
#[derive(Debug, Default, Clone)]
pub struct IrWriter {
    insts: Vec<IrInst>,
    constants: Vec<u32>,
}

impl IrWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, op: IrOp, dest: u8, src1: u8, src2: u8) {
        self.insts.push(IrInst::new(op, dest, src1, src2));
    }

    /// Write an op with no operands.
    pub fn write_op(&mut self, op: IrOp) {
        self.write(op, 0, 0, 0);
    }

    /// Intern `value` into the constant pool, returning its index.
    ///
    /// Duplicates are deduplicated, so indices are stable for the lifetime of
    /// the writer (and of the sealed block). Callers must leave headroom; see
    /// [`MAX_CONSTANTS`].
    pub fn add_constant(&mut self, value: u32) -> u8 {
        if let Some(idx) = self.constants.iter().position(|&c| c == value) {
            return idx as u8;
        }
        assert!(
            self.constants.len() < MAX_CONSTANTS,
            "constant pool overflow: block was not terminated in time"
        );
        self.constants.push(value);
        (self.constants.len() - 1) as u8
    }

    pub fn insts(&self) -> &[IrInst] {
        &self.insts
    }

    pub fn constants(&self) -> &[u32] {
        &self.constants
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Remaining constant-pool capacity.
    pub fn constants_headroom(&self) -> usize {
        MAX_CONSTANTS - self.constants.len()
    }

    pub fn clear(&mut self) {
        self.insts.clear();
        self.constants.clear();
    }

    /// Seal the writer, handing the instruction stream and constant pool to
    /// the block that will own them.
    pub fn take(self) -> (Vec<IrInst>, Vec<u32>) {
        (self.insts, self.constants)
    }
}
