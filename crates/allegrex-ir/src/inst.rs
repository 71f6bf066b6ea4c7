/// Operation tag for a single IR instruction.
///
/// Operand slot conventions are documented per variant; `c(x)` means "operand
/// `x` is a constant-pool index". The set below covers what the translation
/// front-end itself emits. Per-guest-opcode arithmetic beyond this is routed
/// through [`IrOp::Interpret`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IrOp {
    Nop,
    /// `dest = constants[c(src1)]`
    SetConst,
    /// `dest = src1`
    Mov,
    /// `dest = src1 + src2`
    Add,
    /// `dest = src1 - src2`
    Sub,
    /// `dest = src1 & src2`
    And,
    /// `dest = src1 | src2`
    Or,
    /// `dest = src1 ^ src2`
    Xor,
    /// `dest = src1 + constants[c(src2)]` (sign-extended immediate)
    AddConst,
    /// `dest = src1 & constants[c(src2)]`
    AndConst,
    /// `dest = src1 | constants[c(src2)]`
    OrConst,
    /// `dest = src1 ^ constants[c(src2)]`
    XorConst,
    /// `dest = (src1 < src2) ? 1 : 0`, signed
    SltConst,
    /// Write `constants[c(src1)]` into VFPU control register `dest`.
    ///
    /// This is how pending vector-prefix state is materialized before an
    /// instruction that consumes vector operands, and at block end.
    SetVfpuCtrl,
    /// Switch the host FPU back to the host's default rounding mode.
    RestoreRoundingMode,
    /// Switch the host FPU to the guest's current rounding mode.
    ApplyRoundingMode,
    /// Recompute the cached host rounding state from the guest FCR31 value.
    UpdateRoundingMode,
    /// Fall back to interpreting one guest instruction; `c(src1)` holds the
    /// raw 32-bit encoding.
    Interpret,
    /// Guest syscall; `c(src1)` holds the raw encoding.
    Syscall,
    /// Charge `constants[c(src1)]` cycles against the scheduler downcount.
    Downcount,
    /// Unconditional exit to guest address `constants[c(src1)]`.
    ExitToConst,
    /// Exit to the guest address held in register `src1`.
    ExitToReg,
    /// Exit to `constants[c(dest)]` if `src1 == src2`.
    ExitToConstIfEq,
    /// Exit to `constants[c(dest)]` if `src1 != src2`.
    ExitToConstIfNeq,
    /// Exit to `constants[c(dest)]` if `src1 < 0` (signed).
    ExitToConstIfLtZ,
    /// Exit to `constants[c(dest)]` if `src1 <= 0` (signed).
    ExitToConstIfLeZ,
    /// Exit to `constants[c(dest)]` if `src1 > 0` (signed).
    ExitToConstIfGtZ,
    /// Exit to `constants[c(dest)]` if `src1 >= 0` (signed).
    ExitToConstIfGeZ,
    Breakpoint,
}

/// Scratch register slots used by the translator to latch values that must
/// be read before a delay slot executes. They sit above the guest register
/// file; execution backends back them like ordinary registers.
pub const TEMP_LHS: u8 = 0xc0;
pub const TEMP_RHS: u8 = 0xc1;

/// One IR instruction: an op tag and three 8-bit operand slots.
///
/// Slots hold guest register numbers, small immediates, or constant-pool
/// indices depending on the op (see [`IrOp`]). Unused slots are zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IrInst {
    pub op: IrOp,
    pub dest: u8,
    pub src1: u8,
    pub src2: u8,
}

impl IrInst {
    pub const fn new(op: IrOp, dest: u8, src1: u8, src2: u8) -> Self {
        Self {
            op,
            dest,
            src1,
            src2,
        }
    }
}
