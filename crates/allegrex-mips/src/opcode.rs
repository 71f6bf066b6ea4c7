/// One raw 32-bit Allegrex instruction encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MipsOpcode(pub u32);

impl MipsOpcode {
    pub const NOP: MipsOpcode = MipsOpcode(0);

    /// Primary opcode field, bits 31..26.
    #[inline]
    pub fn primary(self) -> u32 {
        self.0 >> 26
    }

    /// `funct` field of SPECIAL-encoded instructions, bits 5..0.
    #[inline]
    pub fn funct(self) -> u32 {
        self.0 & 0x3f
    }

    #[inline]
    pub fn rs(self) -> u8 {
        ((self.0 >> 21) & 0x1f) as u8
    }

    #[inline]
    pub fn rt(self) -> u8 {
        ((self.0 >> 16) & 0x1f) as u8
    }

    #[inline]
    pub fn rd(self) -> u8 {
        ((self.0 >> 11) & 0x1f) as u8
    }

    /// Shift amount field, bits 10..6.
    #[inline]
    pub fn sa(self) -> u8 {
        ((self.0 >> 6) & 0x1f) as u8
    }

    #[inline]
    pub fn imm16(self) -> u16 {
        self.0 as u16
    }

    /// Sign-extended 16-bit immediate.
    #[inline]
    pub fn simm16(self) -> i32 {
        self.0 as u16 as i16 as i32
    }

    /// 26-bit jump target field.
    #[inline]
    pub fn target26(self) -> u32 {
        self.0 & 0x03ff_ffff
    }

    /// Absolute target of a `J`/`JAL` fetched at `pc`: the target field is
    /// word-aligned within the current 256MiB segment.
    #[inline]
    pub fn jump_target(self, pc: u32) -> u32 {
        (pc & 0xf000_0000) | (self.target26() << 2)
    }
}
