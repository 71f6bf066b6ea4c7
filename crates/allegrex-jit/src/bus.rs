//! Minimal guest-memory seam used by the translation front-end.
//!
//! The front-end only ever needs to read instruction words; address
//! validation and the full read/write model belong to the surrounding
//! emulator.

use allegrex_mips::{MipsOpcode, INSTR_SIZE};

/// Instruction fetch as seen by the compiler.
///
/// Must be pure: fetching for translation is not a guest-visible access and
/// must not perturb guest state.
pub trait FetchBus {
    fn fetch_instruction(&self, address: u32) -> MipsOpcode;
}

/// Flat, vector-backed code region. Used by unit tests and early bring-up.
///
/// Out-of-range fetches return `NOP` rather than panicking; a runaway block
/// is terminated by its instruction budget, not by the bus.
#[derive(Debug, Clone)]
pub struct FlatCodeBus {
    base: u32,
    words: Vec<u32>,
}

impl FlatCodeBus {
    pub fn new(base: u32, words: Vec<u32>) -> Self {
        Self { base, words }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Overwrite one instruction word (simulates guest self-modifying code).
    pub fn patch(&mut self, address: u32, word: u32) {
        if let Some(idx) = self.index(address) {
            self.words[idx] = word;
        }
    }

    fn index(&self, address: u32) -> Option<usize> {
        let off = address.wrapping_sub(self.base);
        if off % INSTR_SIZE != 0 {
            return None;
        }
        let idx = (off / INSTR_SIZE) as usize;
        (idx < self.words.len()).then_some(idx)
    }
}

impl FetchBus for FlatCodeBus {
    fn fetch_instruction(&self, address: u32) -> MipsOpcode {
        match self.index(address) {
            Some(idx) => MipsOpcode(self.words[idx]),
            None => MipsOpcode::NOP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_and_patch() {
        let mut bus = FlatCodeBus::new(0x1000, vec![1, 2, 3]);
        assert_eq!(bus.fetch_instruction(0x1004), MipsOpcode(2));
        bus.patch(0x1004, 9);
        assert_eq!(bus.fetch_instruction(0x1004), MipsOpcode(9));
        // Out of range reads as NOP.
        assert_eq!(bus.fetch_instruction(0x2000), MipsOpcode::NOP);
    }
}
