//! Compilation limits and engine configuration.

/// Per-block compilation budget.
///
/// A block normally ends at block-ending control flow; the budget bounds the
/// pathological straight-line case so IR growth stays linear in guest
/// instruction count and the constant pool can never overflow its 8-bit
/// index space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockLimits {
    /// Maximum guest instructions consumed per block (delay slots included).
    pub max_instrs: u32,
}

impl Default for BlockLimits {
    fn default() -> Self {
        Self { max_instrs: 100 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JitConfig {
    /// Hard cap on live blocks; allocation past this is a fatal compile
    /// error, not an eviction.
    pub max_blocks: usize,
    pub limits: BlockLimits,
    /// Dump the next N freshly compiled blocks (guest range + IR listing) at
    /// debug level. Diagnostic aid; zero in normal operation.
    pub log_blocks: u32,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            max_blocks: 65536,
            limits: BlockLimits::default(),
            log_blocks: 0,
        }
    }
}
