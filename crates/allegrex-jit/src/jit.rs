//! The recompilation supervisor.
//!
//! Compilation is optimistic: blocks are compiled against the cheap common
//! case (no guest rounding-mode games, default VFPU prefixes at block
//! boundaries). The first time execution proves an assumption wrong, a
//! sticky flag flips, the whole cache is invalidated once, and the requested
//! address is recompiled under the stricter assumption. Sticky flags only
//! ever go false → true within a session, so the heal loop cannot oscillate:
//! each distinct flag costs at most one full-cache pass.

use thiserror::Error;
use tracing::{debug, warn};

use allegrex_ir::disassemble;

use crate::bus::FetchBus;
use crate::cache::{BlockCache, BlockHandle, CacheError, IrBlock};
use crate::config::JitConfig;
use crate::frontend::BlockTranslator;
use crate::report::ViolationReports;

/// One optimistic-compilation assumption with an explicit lifecycle.
///
/// `observed` records that guest behavior contradicting the assumption has
/// been seen; it transitions false → true at most once per session.
/// `acknowledged` records that the cache has been rebuilt with extended
/// checks; it is never cleared within a session. Each flag carries its own
/// invalidation epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StickyFlag {
    observed: bool,
    acknowledged: bool,
    epoch: u32,
}

impl StickyFlag {
    pub fn mark_observed(&mut self) {
        self.observed = true;
    }

    pub fn observed(&self) -> bool {
        self.observed
    }

    pub fn acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    fn pending(&self) -> bool {
        self.observed && !self.acknowledged
    }

    fn acknowledge(&mut self) {
        self.acknowledged = true;
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub(crate) fn restore(observed: bool, acknowledged: bool, epoch: u32) -> Self {
        Self {
            observed,
            acknowledged,
            epoch,
        }
    }
}

/// The engine's sticky translation flags. Owned by [`IrJit`], passed by
/// reference into the front-end so translation never reads ambient state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StickyFlags {
    /// Guest code set a non-default FPU rounding mode.
    pub rounding: StickyFlag,
    /// A block ended with live VFPU prefix state while blocks were being
    /// compiled under the default-prefix assumption.
    pub default_prefix: StickyFlag,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// The translation engine: block cache + sticky flags + compile driver.
#[derive(Debug)]
pub struct IrJit {
    config: JitConfig,
    cache: BlockCache,
    flags: StickyFlags,
    reports: ViolationReports,
    log_blocks: u32,
}

impl IrJit {
    pub fn new(config: JitConfig) -> Self {
        Self {
            cache: BlockCache::new(config.max_blocks),
            flags: StickyFlags::default(),
            reports: ViolationReports::default(),
            log_blocks: config.log_blocks,
            config,
        }
    }

    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    pub fn flags(&self) -> &StickyFlags {
        &self.flags
    }

    pub fn reports(&self) -> &ViolationReports {
        &self.reports
    }

    pub fn num_blocks(&self) -> usize {
        self.cache.num_blocks()
    }

    /// Record that guest code set a rounding mode outside of compilation
    /// (e.g. from the interpreter tier). The next `compile` self-corrects.
    pub fn note_rounding_mode_set(&mut self) {
        self.flags.rounding.mark_observed();
    }

    /// Compile (or return) the block starting at `address`.
    ///
    /// Runs the translate → detect → invalidate → retranslate protocol: if
    /// translation (or anything since the last compile) observed a sticky
    /// flag whose assumption older blocks were compiled under, the whole
    /// cache is cleared once and `address` is recompiled with extended
    /// checks. Self-correction is diagnostic-only; it is never an error.
    pub fn compile<B: FetchBus>(
        &mut self,
        bus: &B,
        address: u32,
    ) -> Result<BlockHandle, CompileError> {
        if let Some(handle) = self.cache.lookup(address) {
            return Ok(handle);
        }

        let handle = self.translate_one(bus, address)?;

        let mut clean_slate = false;
        if self.flags.rounding.pending() {
            warn!("rounding-mode usage detected; rebuilding cache with rounding checks");
            self.flags.rounding.acknowledge();
            clean_slate = true;
        }
        if self.flags.default_prefix.pending() {
            warn!(
                address = format_args!("{address:08x}"),
                "uneaten VFPU prefix at end of block; retiring default-prefix assumption"
            );
            self.flags.default_prefix.acknowledge();
            clean_slate = true;
        }

        if !clean_slate {
            return Ok(handle);
        }

        // Every block compiled under the old assumptions is unsound,
        // including the one we just made.
        self.clear();
        self.translate_one(bus, address).map_err(Into::into)
    }

    pub fn lookup(&self, address: u32) -> Option<BlockHandle> {
        self.cache.lookup(address)
    }

    pub fn block(&self, handle: BlockHandle) -> Option<&IrBlock> {
        self.cache.get(handle)
    }

    /// Guest code in `[address, address + length)` was modified or unmapped.
    pub fn invalidate_range(&mut self, address: u32, length: u32) {
        self.cache.invalidate_range(address, length);
    }

    pub fn clear(&mut self) {
        debug!("clearing the block cache");
        self.cache.clear();
    }

    fn translate_one<B: FetchBus>(
        &mut self,
        bus: &B,
        address: u32,
    ) -> Result<BlockHandle, CompileError> {
        let handle = self.cache.allocate(address)?;
        let block = BlockTranslator::new(
            bus,
            address,
            &mut self.flags,
            &mut self.reports,
            self.config.limits,
        )
        .translate();
        self.log_block(&block);
        self.cache.install(handle, block);
        Ok(handle)
    }

    fn log_block(&mut self, block: &IrBlock) {
        if self.log_blocks == 0 {
            return;
        }
        self.log_blocks -= 1;
        debug!(
            start = format_args!("{:08x}", block.start),
            guest_bytes = block.guest_byte_len,
            ir_len = block.insts.len(),
            downcount = block.downcount,
            "compiled block"
        );
        for inst in &block.insts {
            debug!("  {}", disassemble(inst, &block.constants));
        }
    }

    pub(crate) fn flags_mut(&mut self) -> &mut StickyFlags {
        &mut self.flags
    }
}
