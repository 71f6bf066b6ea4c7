//! Dynamic-translation core for the Allegrex CPU.
//!
//! The pipeline is split into explicit stages to avoid ambiguity about who
//! owns what:
//! - [`frontend`]: per-block compilation of guest instructions into
//!   `allegrex-ir`, including delay-slot coupling and VFPU prefix tracking.
//! - [`cache`]: ownership of all compiled blocks, keyed by guest start
//!   address, with range invalidation and full clears.
//! - [`jit`]: the recompilation supervisor. Drives `compile()`, owns the
//!   sticky translation flags, and self-heals the cache when a flag observed
//!   mid-session invalidates earlier compilation assumptions.
//! - [`dispatch`]: the narrow synchronous seam that hands a compiled block to
//!   an execution backend and steps the lookup → compile → execute loop.
//!
//! Compiler state ([`state::CompileState`]) is stack-scoped to one
//! `compile()` call; blocks never hold a reference to it. The only persistent
//! shared state is the block cache and the sticky flags, both owned by
//! [`jit::IrJit`].

pub mod bus;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod frontend;
pub mod jit;
pub mod report;
pub mod snapshot;
pub mod state;

pub use bus::{FetchBus, FlatCodeBus};
pub use cache::{BlockCache, BlockFlags, BlockHandle, CacheError, IrBlock};
pub use config::{BlockLimits, JitConfig};
pub use dispatch::{
    BackendCapabilities, BackendError, BlockExit, DispatchBackend, DispatchCpu, Dispatcher,
    ExitReason, StepOutcome,
};
pub use jit::{CompileError, IrJit, StickyFlag, StickyFlags};
pub use report::{ViolationClass, ViolationReports};
pub use snapshot::SnapshotError;

/// Page granularity of the cache's invalidation index.
pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_SIZE: u32 = 1 << PAGE_SHIFT;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    // Guest instructions are 4 bytes; a block footprint always spans whole
    // instructions, so page-granular invalidation can only over-approximate.
    assert!(PAGE_SIZE % allegrex_mips::INSTR_SIZE == 0);
};
