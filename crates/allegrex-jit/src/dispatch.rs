//! The dispatch seam between the translation engine and an execution
//! backend.
//!
//! [`Dispatcher::step`] is the orchestrating loop's view of this core: look
//! the current address up in the cache, compile on miss, then make the one
//! synchronous [`DispatchBackend::execute`] call. The backend does not
//! return until translated code decides to re-enter the loop (block
//! boundary, guest exception, or an external yield request). On return no
//! compiler state is live and the cache is readable.

use thiserror::Error;
use tracing::error;

use crate::bus::FetchBus;
use crate::cache::{BlockHandle, IrBlock};
use crate::jit::{CompileError, IrJit};

/// The few architectural accessors the dispatcher needs from a guest CPU.
pub trait DispatchCpu {
    fn pc(&self) -> u32;
    fn set_pc(&mut self, pc: u32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// The block ran to one of its exits.
    BlockEnd,
    /// Translated code raised a guest-visible exception.
    GuestException,
    /// The external scheduler asked for control back.
    YieldRequested,
}

/// What translated code reported when it handed control back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockExit {
    pub next_pc: u32,
    /// Cycles actually charged; usually the block's downcount estimate, less
    /// if the block exited early.
    pub downcount_consumed: u32,
    pub reason: ExitReason,
}

/// Execution backend for compiled blocks (IR interpreter, host codegen, …).
pub trait DispatchBackend {
    type Cpu: DispatchCpu;

    /// Run `block` to one of its exits. Synchronous and non-preemptible.
    fn execute(&mut self, cpu: &mut Self::Cpu, block: &IrBlock) -> BlockExit;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend does not support linking translated blocks")]
    LinkingUnsupported,
    #[error("backend does not support native call replacement at {address:#010x}")]
    ReplacementUnsupported { address: u32 },
}

/// Optional backend entry points beyond plain block execution.
///
/// A backend that does not implement an operation must fail loudly, since a
/// silent no-op here would corrupt guest control flow. The defaults decline
/// with a logged error.
pub trait BackendCapabilities {
    /// Patch the exit of `from` to jump directly into `to`.
    fn link_blocks(&mut self, from: BlockHandle, to: BlockHandle) -> Result<(), BackendError> {
        let _ = (from, to);
        error!("block linking requested but not supported by this backend");
        Err(BackendError::LinkingUnsupported)
    }

    /// Replace the guest function at `address` with a native implementation.
    fn replace_call(&mut self, address: u32) -> Result<(), BackendError> {
        error!(
            address = format_args!("{address:08x}"),
            "native call replacement requested but not supported by this backend"
        );
        Err(BackendError::ReplacementUnsupported { address })
    }
}

/// Outcome of one lookup → compile → execute step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub entry: u32,
    /// Whether this step had to compile the block first.
    pub compiled: bool,
    pub exit: BlockExit,
}

/// Ties the translation engine to an execution backend.
pub struct Dispatcher<K: DispatchBackend> {
    jit: IrJit,
    backend: K,
}

impl<K: DispatchBackend> Dispatcher<K> {
    pub fn new(jit: IrJit, backend: K) -> Self {
        Self { jit, backend }
    }

    pub fn jit(&self) -> &IrJit {
        &self.jit
    }

    pub fn jit_mut(&mut self) -> &mut IrJit {
        &mut self.jit
    }

    pub fn backend_mut(&mut self) -> &mut K {
        &mut self.backend
    }

    /// Run one block at the CPU's current pc.
    pub fn step<B: FetchBus>(
        &mut self,
        cpu: &mut K::Cpu,
        bus: &B,
    ) -> Result<StepOutcome, CompileError> {
        let entry = cpu.pc();
        let (handle, compiled) = match self.jit.lookup(entry) {
            Some(handle) => (handle, false),
            None => (self.jit.compile(bus, entry)?, true),
        };
        let block = self
            .jit
            .block(handle)
            .expect("freshly compiled handle resolves");
        let exit = self.backend.execute(cpu, block);
        cpu.set_pc(exit.next_pc);
        Ok(StepOutcome {
            entry,
            compiled,
            exit,
        })
    }
}
