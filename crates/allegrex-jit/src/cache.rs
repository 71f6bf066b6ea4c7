//! Ownership of all compiled blocks.
//!
//! The cache is the only persistent home of translated code. It maintains two
//! indices: guest start address → live block (at most one), and guest page →
//! blocks whose footprint touches that page (for range invalidation). Handles
//! are index + generation pairs so a handle to a destroyed block can never
//! resurrect it.

use std::collections::HashMap;

use bitflags::bitflags;
use thiserror::Error;
use tracing::{debug, error};

use allegrex_ir::IrInst;

use crate::PAGE_SHIFT;

bitflags! {
    /// Guest-side-effect assumptions baked into a block at compile time.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BlockFlags: u32 {
        /// Defensive rounding-mode IR was compiled in.
        const ROUNDING_CHECKS = 1 << 0;
        /// Compiled assuming the VFPU prefixes held their default values on
        /// entry.
        const DEFAULT_PREFIXES_ASSUMED = 1 << 1;
    }
}

/// One sealed translation unit. Read-only after installation except for
/// cache bookkeeping.
#[derive(Debug, Clone)]
pub struct IrBlock {
    pub start: u32,
    /// Guest bytes covered, delay slot included.
    pub guest_byte_len: u32,
    pub num_instructions: u32,
    /// Execution-cost estimate charged against the scheduler downcount.
    pub downcount: u32,
    pub flags: BlockFlags,
    pub insts: Vec<IrInst>,
    pub constants: Vec<u32>,
}

impl IrBlock {
    /// Half-open guest footprint `[start, start + len)`.
    pub fn footprint(&self) -> (u32, u32) {
        (self.start, self.start.wrapping_add(self.guest_byte_len))
    }

    fn overlaps(&self, begin: u32, end: u32) -> bool {
        let (s, e) = self.footprint();
        s < end && begin < e
    }
}

/// Stable reference to a live block. Invalidation bumps the slot generation,
/// so stale handles simply stop resolving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    pub index: u32,
    pub generation: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("block cache exhausted ({max_blocks} blocks)")]
    Exhausted { max_blocks: usize },
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    block: Option<IrBlock>,
}

/// Process-wide store of compiled blocks, created once per emulation session.
#[derive(Debug)]
pub struct BlockCache {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_addr: HashMap<u32, u32>,
    by_page: HashMap<u32, Vec<u32>>,
    max_blocks: usize,
}

impl BlockCache {
    pub fn new(max_blocks: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_addr: HashMap::new(),
            by_page: HashMap::new(),
            max_blocks,
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.by_addr.len()
    }

    /// Reserve a slot for a new block starting at `address`.
    ///
    /// If a live block already claims `address` its handle is returned
    /// unchanged; at most one live block exists per start address. Fails
    /// only on exhaustion, leaving existing entries intact.
    pub fn allocate(&mut self, address: u32) -> Result<BlockHandle, CacheError> {
        if let Some(&index) = self.by_addr.get(&address) {
            return Ok(BlockHandle {
                index,
                generation: self.slots[index as usize].generation,
            });
        }

        let index = if let Some(index) = self.free.pop() {
            index
        } else {
            if self.slots.len() >= self.max_blocks {
                error!(
                    max_blocks = self.max_blocks,
                    address, "block cache exhausted"
                );
                return Err(CacheError::Exhausted {
                    max_blocks: self.max_blocks,
                });
            }
            self.slots.push(Slot {
                generation: 0,
                block: None,
            });
            (self.slots.len() - 1) as u32
        };

        self.by_addr.insert(address, index);
        Ok(BlockHandle {
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    /// Seal `block` into the slot reserved by [`BlockCache::allocate`].
    ///
    /// Registers the block in the page index so later range invalidations
    /// find it.
    pub fn install(&mut self, handle: BlockHandle, block: IrBlock) {
        let slot = &mut self.slots[handle.index as usize];
        assert_eq!(
            slot.generation, handle.generation,
            "installing into a stale handle"
        );
        for page in pages_of(block.start, block.guest_byte_len) {
            self.by_page.entry(page).or_default().push(handle.index);
        }
        slot.block = Some(block);
    }

    pub fn lookup(&self, address: u32) -> Option<BlockHandle> {
        let &index = self.by_addr.get(&address)?;
        let slot = &self.slots[index as usize];
        slot.block.as_ref()?;
        Some(BlockHandle {
            index,
            generation: slot.generation,
        })
    }

    /// Resolve a handle, returning `None` if the block has been destroyed.
    pub fn get(&self, handle: BlockHandle) -> Option<&IrBlock> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.block.as_ref()
    }

    /// Destroy every block whose guest footprint intersects the half-open
    /// range `[address, address + length)`.
    ///
    /// Over-invalidation is acceptable; returning stale code is not. The
    /// page index is consulted so unrelated blocks are untouched.
    pub fn invalidate_range(&mut self, address: u32, length: u32) {
        if length == 0 {
            return;
        }
        let end = address.wrapping_add(length);

        let mut victims: Vec<u32> = Vec::new();
        for page in pages_of(address, length) {
            if let Some(indices) = self.by_page.get(&page) {
                victims.extend_from_slice(indices);
            }
        }
        victims.sort_unstable();
        victims.dedup();

        let mut destroyed = 0usize;
        for index in victims {
            let overlaps = self.slots[index as usize]
                .block
                .as_ref()
                .is_some_and(|b| b.overlaps(address, end));
            if overlaps {
                self.destroy(index);
                destroyed += 1;
            }
        }
        if destroyed > 0 {
            debug!(address, length, destroyed, "invalidated block range");
        }
    }

    /// Destroy all blocks unconditionally.
    pub fn clear(&mut self) {
        let indices: Vec<u32> = self.by_addr.values().copied().collect();
        for index in indices {
            self.destroy(index);
        }
        self.by_page.clear();
    }

    fn destroy(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        let Some(block) = slot.block.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.by_addr.remove(&block.start);
        for page in pages_of(block.start, block.guest_byte_len) {
            if let Some(indices) = self.by_page.get_mut(&page) {
                indices.retain(|&i| i != index);
                if indices.is_empty() {
                    self.by_page.remove(&page);
                }
            }
        }
        self.free.push(index);
    }
}

/// Pages touched by the half-open byte range `[address, address + length)`.
fn pages_of(address: u32, length: u32) -> impl Iterator<Item = u32> {
    let first = address >> PAGE_SHIFT;
    let last = if length == 0 {
        first
    } else {
        address.wrapping_add(length - 1) >> PAGE_SHIFT
    };
    first..=last
}
