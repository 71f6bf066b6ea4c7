//! Once-per-class reporting of translation policy violations.
//!
//! Policy violations (a branch discovered inside a delay slot, an eaten
//! branch) are recoverable: the front-end degrades to the generic interpret
//! fallback. Each violation class is logged the first time it occurs in a
//! session and then suppressed to avoid flooding.

use tracing::error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationClass {
    BranchInDelaySlot,
    AteDelaySlotOp,
    AteInDelaySlot,
}

#[derive(Debug, Default)]
pub struct ViolationReports {
    branch_in_delay_slot: bool,
    ate_delay_slot_op: bool,
    ate_in_delay_slot: bool,
    count: u32,
}

impl ViolationReports {
    /// Report a violation at `address`. Logs only on the first occurrence of
    /// the class; always counts.
    pub fn report(&mut self, class: ViolationClass, address: u32) {
        self.count = self.count.saturating_add(1);
        let seen = match class {
            ViolationClass::BranchInDelaySlot => &mut self.branch_in_delay_slot,
            ViolationClass::AteDelaySlotOp => &mut self.ate_delay_slot_op,
            ViolationClass::AteInDelaySlot => &mut self.ate_in_delay_slot,
        };
        if *seen {
            return;
        }
        *seen = true;
        match class {
            ViolationClass::BranchInDelaySlot => {
                error!(address = format_args!("{address:08x}"), "branch inside a delay slot")
            }
            ViolationClass::AteDelaySlotOp => {
                error!(address = format_args!("{address:08x}"), "ate a branch op")
            }
            ViolationClass::AteInDelaySlot => error!(
                address = format_args!("{address:08x}"),
                "ate an instruction inside a delay slot"
            ),
        }
    }

    /// Total violations observed (including suppressed ones).
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn seen(&self, class: ViolationClass) -> bool {
        match class {
            ViolationClass::BranchInDelaySlot => self.branch_in_delay_slot,
            ViolationClass::AteDelaySlotOp => self.ate_delay_slot_op,
            ViolationClass::AteInDelaySlot => self.ate_in_delay_slot,
        }
    }
}
