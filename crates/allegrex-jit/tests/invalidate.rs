mod common;

use allegrex_ir::IrOp;
use allegrex_jit::{FlatCodeBus, IrBlock, IrJit};
use common::*;

const BASE: u32 = 0x0880_1000;
const OTHER: u32 = 0x0880_1100;

fn compiled(jit: &mut IrJit, bus: &FlatCodeBus, address: u32) -> IrBlock {
    let handle = jit.compile(bus, address).unwrap();
    jit.block(handle).unwrap().clone()
}

/// 16-byte block at BASE, another at OTHER, NOP-padded in between.
fn two_block_bus() -> FlatCodeBus {
    let mut words = vec![nop(); 0x48];
    let a = [addiu(1, 1, 1), addiu(2, 2, 2), jr(31), nop()];
    let b = [addiu(3, 3, 3), addiu(4, 4, 4), jr(31), nop()];
    words[..4].copy_from_slice(&a);
    words[0x40..0x44].copy_from_slice(&b);
    FlatCodeBus::new(BASE, words)
}

#[test]
fn overlapping_range_destroys_the_block() {
    let bus = two_block_bus();
    let mut jit = jit();
    let a = jit.compile(&bus, BASE).unwrap();
    let b = jit.compile(&bus, OTHER).unwrap();

    // Touch only the last instruction of the first block.
    jit.invalidate_range(BASE + 12, 4);

    assert!(jit.lookup(BASE).is_none());
    assert!(jit.block(a).is_none(), "stale handle must not resolve");
    assert!(jit.lookup(OTHER).is_some());
    assert!(jit.block(b).is_some());
}

#[test]
fn disjoint_range_leaves_the_block_alone() {
    let bus = two_block_bus();
    let mut jit = jit();
    let a = jit.compile(&bus, BASE).unwrap();

    // Just past the block's 16-byte footprint.
    jit.invalidate_range(BASE + 16, 16);
    assert!(jit.block(a).is_some());

    // Zero-length ranges are no-ops.
    jit.invalidate_range(BASE, 0);
    assert!(jit.block(a).is_some());
}

#[test]
fn patched_code_recompiles_fresh_after_invalidation() {
    let mut bus = two_block_bus();
    let mut jit = jit();

    let before = compiled(&mut jit, &bus, BASE);
    assert_eq!(before.constants[before.insts[0].src2 as usize], 1);

    // Guest self-modifies the first instruction.
    bus.patch(BASE, addiu(1, 1, 9));
    jit.invalidate_range(BASE, 4);
    assert!(jit.lookup(BASE).is_none());

    let after = compiled(&mut jit, &bus, BASE);
    assert_eq!(after.insts[0].op, IrOp::AddConst);
    assert_eq!(after.constants[after.insts[0].src2 as usize], 9);
}

#[test]
fn clear_drops_every_block() {
    let bus = two_block_bus();
    let mut jit = jit();
    let a = jit.compile(&bus, BASE).unwrap();
    let b = jit.compile(&bus, OTHER).unwrap();
    assert_eq!(jit.num_blocks(), 2);

    jit.clear();
    assert_eq!(jit.num_blocks(), 0);
    assert!(jit.block(a).is_none());
    assert!(jit.block(b).is_none());

    // The cache repopulates on demand.
    jit.compile(&bus, BASE).unwrap();
    assert_eq!(jit.num_blocks(), 1);
}

#[test]
fn invalidation_covers_page_straddling_blocks() {
    // Block footprint crosses the 4 KiB page boundary at 0x0880_2000.
    let start = 0x0880_1ff8;
    let bus = FlatCodeBus::new(start, vec![addiu(1, 1, 1), addiu(2, 2, 2), jr(31), nop()]);
    let mut jit = jit();
    let handle = jit.compile(&bus, start).unwrap();

    // Invalidate bytes only on the far side of the boundary.
    jit.invalidate_range(0x0880_2000, 4);
    assert!(jit.block(handle).is_none());
}
