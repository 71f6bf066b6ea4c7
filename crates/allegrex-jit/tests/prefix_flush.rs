mod common;

use allegrex_ir::IrOp;
use allegrex_jit::{BlockFlags, IrBlock, IrJit};
use allegrex_mips::vfpu_ctrl;
use common::*;

const BASE: u32 = 0x0880_0000;

fn compiled(jit: &mut IrJit, bus: &allegrex_jit::FlatCodeBus, address: u32) -> IrBlock {
    let handle = jit.compile(bus, address).unwrap();
    jit.block(handle).unwrap().clone()
}

#[test]
fn pending_prefix_is_flushed_before_its_consumer() {
    let bus = bus(
        BASE,
        vec![vpfxs(0x1b), vfpu_arith_eats(), jr(31), nop()],
    );
    let mut jit = jit();
    let block = compiled(&mut jit, &bus, BASE);

    // The control write must land ahead of the consuming instruction.
    assert_eq!(
        ops(&block),
        vec![IrOp::SetVfpuCtrl, IrOp::Interpret, IrOp::ExitToReg]
    );
    let flush = block.insts[0];
    assert_eq!(flush.dest, vfpu_ctrl::SPREFIX);
    assert_eq!(block.constants[flush.src1 as usize], 0x1b);

    // The consumer ate the prefix, so the block ends in the default state
    // and the default-prefix assumption stays sound.
    assert!(!jit.flags().default_prefix.observed());
    assert!(block.flags.contains(BlockFlags::DEFAULT_PREFIXES_ASSUMED));
}

#[test]
fn every_dirty_prefix_is_flushed() {
    let bus = bus(
        BASE,
        vec![vpfxs(0x1b), vpfxd(0x1), vfpu_arith_eats(), jr(31), nop()],
    );
    let mut jit = jit();
    let block = compiled(&mut jit, &bus, BASE);

    assert_eq!(
        ops(&block),
        vec![
            IrOp::SetVfpuCtrl,
            IrOp::SetVfpuCtrl,
            IrOp::Interpret,
            IrOp::ExitToReg
        ]
    );
    assert_eq!(block.insts[0].dest, vfpu_ctrl::SPREFIX);
    assert_eq!(block.insts[1].dest, vfpu_ctrl::DPREFIX);
    assert_eq!(block.constants[block.insts[1].src1 as usize], 0x1);
}

#[test]
fn prefix_live_at_block_end_retires_the_default_assumption() {
    // The prefix is set but nothing consumes it before the block ends.
    let bus = bus(BASE, vec![vpfxs(0x1b), jr(31), nop()]);
    let mut jit = jit();
    let block = compiled(&mut jit, &bus, BASE);

    // The value is still materialized at block end so the next block sees
    // the architectural state.
    assert_eq!(
        ops(&block),
        vec![IrOp::SetVfpuCtrl, IrOp::ExitToReg]
    );

    // The supervisor acknowledged the observation and rebuilt: the block we
    // got back no longer assumes default prefixes.
    assert!(jit.flags().default_prefix.observed());
    assert!(jit.flags().default_prefix.acknowledged());
    assert_eq!(jit.flags().default_prefix.epoch(), 1);
    assert!(!block.flags.contains(BlockFlags::DEFAULT_PREFIXES_ASSUMED));
    assert_eq!(jit.num_blocks(), 1);
}

#[test]
fn undeclared_vfpu_op_forces_conservative_prefix_state() {
    // The 0x34 group does not declare its prefix behavior, so after it the
    // compiler must treat all prefixes as unknown, which counts as a
    // possible live prefix at block end.
    let bus = bus(
        BASE,
        vec![vpfxs(0x1b), vfpu_arith_unknown(), jr(31), nop()],
    );
    let mut jit = jit();
    let block = compiled(&mut jit, &bus, BASE);

    // Flush still happens before the instruction.
    assert_eq!(
        ops(&block),
        vec![IrOp::SetVfpuCtrl, IrOp::Interpret, IrOp::ExitToReg]
    );
    assert!(jit.flags().default_prefix.acknowledged());
    assert!(!block.flags.contains(BlockFlags::DEFAULT_PREFIXES_ASSUMED));
}

#[test]
fn assumption_is_retired_at_most_once() {
    let dirty = bus(BASE, vec![vpfxs(0x1b), jr(31), nop()]);
    let clean = bus(0x0890_0000, vec![addiu(1, 1, 1), jr(31), nop()]);
    let dirty2 = bus(0x08a0_0000, vec![vpfxs(0x0e), jr(31), nop()]);
    let mut jit = jit();

    jit.compile(&dirty, BASE).unwrap();
    assert_eq!(jit.flags().default_prefix.epoch(), 1);

    // Later compiles never trigger another clear, even when prefixes stay
    // live again.
    jit.compile(&clean, 0x0890_0000).unwrap();
    jit.compile(&dirty2, 0x08a0_0000).unwrap();
    assert_eq!(jit.flags().default_prefix.epoch(), 1);
    assert_eq!(jit.num_blocks(), 3);
    assert!(jit.lookup(0x0890_0000).is_some());
}
