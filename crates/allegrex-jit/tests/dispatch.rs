mod common;

use allegrex_jit::{
    BackendCapabilities, BackendError, BlockHandle, Dispatcher, ExitReason,
};
use common::*;

const BASE: u32 = 0x0880_0000;

#[test]
fn step_compiles_on_miss_and_reuses_on_hit() {
    let bus = bus(
        BASE,
        vec![addiu(1, 1, 1), addiu(2, 2, 2), j(BASE), nop()],
    );
    let backend = FixedExitBackend::exiting_to(BASE);
    let mut dispatcher = Dispatcher::new(jit(), backend);
    let mut cpu = TestCpu::at(BASE);

    let first = dispatcher.step(&mut cpu, &bus).unwrap();
    assert_eq!(first.entry, BASE);
    assert!(first.compiled);
    assert_eq!(first.exit.reason, ExitReason::BlockEnd);
    assert_eq!(first.exit.downcount_consumed, 4);
    assert_eq!(cpu.pc, BASE);

    // The tight loop re-enters the same block without recompiling.
    let second = dispatcher.step(&mut cpu, &bus).unwrap();
    assert!(!second.compiled);
    assert_eq!(dispatcher.jit().num_blocks(), 1);
    assert_eq!(dispatcher.backend_mut().executed, vec![BASE, BASE]);
}

#[test]
fn step_follows_the_backend_exit_pc() {
    let mut words = vec![nop(); 0x44];
    words[..2].copy_from_slice(&[j(BASE + 0x100), nop()]);
    words[0x40..0x42].copy_from_slice(&[jr(31), nop()]);
    let bus = allegrex_jit::FlatCodeBus::new(BASE, words);

    let backend = FixedExitBackend::exiting_to(BASE + 0x100);
    let mut dispatcher = Dispatcher::new(jit(), backend);
    let mut cpu = TestCpu::at(BASE);

    dispatcher.step(&mut cpu, &bus).unwrap();
    assert_eq!(cpu.pc, BASE + 0x100);

    let next = dispatcher.step(&mut cpu, &bus).unwrap();
    assert_eq!(next.entry, BASE + 0x100);
    assert!(next.compiled);
    assert_eq!(dispatcher.jit().num_blocks(), 2);
}

#[test]
fn exhausted_cache_surfaces_as_a_compile_error() {
    let bus = bus(BASE, vec![jr(31), nop()]);
    let mut config = allegrex_jit::JitConfig::default();
    config.max_blocks = 1;
    let mut dispatcher = Dispatcher::new(
        allegrex_jit::IrJit::new(config),
        FixedExitBackend::exiting_to(BASE + 0x100),
    );
    let mut cpu = TestCpu::at(BASE);

    dispatcher.step(&mut cpu, &bus).unwrap();
    match dispatcher.step(&mut cpu, &bus) {
        Err(allegrex_jit::CompileError::Cache(allegrex_jit::CacheError::Exhausted {
            max_blocks: 1,
        })) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
}

struct BareBackend;

impl BackendCapabilities for BareBackend {}

#[test]
fn unimplemented_capabilities_decline_loudly() {
    let mut backend = BareBackend;
    let from = BlockHandle {
        index: 0,
        generation: 0,
    };
    let to = BlockHandle {
        index: 1,
        generation: 0,
    };

    assert_eq!(
        backend.link_blocks(from, to),
        Err(BackendError::LinkingUnsupported)
    );
    assert_eq!(
        backend.replace_call(0x0880_4000),
        Err(BackendError::ReplacementUnsupported {
            address: 0x0880_4000
        })
    );
}
