// SPDX-License-Identifier: Apache-2.0

//! End-to-end synthesis runs on small targets with known minimum sizes.

use exsyn::decoder::verify;
use exsyn::encoder::encode;
use exsyn::exsyn_error::ExhaustReason;
use exsyn::fence::{fences_with_gates, Fence};
use exsyn::gate::{GateKind, NodeKind};
use exsyn::gate_sim::simulate_truth_tables;
use exsyn::solver::{CancelToken, SatBackend, SatOutcome, VarisatBackend};
use exsyn::specification::Specification;
use exsyn::synth::{synthesize, Parallelism, SynthesisOptions};
use exsyn::truth_table::TruthTable;
use exsyn::ExsynError;
use pretty_assertions::assert_eq;
use test_case::test_case;

fn majority_options() -> SynthesisOptions {
    SynthesisOptions {
        gate: GateKind::majority3(),
        ..SynthesisOptions::default()
    }
}

#[test]
fn test_majority_target_is_one_gate() {
    let spec = Specification::from_hex("0xe8").unwrap();
    let options = SynthesisOptions {
        max_gates: 1,
        max_levels: Some(1),
        ..majority_options()
    };
    let result = synthesize(&spec, &options).unwrap();
    assert_eq!(result.fence, Some(Fence::new(vec![1], 3)));
    assert_eq!(result.fences_tried, 1);
    assert_eq!(result.network.num_gates(), 1);
    let gate = result.network.gates().next().unwrap();
    match &result.network.node(gate).kind {
        NodeKind::Gate { children } => {
            let mut nodes: Vec<usize> = children.iter().map(|c| c.node.id).collect();
            nodes.sort();
            assert_eq!(nodes, vec![1, 2, 3]);
        }
        other => panic!("expected a gate, got {:?}", other),
    }
    verify(&result.network, &spec).unwrap();
}

#[test]
fn test_parity_needs_three_majority_gates() {
    let _ = env_logger::builder().is_test(true).try_init();
    let spec = Specification::from_hex("0x96").unwrap();
    let options = majority_options();
    let result = synthesize(&spec, &options).unwrap();
    assert_eq!(result.network.num_gates(), 3);
    let tables = simulate_truth_tables(&result.network).unwrap();
    assert_eq!(tables[0].to_hex(), "96");
    for row in 0..8 {
        assert_eq!(tables[0].get_bit(row), (row as u32).count_ones() % 2 == 1);
    }

    // Every smaller fence is UNSAT.
    let encoder_options = options.encoder_options();
    let fence_options = options.fence_options(1);
    for num_gates in 1..3 {
        for fence in fences_with_gates(num_gates, &fence_options) {
            let encoding = encode(&fence, &spec, &encoder_options).unwrap();
            let outcome = VarisatBackend
                .solve(&encoding.cnf, &CancelToken::new())
                .unwrap();
            assert_eq!(outcome, SatOutcome::Unsat, "fence {}", fence);
        }
    }
}

#[test]
fn test_small_spec_is_extended_to_gate_arity() {
    let spec = Specification::from_hex("0x8").unwrap();
    let options = SynthesisOptions {
        gate: GateKind::majority5(),
        ..SynthesisOptions::default()
    };
    let result = synthesize(&spec, &options).unwrap();
    assert_eq!(result.spec.num_vars(), 5);
    assert_eq!(result.network.num_pis(), 5);
    assert_eq!(result.network.num_gates(), 1);
    verify(&result.network, &result.spec).unwrap();

    let tables = simulate_truth_tables(&result.network).unwrap();
    let restricted = Specification::new(tables).unwrap().restrict_to(2);
    assert_eq!(restricted, spec);
}

#[test]
fn test_parity_without_complemented_edges_is_exhausted() {
    let spec = Specification::from_hex("0x96").unwrap();
    let options = SynthesisOptions {
        complemented_edges: Some(false),
        max_gates: 4,
        ..majority_options()
    };
    match synthesize(&spec, &options) {
        Err(ExsynError::SynthesisExhausted {
            fences_tried,
            reason,
        }) => {
            assert_eq!(reason, ExhaustReason::FenceBound);
            assert!(fences_tried > 0);
        }
        other => panic!("expected exhaustion, got {:?}", other.map(|r| r.expression)),
    }
}

#[test_case(Parallelism::Sequential; "sequential")]
#[test_case(Parallelism::Threads(2); "two workers")]
fn test_parity_within_two_gates_is_exhausted(parallelism: Parallelism) {
    let spec = Specification::from_hex("0x96").unwrap();
    let options = SynthesisOptions {
        max_gates: 2,
        parallelism,
        ..majority_options()
    };
    let err = synthesize(&spec, &options).unwrap_err();
    assert!(err.is_exhausted(), "{}", err);
}

#[test]
fn test_multi_output_network() {
    let _ = env_logger::builder().is_test(true).try_init();
    // a & b and a | b over two variables, implication gates.
    let spec = Specification::new(vec![
        TruthTable::from_hex("8").unwrap(),
        TruthTable::from_hex("e").unwrap(),
    ])
    .unwrap();
    let result = synthesize(&spec, &SynthesisOptions::default()).unwrap();
    assert_eq!(result.network.num_pos(), 2);
    assert_eq!(result.fence.map(|f| f.top_width()), Some(2));
    verify(&result.network, &spec).unwrap();
    result.network.check_invariants().unwrap();
}
