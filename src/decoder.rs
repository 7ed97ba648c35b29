// SPDX-License-Identifier: Apache-2.0

//! Turns a satisfying model of an `Encoding` into a concrete network.

use std::collections::HashMap;

use crate::encoder::{lit_value, Encoding};
use crate::exsyn_error::ExsynError;
use crate::expression::to_expression;
use crate::gate::{NodeKind, NodeRef, Signal};
use crate::gate_sim::simulate_truth_tables;
use crate::node_store::NodeStore;
use crate::specification::Specification;
use crate::topo::postorder_from_signals;
use varisat::Lit;

#[derive(Debug, Clone)]
pub struct Decoded {
    pub network: NodeStore,
    pub expression: String,
}

/// Index of the single true selector, or an invariant violation if the model
/// breaks exactly-one.
fn selected(select: &[Lit], model: &[bool]) -> Option<usize> {
    let mut chosen = None;
    for (k, lit) in select.iter().enumerate() {
        if lit_value(model, *lit) {
            if chosen.is_some() {
                return None;
            }
            chosen = Some(k);
        }
    }
    chosen
}

/// Materializes the fence gates in ascending level order, binds the top level
/// to outputs, and checks the result against `spec` by simulation.
pub fn decode(
    encoding: &Encoding,
    model: &[bool],
    spec: &Specification,
) -> Result<Decoded, ExsynError> {
    if model.len() < encoding.cnf.num_vars() {
        return Err(ExsynError::SolverUnavailable(format!(
            "model covers {} of {} variables",
            model.len(),
            encoding.cnf.num_vars()
        )));
    }
    let arity = encoding.gate.arity();
    let mut store = NodeStore::new(encoding.gate);
    let mut signals: Vec<Signal> = vec![store.get_constant(false)];
    for _ in 0..encoding.num_inputs {
        signals.push(store.create_primary_input());
    }
    for (g, gate) in encoding.gates.iter().enumerate() {
        let mut children: Vec<Signal> = Vec::with_capacity(arity);
        for c in 0..arity {
            let k = selected(&gate.select[c], model).ok_or_else(|| {
                ExsynError::InternalInvariantViolation(format!(
                    "gate {} child {} does not select exactly one signal",
                    g, c
                ))
            })?;
            let source = gate.choices[k];
            let signal = *signals.get(source).ok_or_else(|| {
                ExsynError::InternalInvariantViolation(format!(
                    "gate {} child {} selects signal {} which is not yet built",
                    g, c, source
                ))
            })?;
            let negated = gate.polarity[c]
                .map(|p| lit_value(model, p))
                .unwrap_or(false);
            children.push(signal.xor_polarity(negated));
        }
        signals.push(store.create_gate(&children));
    }
    for (output, g) in encoding.output_gates().enumerate() {
        let negated = encoding.output_polarity[output]
            .map(|q| lit_value(model, q))
            .unwrap_or(false);
        store.create_output(signals[encoding.gate_signal(g)].xor_polarity(negated));
    }

    let network = cleanup_dangling(&store);
    verify(&network, spec)?;
    network.check_invariants()?;
    let expression = to_expression(&network);
    log::trace!("decoded fence {}:\n{}", encoding.fence, network);
    Ok(Decoded {
        network,
        expression,
    })
}

/// Copies the cone of the outputs into a fresh store, dropping gates no
/// output depends on (folding during decoding can leave some behind).
pub fn cleanup_dangling(store: &NodeStore) -> NodeStore {
    let mut result = NodeStore::new(store.gate_kind());
    let mut map: HashMap<NodeRef, Signal> = HashMap::new();
    map.insert(NodeRef { id: 0 }, result.get_constant(false));
    for input in store.inputs() {
        map.insert(*input, result.create_primary_input());
    }
    let translate = |map: &HashMap<NodeRef, Signal>, s: &Signal| map[&s.node].xor_polarity(s.negated);
    for node_ref in postorder_from_signals(store.outputs(), store.nodes()) {
        if let NodeKind::Gate { children } = &store.node(node_ref).kind {
            let mapped: Vec<Signal> = children.iter().map(|c| translate(&map, c)).collect();
            let signal = result.create_gate(&mapped);
            map.insert(node_ref, signal);
        }
    }
    for output in store.outputs() {
        let signal = translate(&map, output);
        result.create_output(signal);
    }
    result
}

/// Simulates every output and compares against `spec`.
pub fn verify(network: &NodeStore, spec: &Specification) -> Result<(), ExsynError> {
    let tables = simulate_truth_tables(network)?;
    if tables.len() != spec.num_outputs() {
        return Err(ExsynError::InternalInvariantViolation(format!(
            "network has {} outputs; specification has {}",
            tables.len(),
            spec.num_outputs()
        )));
    }
    for (i, (got, want)) in tables.iter().zip(spec.functions()).enumerate() {
        if got != want {
            return Err(ExsynError::InternalInvariantViolation(format!(
                "output {} computes {} but the target is {}",
                i, got, want
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{encode, EncoderOptions};
    use crate::fence::Fence;
    use crate::gate::GateKind;
    use crate::solver::{CancelToken, SatBackend, SatOutcome, VarisatBackend};
    use pretty_assertions::assert_eq;

    fn solve(encoding: &Encoding) -> Option<Vec<bool>> {
        match VarisatBackend
            .solve(&encoding.cnf, &CancelToken::new())
            .unwrap()
        {
            SatOutcome::Sat(model) => Some(model),
            _ => None,
        }
    }

    #[test]
    fn test_decode_single_majority() {
        let spec = Specification::from_hex("e8").unwrap();
        let options = EncoderOptions {
            gate: GateKind::majority3(),
            complemented_edges: true,
            ..EncoderOptions::default()
        };
        let encoding = encode(&Fence::new(vec![1], 3), &spec, &options).unwrap();
        let model = solve(&encoding).expect("majority fits one gate");
        let decoded = decode(&encoding, &model, &spec).unwrap();
        assert_eq!(decoded.network.num_gates(), 1);
        // Either maj(a, b, c) or its self-dual form with the output inverted.
        assert!(
            decoded.expression == "maj(a, b, c)" || decoded.expression == "!maj(!a, !b, !c)",
            "unexpected expression {}",
            decoded.expression
        );
    }

    #[test]
    fn test_decode_implication_or() {
        // a | b = imp(imp(a, 0), b): two gates on two levels.
        let spec = Specification::from_hex("e").unwrap();
        let options = EncoderOptions::default();
        assert!(solve(&encode(&Fence::new(vec![1], 2), &spec, &options).unwrap()).is_none());
        let encoding = encode(&Fence::new(vec![1, 1], 2), &spec, &options).unwrap();
        let model = solve(&encoding).expect("or fits two implications");
        let decoded = decode(&encoding, &model, &spec).unwrap();
        assert_eq!(decoded.network.num_gates(), 2);
        verify(&decoded.network, &spec).unwrap();
    }

    #[test]
    fn test_verify_reports_mismatch() {
        let mut store = NodeStore::new(GateKind::Imply);
        let a = store.create_primary_input();
        let b = store.create_primary_input();
        let g = store.create_gate(&[a, b]);
        store.create_output(g);
        let spec = Specification::from_hex("8").unwrap();
        assert!(matches!(
            verify(&store, &spec),
            Err(ExsynError::InternalInvariantViolation(_))
        ));
    }

    #[test]
    fn test_cleanup_dangling_drops_unused_gates() {
        let mut store = NodeStore::new(GateKind::Imply);
        let a = store.create_primary_input();
        let b = store.create_primary_input();
        let used = store.create_gate(&[a, b]);
        let _unused = store.create_gate(&[b, a]);
        store.create_output(!used);
        let clean = cleanup_dangling(&store);
        assert_eq!(clean.num_gates(), 1);
        assert_eq!(clean.num_pis(), 2);
        assert_eq!(
            simulate_truth_tables(&clean).unwrap(),
            simulate_truth_tables(&store).unwrap()
        );
    }
}
