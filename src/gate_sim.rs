// SPDX-License-Identifier: Apache-2.0

//! Whole-network simulation, either one input assignment at a time (`bool`)
//! or all assignments at once (`TruthTable`).

use bitvec::vec::BitVec;

use crate::exsyn_error::ExsynError;
use crate::gate::{NodeKind, NodeRef};
use crate::node_store::NodeStore;
use crate::topo::topo_sort_refs;
use crate::truth_table::TruthTable;

/// A value domain gates can be evaluated over.
pub trait SimValue: Clone {
    fn complement(&self) -> Self;
    fn imply(a: &Self, b: &Self) -> Self;
    fn majority(operands: &[Self]) -> Self;

    fn with_polarity(&self, negated: bool) -> Self {
        if negated {
            self.complement()
        } else {
            self.clone()
        }
    }
}

impl SimValue for bool {
    fn complement(&self) -> Self {
        !*self
    }

    fn imply(a: &Self, b: &Self) -> Self {
        !*a || *b
    }

    fn majority(operands: &[Self]) -> Self {
        let ones = operands.iter().filter(|v| **v).count();
        ones * 2 > operands.len()
    }
}

impl SimValue for TruthTable {
    fn complement(&self) -> Self {
        self.not()
    }

    fn imply(a: &Self, b: &Self) -> Self {
        a.imply(b)
    }

    fn majority(operands: &[Self]) -> Self {
        TruthTable::majority(operands)
    }
}

/// Evaluates every node in topological order, seeding the constant with
/// `constant` and input `i` with `inputs[i]`. Returns one value per node.
pub fn simulate_nodes<V: SimValue>(
    store: &NodeStore,
    inputs: &[V],
    constant: V,
) -> Result<Vec<V>, ExsynError> {
    assert_eq!(
        inputs.len(),
        store.num_pis(),
        "simulate_nodes: store has {} inputs; got {} values",
        store.num_pis(),
        inputs.len()
    );
    let order = topo_sort_refs(store.nodes())?;
    let mut values: Vec<Option<V>> = vec![None; store.size()];
    for node_ref in order {
        let value = match &store.node(node_ref).kind {
            NodeKind::Constant => constant.clone(),
            NodeKind::Input { index } => inputs[*index].clone(),
            NodeKind::Gate { children } => {
                let child_values: Vec<V> = children
                    .iter()
                    .map(|c| value_of(&values, c.node))
                    .collect::<Result<_, _>>()?;
                store.simulate(node_ref, &child_values)
            }
        };
        values[node_ref.id] = Some(value);
    }
    values
        .into_iter()
        .enumerate()
        .map(|(id, v)| v.ok_or_else(|| unevaluated(NodeRef { id })))
        .collect()
}

fn value_of<V: Clone>(values: &[Option<V>], node: NodeRef) -> Result<V, ExsynError> {
    values[node.id].clone().ok_or_else(|| unevaluated(node))
}

fn unevaluated(node: NodeRef) -> ExsynError {
    ExsynError::InternalInvariantViolation(format!(
        "node %{} was not evaluated in topological order",
        node.id
    ))
}

fn outputs_of<V: SimValue>(store: &NodeStore, node_values: &[V]) -> Vec<V> {
    store
        .outputs()
        .iter()
        .map(|o| node_values[o.node.id].with_polarity(o.negated))
        .collect()
}

/// Values of every output, polarity applied.
pub fn simulate_outputs<V: SimValue>(
    store: &NodeStore,
    inputs: &[V],
    constant: V,
) -> Result<Vec<V>, ExsynError> {
    let node_values = simulate_nodes(store, inputs, constant)?;
    Ok(outputs_of(store, &node_values))
}

/// Truth table of every output over the store's primary inputs.
pub fn simulate_truth_tables(store: &NodeStore) -> Result<Vec<TruthTable>, ExsynError> {
    let n = store.num_pis();
    let inputs: Vec<TruthTable> = (0..n).map(|i| TruthTable::var(n, i)).collect();
    simulate_outputs(store, &inputs, TruthTable::const0(n))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collect {
    None,
    All,
}

pub struct GateSimResult {
    pub outputs: Vec<bool>,
    /// Value of every node, indexed by node id, when `Collect::All`.
    pub all_values: Option<BitVec>,
}

/// Evaluates the network on one input assignment.
pub fn eval(
    store: &NodeStore,
    inputs: &[bool],
    collect: Collect,
) -> Result<GateSimResult, ExsynError> {
    let node_values = simulate_nodes(store, inputs, false)?;
    let outputs = outputs_of(store, &node_values);
    let all_values = match collect {
        Collect::None => None,
        Collect::All => Some(node_values.iter().copied().collect::<BitVec>()),
    };
    Ok(GateSimResult {
        outputs,
        all_values,
    })
}
