// SPDX-License-Identifier: Apache-2.0

//! The `NodeStore` owns a content-addressed DAG of fixed-fan-in gates.
//!
//! Node 0 is the constant (false); primary inputs and gates are appended after
//! it. Gate creation is hash-consed: a structural signature over the ordered
//! children (sorted first for commutative primitives) maps to the node that
//! realizes it, so building the same gate twice yields the same `Signal`.
//!
//! Every node carries a fan-out count equal to the number of child slots and
//! outputs that reference it; `create_gate`, `create_output` and `substitute`
//! keep that count exact.
//!
//! Basic example usage:
//! ```
//! use exsyn::gate::GateKind;
//! use exsyn::node_store::NodeStore;
//!
//! let mut store = NodeStore::new(GateKind::majority3());
//! let a = store.create_primary_input();
//! let b = store.create_primary_input();
//! let c = store.create_primary_input();
//! let m = store.create_gate(&[a, b, c]);
//! store.create_output(m);
//! assert_eq!(store.num_gates(), 1);
//! assert_eq!(store.create_gate(&[c, a, b]), m);
//! ```

use std::collections::{BTreeMap, VecDeque};

use ahash::AHashMap;

use crate::exsyn_error::ExsynError;
use crate::expression::input_name;
use crate::gate::{GateKind, Node, NodeKind, NodeRef, Signal};
use crate::fanout;
use crate::gate_sim::{self, SimValue};
use crate::topo::topo_order_and_cycle_check;

/// Result of reducing a gate's children before allocation.
enum Canonical {
    /// The gate is equivalent to an existing signal; nothing is allocated.
    Trivial(Signal),
    /// Children to store, and whether the produced node is complemented.
    Gate {
        children: Vec<Signal>,
        output_negated: bool,
    },
}

#[derive(Debug, Clone)]
pub struct NodeStore {
    kind: GateKind,
    nodes: Vec<Node>,
    inputs: Vec<NodeRef>,
    outputs: Vec<Signal>,
    strash: AHashMap<Vec<Signal>, NodeRef>,
}

impl NodeStore {
    pub fn new(kind: GateKind) -> Self {
        if let Err(e) = kind.validate() {
            panic!("NodeStore::new: {}", e);
        }
        Self {
            kind,
            nodes: vec![Node::new(NodeKind::Constant)],
            inputs: Vec::new(),
            outputs: Vec::new(),
            strash: AHashMap::new(),
        }
    }

    pub fn gate_kind(&self) -> GateKind {
        self.kind
    }

    pub fn get_constant(&self, value: bool) -> Signal {
        Signal::new(0, value)
    }

    pub fn is_known_false(&self, signal: Signal) -> bool {
        signal.node.id == 0 && !signal.negated
    }

    pub fn is_known_true(&self, signal: Signal) -> bool {
        signal.node.id == 0 && signal.negated
    }

    pub fn create_primary_input(&mut self) -> Signal {
        let node_ref = NodeRef {
            id: self.nodes.len(),
        };
        self.nodes.push(Node::new(NodeKind::Input {
            index: self.inputs.len(),
        }));
        self.inputs.push(node_ref);
        node_ref.into()
    }

    pub fn create_output(&mut self, signal: Signal) {
        self.validate_signal(signal);
        self.nodes[signal.node.id].fanout += 1;
        self.outputs.push(signal);
    }

    /// Creates (or finds) the gate over `children`, in order.
    ///
    /// Trivial cases (identical operands, constant operands) are folded first
    /// and may return an existing signal without allocating anything.
    pub fn create_gate(&mut self, children: &[Signal]) -> Signal {
        assert_eq!(
            children.len(),
            self.kind.arity(),
            "create_gate: {} gate needs {} children; got {}",
            self.kind,
            self.kind.arity(),
            children.len()
        );
        for child in children {
            self.validate_signal(*child);
        }
        let (children, output_negated) = match self.canonicalize(children) {
            Canonical::Trivial(signal) => return signal,
            Canonical::Gate {
                children,
                output_negated,
            } => (children, output_negated),
        };
        let key = self.signature(&children);
        if let Some(existing) = self.strash.get(&key) {
            return Signal {
                node: *existing,
                negated: output_negated,
            };
        }
        let node_ref = NodeRef {
            id: self.nodes.len(),
        };
        for child in &children {
            self.nodes[child.node.id].fanout += 1;
        }
        self.nodes.push(Node::new(NodeKind::Gate { children }));
        self.strash.insert(key, node_ref);
        Signal {
            node: node_ref,
            negated: output_negated,
        }
    }

    fn canonicalize(&self, children: &[Signal]) -> Canonical {
        match self.kind {
            GateKind::Imply => {
                let (a, b) = (children[0], children[1]);
                let t = self.get_constant(true);
                if a.node == b.node {
                    // imp(x, x) = 1, imp(x, !x) = !x, imp(!x, x) = x
                    return Canonical::Trivial(if a.negated == b.negated { t } else { b });
                }
                if self.is_known_false(a) || self.is_known_true(b) {
                    return Canonical::Trivial(t);
                }
                if self.is_known_true(a) {
                    return Canonical::Trivial(b);
                }
                Canonical::Gate {
                    children: vec![a, b],
                    output_negated: false,
                }
            }
            GateKind::Majority { arity } => {
                let mut sorted = children.to_vec();
                sorted.sort();
                if let Some(dominant) = dominant_signal(&sorted) {
                    return Canonical::Trivial(dominant);
                }
                let mut remaining: Vec<Signal> = Vec::with_capacity(sorted.len());
                for s in &sorted {
                    if let Some(pos) = remaining.iter().position(|r| *r == !*s) {
                        remaining.remove(pos);
                    } else {
                        remaining.push(*s);
                    }
                }
                if remaining.len() == 1 {
                    return Canonical::Trivial(remaining[0]);
                }
                if remaining.len() < sorted.len() {
                    if let Some(dominant) = dominant_signal(&remaining) {
                        return Canonical::Trivial(dominant);
                    }
                }
                let negated_count = sorted.iter().filter(|s| s.negated).count();
                if negated_count > arity / 2 {
                    let mut flipped: Vec<Signal> = sorted.iter().map(|s| s.negate()).collect();
                    flipped.sort();
                    return Canonical::Gate {
                        children: flipped,
                        output_negated: true,
                    };
                }
                Canonical::Gate {
                    children: sorted,
                    output_negated: false,
                }
            }
        }
    }

    fn signature(&self, children: &[Signal]) -> Vec<Signal> {
        let mut key = children.to_vec();
        if self.kind.is_commutative() {
            key.sort();
        }
        key
    }

    /// Rewires every child slot and output that references `old_node` to
    /// `new_signal`, composing polarities by XOR.
    ///
    /// A rewired parent whose new signature already belongs to another gate
    /// is merged into that gate in turn, so live gates stay structurally
    /// unique and every rewired gate is findable under its new signature.
    ///
    /// The caller guarantees `new_signal` is not in the transitive fan-out of
    /// `old_node`; only the immediate self-loop (the node of `new_signal`
    /// reading `old_node` directly) is detected, before anything is mutated.
    pub fn substitute(&mut self, old_node: NodeRef, new_signal: Signal) -> Result<(), ExsynError> {
        self.validate_ref(old_node);
        self.validate_signal(new_signal);
        if old_node == new_signal.node {
            return Err(ExsynError::InternalInvariantViolation(format!(
                "substitute: node %{} cannot be substituted by itself",
                old_node.id
            )));
        }
        if self.nodes[new_signal.node.id]
            .children()
            .iter()
            .any(|c| c.node == old_node)
        {
            return Err(ExsynError::InternalInvariantViolation(format!(
                "substitute: replacing %{} by %{} would make %{} its own child",
                old_node.id, new_signal.node.id, new_signal.node.id
            )));
        }

        // Merged parents have the same children as their target, so neither
        // can read the other and the pair needs no self-loop check.
        let mut replaced: AHashMap<NodeRef, Signal> = AHashMap::new();
        let mut worklist: VecDeque<(NodeRef, Signal)> = VecDeque::new();
        worklist.push_back((old_node, new_signal));
        while let Some((old, target)) = worklist.pop_front() {
            if replaced.contains_key(&old) {
                continue;
            }
            let target = resolve(&replaced, target);
            if target.node == old {
                continue;
            }
            replaced.insert(old, target);
            self.replace_one(old, target, &mut worklist);
        }
        Ok(())
    }

    /// One rewiring step of `substitute`; parents that collide with an
    /// existing gate are queued for merging.
    fn replace_one(
        &mut self,
        old_node: NodeRef,
        new_signal: Signal,
        worklist: &mut VecDeque<(NodeRef, Signal)>,
    ) {
        if let NodeKind::Gate { children } = &self.nodes[old_node.id].kind {
            let key = self.signature(children);
            if self.strash.get(&key) == Some(&old_node) {
                self.strash.remove(&key);
            }
        }

        let mut rewired: u32 = 0;
        for id in 0..self.nodes.len() {
            let old_key = match &self.nodes[id].kind {
                NodeKind::Gate { children } if children.iter().any(|c| c.node == old_node) => {
                    self.signature(children)
                }
                _ => continue,
            };
            if self.strash.get(&old_key) == Some(&NodeRef { id }) {
                self.strash.remove(&old_key);
            }
            let new_children = match &mut self.nodes[id].kind {
                NodeKind::Gate { children } => {
                    for child in children.iter_mut() {
                        if child.node == old_node {
                            *child = new_signal.xor_polarity(child.negated);
                            rewired += 1;
                        }
                    }
                    children.clone()
                }
                _ => unreachable!("only gate nodes are rewired"),
            };
            let new_key = self.signature(&new_children);
            match self.strash.get(&new_key).copied() {
                Some(existing) if existing.id != id => {
                    worklist.push_back((NodeRef { id }, Signal::from(existing)));
                }
                _ => {
                    self.strash.insert(new_key, NodeRef { id });
                }
            }
        }
        for output in self.outputs.iter_mut() {
            if output.node == old_node {
                *output = new_signal.xor_polarity(output.negated);
                rewired += 1;
            }
        }

        self.nodes[new_signal.node.id].fanout += rewired;
        self.nodes[old_node.id].fanout = 0;
        log::trace!(
            "substitute: %{} -> {:?}; {} edge(s) rewired",
            old_node.id,
            new_signal,
            rewired
        );
    }

    /// Evaluates the gate `node` given the values of its child nodes (before
    /// polarity is applied), in child order.
    pub fn simulate<V: SimValue>(&self, node: NodeRef, child_values: &[V]) -> V {
        self.validate_ref(node);
        let children = match &self.nodes[node.id].kind {
            NodeKind::Gate { children } => children,
            other => panic!("simulate: node %{} is not a gate: {:?}", node.id, other),
        };
        assert_eq!(
            children.len(),
            child_values.len(),
            "simulate: node %{} has {} children; got {} values",
            node.id,
            children.len(),
            child_values.len()
        );
        let operands: Vec<V> = children
            .iter()
            .zip(child_values.iter())
            .map(|(c, v)| v.with_polarity(c.negated))
            .collect();
        match self.kind {
            GateKind::Imply => V::imply(&operands[0], &operands[1]),
            GateKind::Majority { .. } => V::majority(&operands),
        }
    }

    /// Simulates the whole network; see `gate_sim::simulate_outputs`.
    pub fn simulate_outputs<V: SimValue>(
        &self,
        inputs: &[V],
        constant: V,
    ) -> Result<Vec<V>, ExsynError> {
        gate_sim::simulate_outputs(self, inputs, constant)
    }

    pub fn fanout_histogram(&self) -> BTreeMap<u32, usize> {
        fanout::fanout_histogram(self)
    }

    // -- Derived gates for implication networks.

    /// `imp(a, 0) = !a`
    pub fn create_not(&mut self, a: Signal) -> Signal {
        self.expect_kind(GateKind::Imply, "create_not");
        let f = self.get_constant(false);
        self.create_gate(&[a, f])
    }

    pub fn create_or(&mut self, a: Signal, b: Signal) -> Signal {
        let not_a = self.create_not(a);
        self.create_gate(&[not_a, b])
    }

    pub fn create_and(&mut self, a: Signal, b: Signal) -> Signal {
        let not_b = self.create_not(b);
        let t = self.create_gate(&[a, not_b]);
        self.create_not(t)
    }

    /// Fan-out-conflict-free XOR built from six implications.
    pub fn create_xor(&mut self, a: Signal, b: Signal) -> Signal {
        let f1 = self.create_not(a);
        let f2 = self.create_not(b);
        let f3 = self.create_gate(&[f1, f2]);
        let f4 = self.create_not(f3);
        let f5 = self.create_gate(&[a, b]);
        self.create_gate(&[f5, f4])
    }

    pub fn create_maj(&mut self, a: Signal, b: Signal, c: Signal) -> Signal {
        self.expect_kind(GateKind::majority3(), "create_maj");
        self.create_gate(&[a, b, c])
    }

    fn expect_kind(&self, kind: GateKind, what: &str) {
        assert_eq!(
            self.kind, kind,
            "{}: store of {} gates cannot build this",
            what, self.kind
        );
    }

    // -- Structural properties.

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_pis(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_pos(&self) -> usize {
        self.outputs.len()
    }

    pub fn num_gates(&self) -> usize {
        self.nodes.len() - self.inputs.len() - 1
    }

    pub fn is_constant(&self, node: NodeRef) -> bool {
        node.id == 0
    }

    pub fn is_pi(&self, node: NodeRef) -> bool {
        matches!(self.node(node).kind, NodeKind::Input { .. })
    }

    pub fn is_gate(&self, node: NodeRef) -> bool {
        self.node(node).is_gate()
    }

    pub fn fanin_size(&self, node: NodeRef) -> usize {
        self.node(node).children().len()
    }

    pub fn fanout(&self, node: NodeRef) -> u32 {
        self.node(node).fanout
    }

    pub fn node(&self, node: NodeRef) -> &Node {
        self.validate_ref(node);
        &self.nodes[node.id]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn inputs(&self) -> &[NodeRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Signal] {
        &self.outputs
    }

    /// Gate nodes in allocation order.
    pub fn gates(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_gate())
            .map(|(id, _)| NodeRef { id })
    }

    /// Index of a primary input among the store's inputs.
    pub fn pi_index(&self, node: NodeRef) -> Option<usize> {
        match self.node(node).kind {
            NodeKind::Input { index } => Some(index),
            _ => None,
        }
    }

    // -- Scratch values and visited flags.

    pub fn clear_values(&mut self) {
        self.nodes.iter_mut().for_each(|n| n.value = 0);
    }

    pub fn value(&self, node: NodeRef) -> u32 {
        self.node(node).value
    }

    pub fn set_value(&mut self, node: NodeRef, value: u32) {
        self.validate_ref(node);
        self.nodes[node.id].value = value;
    }

    /// Post-increment; returns the previous value.
    pub fn incr_value(&mut self, node: NodeRef) -> u32 {
        self.validate_ref(node);
        let previous = self.nodes[node.id].value;
        self.nodes[node.id].value += 1;
        previous
    }

    /// Pre-decrement; returns the new value. Panics if the value is already 0.
    pub fn decr_value(&mut self, node: NodeRef) -> u32 {
        self.validate_ref(node);
        let value = self.nodes[node.id].value.checked_sub(1).unwrap_or_else(|| {
            panic!(
                "decr_value: scratch value of %{} is already 0",
                node.id
            )
        });
        self.nodes[node.id].value = value;
        value
    }

    pub fn clear_visited(&mut self) {
        self.nodes.iter_mut().for_each(|n| n.visited = 0);
    }

    pub fn visited(&self, node: NodeRef) -> u32 {
        self.node(node).visited
    }

    pub fn set_visited(&mut self, node: NodeRef, visited: u32) {
        self.validate_ref(node);
        self.nodes[node.id].visited = visited;
    }

    // -- Validation.

    pub fn validate_ref(&self, node: NodeRef) {
        assert!(
            node.id < self.nodes.len(),
            "NodeRef out of bounds: {:?} (nodes.len() = {})",
            node,
            self.nodes.len()
        );
    }

    pub fn validate_signal(&self, signal: Signal) {
        self.validate_ref(signal.node);
    }

    /// Checks index ranges, acyclicity, fan-out bookkeeping and the
    /// structural-hash table against the nodes it points at.
    pub fn check_invariants(&self) -> Result<(), ExsynError> {
        let count = self.nodes.len();
        let mut expected_fanout = vec![0u32; count];
        for (id, node) in self.nodes.iter().enumerate() {
            for child in node.children() {
                if child.node.id >= count {
                    return Err(ExsynError::InternalInvariantViolation(format!(
                        "node %{} child {:?} out of bounds (nodes.len() = {})",
                        id, child, count
                    )));
                }
                if child.node.id == id {
                    return Err(ExsynError::InternalInvariantViolation(format!(
                        "node %{} is its own child",
                        id
                    )));
                }
                expected_fanout[child.node.id] += 1;
            }
            if let NodeKind::Gate { children } = &node.kind {
                if children.len() != self.kind.arity() {
                    return Err(ExsynError::InternalInvariantViolation(format!(
                        "node %{} has {} children; {} gates have {}",
                        id,
                        children.len(),
                        self.kind,
                        self.kind.arity()
                    )));
                }
            }
        }
        for output in &self.outputs {
            if output.node.id >= count {
                return Err(ExsynError::InternalInvariantViolation(format!(
                    "output {:?} out of bounds (nodes.len() = {})",
                    output, count
                )));
            }
            expected_fanout[output.node.id] += 1;
        }
        for (id, (node, expected)) in self.nodes.iter().zip(expected_fanout.iter()).enumerate() {
            if node.fanout != *expected {
                return Err(ExsynError::InternalInvariantViolation(format!(
                    "node %{} records fan-out {} but {} reference(s) point at it",
                    id, node.fanout, expected
                )));
            }
        }
        let (_order, cycle) = topo_order_and_cycle_check(&self.nodes);
        if let Some(not_visited) = cycle {
            return Err(ExsynError::InternalInvariantViolation(format!(
                "cycle detected; nodes not reachable in topological order: {:?}",
                not_visited
            )));
        }
        let mut live: AHashMap<Vec<Signal>, usize> = AHashMap::new();
        for (id, node) in self.nodes.iter().enumerate() {
            if let NodeKind::Gate { children } = &node.kind {
                if node.fanout == 0 {
                    continue;
                }
                if let Some(first) = live.insert(self.signature(children), id) {
                    return Err(ExsynError::InternalInvariantViolation(format!(
                        "live gates %{} and %{} have the same children",
                        first, id
                    )));
                }
            }
        }
        for (key, node_ref) in &self.strash {
            let node = &self.nodes[node_ref.id];
            if self.signature(node.children()) != *key {
                return Err(ExsynError::InternalInvariantViolation(format!(
                    "structural hash entry for %{} is stale",
                    node_ref.id
                )));
            }
        }
        Ok(())
    }

    fn signal_str(&self, signal: Signal) -> String {
        let base = match self.nodes[signal.node.id].kind {
            NodeKind::Constant => return if signal.negated { "1" } else { "0" }.to_string(),
            NodeKind::Input { index } => input_name(index),
            NodeKind::Gate { .. } => format!("%{}", signal.node.id),
        };
        if signal.negated {
            format!("!{}", base)
        } else {
            base
        }
    }
}

/// Follows substitutions made so far, composing polarities.
fn resolve(replaced: &AHashMap<NodeRef, Signal>, mut signal: Signal) -> Signal {
    while let Some(next) = replaced.get(&signal.node) {
        signal = next.xor_polarity(signal.negated);
    }
    signal
}

/// Returns the signal that occurs in a strict majority of `sorted`, if any.
fn dominant_signal(sorted: &[Signal]) -> Option<Signal> {
    let threshold = sorted.len() / 2 + 1;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if j - i >= threshold {
            return Some(sorted[i]);
        }
        i = j;
    }
    None
}

/// Lists the network in a `fn`-style form: gates in topological order, then
/// outputs.
impl std::fmt::Display for NodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let input_str = (0..self.inputs.len())
            .map(input_name)
            .collect::<Vec<String>>()
            .join(", ");
        let output_str = (0..self.outputs.len())
            .map(|i| format!("o{}", i))
            .collect::<Vec<String>>()
            .join(", ");
        writeln!(f, "fn {}({}) -> ({}) {{", self.kind, input_str, output_str)?;
        let (order, _cycle) = topo_order_and_cycle_check(&self.nodes);
        for node_ref in order {
            if let NodeKind::Gate { children } = &self.nodes[node_ref.id].kind {
                let args = children
                    .iter()
                    .map(|c| self.signal_str(*c))
                    .collect::<Vec<String>>()
                    .join(", ");
                writeln!(
                    f,
                    "  %{} = {}({})",
                    node_ref.id,
                    self.kind.mnemonic(),
                    args
                )?;
            }
        }
        for (i, output) in self.outputs.iter().enumerate() {
            writeln!(f, "  o{} = {}", i, self.signal_str(*output))?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate_sim::simulate_truth_tables;
    use crate::truth_table::TruthTable;
    use pretty_assertions::assert_eq;

    fn imply_store_with_inputs(n: usize) -> (NodeStore, Vec<Signal>) {
        let mut store = NodeStore::new(GateKind::Imply);
        let pis = (0..n).map(|_| store.create_primary_input()).collect();
        (store, pis)
    }

    #[test]
    fn test_simulate_imply_all_polarities() {
        let (mut store, pis) = imply_store_with_inputs(2);
        for (na, nb) in [(false, false), (false, true), (true, false), (true, true)] {
            let a = pis[0].xor_polarity(na);
            let b = pis[1].xor_polarity(nb);
            let g = store.create_gate(&[a, b]);
            assert!(!g.negated);
            for va in [false, true] {
                for vb in [false, true] {
                    let expected = !(va ^ na) || (vb ^ nb);
                    assert_eq!(store.simulate(g.node, &[va, vb]), expected);
                }
            }
            let tt = store.simulate(
                g.node,
                &[TruthTable::var(2, 0), TruthTable::var(2, 1)],
            );
            let expected_tt = TruthTable::var(2, 0)
                .xor(&if na { TruthTable::const1(2) } else { TruthTable::const0(2) })
                .imply(&TruthTable::var(2, 1).xor(&if nb {
                    TruthTable::const1(2)
                } else {
                    TruthTable::const0(2)
                }));
            assert_eq!(tt, expected_tt);
        }
        assert_eq!(store.num_gates(), 4);
    }

    #[test]
    fn test_simulate_majority5_polarities() {
        let mut store = NodeStore::new(GateKind::majority5());
        let pis: Vec<Signal> = (0..5).map(|_| store.create_primary_input()).collect();
        let children = vec![pis[0], !pis[1], pis[2], pis[3], !pis[4]];
        let g = store.create_gate(&children);
        for row in 0..32usize {
            let values: Vec<bool> = (0..5).map(|i| (row >> i) & 1 == 1).collect();
            let stored = store.node(g.node).children().to_vec();
            let child_values: Vec<bool> = stored
                .iter()
                .map(|c| values[store.pi_index(c.node).unwrap()])
                .collect();
            let raw = store.simulate(g.node, &child_values) ^ g.negated;
            let ones = children
                .iter()
                .filter(|c| values[store.pi_index(c.node).unwrap()] ^ c.negated)
                .count();
            assert_eq!(raw, ones >= 3, "row {}", row);
        }
    }

    #[test]
    fn test_hash_consing_imply_is_order_sensitive() {
        let (mut store, pis) = imply_store_with_inputs(2);
        let ab = store.create_gate(&[pis[0], pis[1]]);
        let ab_again = store.create_gate(&[pis[0], pis[1]]);
        let ba = store.create_gate(&[pis[1], pis[0]]);
        assert_eq!(ab, ab_again);
        assert_ne!(ab.node, ba.node);
        assert_eq!(store.num_gates(), 2);
        assert_eq!(store.fanout(pis[0].node), 2);
        assert_eq!(store.fanout(pis[1].node), 2);
    }

    #[test]
    fn test_hash_consing_majority_is_commutative() {
        let mut store = NodeStore::new(GateKind::majority3());
        let a = store.create_primary_input();
        let b = store.create_primary_input();
        let c = store.create_primary_input();
        let m1 = store.create_gate(&[a, b, c]);
        let m2 = store.create_gate(&[c, b, a]);
        assert_eq!(m1, m2);
        assert_eq!(store.num_gates(), 1);
        assert_eq!(store.fanout(a.node), 1);
    }

    #[test]
    fn test_imply_trivial_cases() {
        let (mut store, pis) = imply_store_with_inputs(2);
        let a = pis[0];
        let t = store.get_constant(true);
        let f = store.get_constant(false);
        assert_eq!(store.create_gate(&[a, a]), t);
        assert_eq!(store.create_gate(&[a, !a]), !a);
        assert_eq!(store.create_gate(&[!a, a]), a);
        assert_eq!(store.create_gate(&[f, a]), t);
        assert_eq!(store.create_gate(&[t, a]), a);
        assert_eq!(store.create_gate(&[a, t]), t);
        assert_eq!(store.num_gates(), 0);
        // imp(a, 0) is the implication form of NOT and is a real gate.
        let not_a = store.create_gate(&[a, f]);
        assert_eq!(store.num_gates(), 1);
        assert!(!not_a.negated);
        assert_eq!(store.fanout(NodeRef { id: 0 }), 1);
    }

    #[test]
    fn test_majority_trivial_cases() {
        let mut store = NodeStore::new(GateKind::majority3());
        let a = store.create_primary_input();
        let b = store.create_primary_input();
        let f = store.get_constant(false);
        assert_eq!(store.create_gate(&[a, a, b]), a);
        assert_eq!(store.create_gate(&[a, !a, b]), b);
        assert_eq!(store.create_gate(&[f, !f, b]), b);
        assert_eq!(store.create_gate(&[f, f, a]), f);
        assert_eq!(store.num_gates(), 0);
    }

    #[test]
    fn test_majority_self_dual_normalization() {
        let mut store = NodeStore::new(GateKind::majority3());
        let a = store.create_primary_input();
        let b = store.create_primary_input();
        let c = store.create_primary_input();
        let m = store.create_gate(&[a, b, c]);
        let n = store.create_gate(&[!a, !b, !c]);
        assert_eq!(n, !m);
        let mixed = store.create_gate(&[!a, !b, c]);
        assert!(mixed.negated);
        assert_eq!(store.num_gates(), 2);
        let tts = {
            store.create_output(mixed);
            simulate_truth_tables(&store).unwrap()
        };
        let vars: Vec<TruthTable> = (0..3).map(|i| TruthTable::var(3, i)).collect();
        let expected = TruthTable::majority(&[vars[0].not(), vars[1].not(), vars[2].clone()]);
        assert_eq!(tts[0], expected);
    }

    #[test]
    fn test_majority5_pair_cancellation_reduces_to_majority3_trivial() {
        let mut store = NodeStore::new(GateKind::majority5());
        let pis: Vec<Signal> = (0..3).map(|_| store.create_primary_input()).collect();
        // maj(x, x, y, !y, z) = maj(x, x, z) = x
        let x = pis[0];
        let r = store.create_gate(&[x, pis[1], x, !pis[1], pis[2]]);
        assert_eq!(r, x);
        assert_eq!(store.num_gates(), 0);
    }

    #[test]
    fn test_create_output_counts_duplicates() {
        let (mut store, pis) = imply_store_with_inputs(2);
        let g = store.create_gate(&[pis[0], pis[1]]);
        store.create_output(g);
        store.create_output(g);
        store.create_output(!g);
        assert_eq!(store.fanout(g.node), 3);
        assert_eq!(store.num_pos(), 3);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_substitute_rewires_parents_and_outputs() {
        let (mut store, pis) = imply_store_with_inputs(3);
        let (a, b, c) = (pis[0], pis[1], pis[2]);
        let g1 = store.create_gate(&[a, b]);
        let g2 = store.create_gate(&[g1, c]);
        let g3 = store.create_gate(&[!g1, c]);
        store.create_output(g2);
        store.create_output(g1);
        store.create_output(g3);
        let replacement = store.create_gate(&[b, a]);
        let before_new = store.fanout(replacement.node);

        store.substitute(g1.node, !replacement).unwrap();

        assert_eq!(store.fanout(g1.node), 0);
        // Two child slots plus one output were rewired.
        assert_eq!(store.fanout(replacement.node), before_new + 3);
        assert_eq!(store.node(g2.node).children()[0], !replacement);
        assert_eq!(store.node(g3.node).children()[0], replacement);
        assert_eq!(store.outputs()[1], !replacement);
        store.check_invariants().unwrap();

        // Rewired nodes are found under their new signature.
        assert_eq!(store.create_gate(&[!replacement, c]), g2);
        // The replaced node is no longer returned by hash hits.
        let rebuilt = store.create_gate(&[a, b]);
        assert_ne!(rebuilt.node, g1.node);
    }

    #[test]
    fn test_substitute_merges_parents_that_become_identical() {
        let (mut store, pis) = imply_store_with_inputs(3);
        let (a, b, c) = (pis[0], pis[1], pis[2]);
        let g1 = store.create_gate(&[a, b]);
        let g2 = store.create_gate(&[g1, c]);
        let r = store.create_gate(&[b, a]);
        let g4 = store.create_gate(&[r, c]);
        store.create_output(g2);
        store.create_output(g4);

        store.substitute(g1.node, r).unwrap();

        store.check_invariants().unwrap();
        assert_eq!(store.outputs(), &[g4, g4]);
        assert_eq!(store.fanout(g2.node), 0);
        assert_eq!(store.fanout(g4.node), 2);
        assert_eq!(store.create_gate(&[r, c]), g4);
    }

    #[test]
    fn test_substitute_merge_cascades_upward() {
        let (mut store, pis) = imply_store_with_inputs(3);
        let (a, b, c) = (pis[0], pis[1], pis[2]);
        let g1 = store.create_gate(&[a, b]);
        let r = store.create_gate(&[b, a]);
        let p1 = store.create_gate(&[g1, c]);
        let p2 = store.create_gate(&[r, c]);
        let q1 = store.create_gate(&[p1, a]);
        let q2 = store.create_gate(&[p2, a]);
        store.create_output(q1);
        store.create_output(q2);

        store.substitute(g1.node, r).unwrap();

        store.check_invariants().unwrap();
        assert_eq!(store.outputs(), &[q2, q2]);
        assert_eq!(store.fanout(p1.node), 0);
        assert_eq!(store.fanout(q1.node), 0);
        assert_eq!(store.create_gate(&[p2, a]), q2);
    }

    #[test]
    fn test_check_invariants_rejects_duplicate_live_gates() {
        let (mut store, pis) = imply_store_with_inputs(2);
        let (a, b) = (pis[0], pis[1]);
        let g = store.create_gate(&[a, b]);
        store.create_output(g);
        // Bypass hash-consing to allocate a structural twin.
        let twin = NodeRef {
            id: store.nodes.len(),
        };
        store.nodes.push(Node::new(NodeKind::Gate {
            children: vec![a, b],
        }));
        store.nodes[a.node.id].fanout += 1;
        store.nodes[b.node.id].fanout += 1;
        store.create_output(twin.into());
        match store.check_invariants() {
            Err(ExsynError::InternalInvariantViolation(msg)) => {
                assert!(msg.contains("same children"), "{}", msg)
            }
            other => panic!("expected invariant violation, got {:?}", other),
        }
    }

    #[test]
    fn test_substitute_equivalent_preserves_function() {
        let (mut store, pis) = imply_store_with_inputs(2);
        let (a, b) = (pis[0], pis[1]);
        // or(a, b) built twice in different shapes.
        let not_a = store.create_not(a);
        let or1 = store.create_gate(&[not_a, b]);
        let not_b = store.create_not(b);
        let or2 = store.create_gate(&[not_b, a]);
        let top = store.create_gate(&[or1, a]);
        store.create_output(top);
        store.create_output(or1);
        let before = simulate_truth_tables(&store).unwrap();

        store.substitute(or1.node, or2).unwrap();

        assert_eq!(simulate_truth_tables(&store).unwrap(), before);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_substitute_non_equivalent_changes_function() {
        let (mut store, pis) = imply_store_with_inputs(2);
        let (a, b) = (pis[0], pis[1]);
        let g = store.create_gate(&[a, b]);
        store.create_output(g);
        store.substitute(g.node, !a).unwrap();
        let tts = simulate_truth_tables(&store).unwrap();
        assert_eq!(tts[0], TruthTable::var(2, 0).not());
    }

    #[test]
    fn test_substitute_rejects_immediate_self_loop() {
        let (mut store, pis) = imply_store_with_inputs(2);
        let g1 = store.create_gate(&[pis[0], pis[1]]);
        let g2 = store.create_gate(&[g1, pis[1]]);
        store.create_output(g2);
        let snapshot = store.clone();
        match store.substitute(g1.node, g2) {
            Err(ExsynError::InternalInvariantViolation(_)) => {}
            other => panic!("expected invariant violation, got {:?}", other),
        }
        assert!(store.substitute(g1.node, g1).is_err());
        assert_eq!(store.nodes(), snapshot.nodes());
        assert_eq!(store.outputs(), snapshot.outputs());
    }

    #[test]
    fn test_derived_imply_gates() {
        let (mut store, pis) = imply_store_with_inputs(2);
        let (a, b) = (pis[0], pis[1]);
        let or = store.create_or(a, b);
        let and = store.create_and(a, b);
        let xor = store.create_xor(a, b);
        store.create_output(or);
        store.create_output(and);
        store.create_output(xor);
        let tts = simulate_truth_tables(&store).unwrap();
        assert_eq!(tts[0].to_hex(), "e");
        assert_eq!(tts[1].to_hex(), "8");
        assert_eq!(tts[2].to_hex(), "6");
        store.check_invariants().unwrap();
    }

    #[test]
    #[should_panic(expected = "scratch value of %1 is already 0")]
    fn test_decr_value_below_zero_panics() {
        let (mut store, pis) = imply_store_with_inputs(1);
        store.decr_value(pis[0].node);
    }

    #[test]
    fn test_scratch_values_and_visited() {
        let (mut store, pis) = imply_store_with_inputs(1);
        let a = pis[0].node;
        assert_eq!(store.incr_value(a), 0);
        assert_eq!(store.incr_value(a), 1);
        assert_eq!(store.decr_value(a), 1);
        store.set_value(a, 7);
        assert_eq!(store.value(a), 7);
        store.clear_values();
        assert_eq!(store.value(a), 0);
        store.set_visited(a, 3);
        assert_eq!(store.visited(a), 3);
        store.clear_visited();
        assert_eq!(store.visited(a), 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_out_of_range_child_panics() {
        let (mut store, pis) = imply_store_with_inputs(1);
        store.create_gate(&[pis[0], Signal::new(42, false)]);
    }

    #[test]
    fn test_display_listing() {
        let mut store = NodeStore::new(GateKind::majority3());
        let a = store.create_primary_input();
        let b = store.create_primary_input();
        let c = store.create_primary_input();
        let m = store.create_gate(&[a, !b, c]);
        store.create_output(!m);
        let text = store.to_string();
        assert_eq!(
            text,
            "fn majority3(a, b, c) -> (o0) {\n  %4 = maj(a, !b, c)\n  o0 = !%4\n}"
        );
    }
}
