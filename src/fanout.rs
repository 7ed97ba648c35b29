// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use crate::node_store::NodeStore;

/// Computes a histogram of fan-out counts over primary inputs and gates.
///
/// The constant node is excluded. Output references are part of the recorded
/// fan-out, so a gate driving one output and nothing else lands in bucket 1.
/// Returns a map from fan-out count to the number of nodes with that count.
pub fn fanout_histogram(store: &NodeStore) -> BTreeMap<u32, usize> {
    let mut histogram: BTreeMap<u32, usize> = BTreeMap::new();
    for node in store.nodes().iter().skip(1) {
        *histogram.entry(node.fanout).or_insert(0) += 1;
    }
    histogram
}

/// Gates whose fan-out is zero: not referenced by any gate or output.
pub fn dangling_gates(store: &NodeStore) -> usize {
    store.gates().filter(|g| store.fanout(*g) == 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateKind;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fanout_histogram_imply_xor() {
        let mut store = NodeStore::new(GateKind::Imply);
        let a = store.create_primary_input();
        let b = store.create_primary_input();
        let x = store.create_xor(a, b);
        store.create_output(x);
        // a: not(a), imp(a, b); b: not(b), imp(a, b); not(a), not(b) feed
        // imp(!a, !b); imp(!a, !b) feeds its not; imp(a, b) and that not feed
        // the top gate; the top gate feeds the output.
        let hist = fanout_histogram(&store);
        assert_eq!(
            hist,
            btreemap! {
                1 => 6,
                2 => 2,
            }
        );
        assert_eq!(dangling_gates(&store), 0);
    }

    #[test]
    fn test_dangling_after_substitute() {
        let mut store = NodeStore::new(GateKind::majority3());
        let a = store.create_primary_input();
        let b = store.create_primary_input();
        let c = store.create_primary_input();
        let m = store.create_gate(&[a, b, c]);
        store.create_output(m);
        store.substitute(m.node, a).unwrap();
        assert_eq!(dangling_gates(&store), 1);
        assert_eq!(fanout_histogram(&store).get(&0), Some(&1));
    }
}
