// SPDX-License-Identifier: Apache-2.0

//! Small networks shared by unit and integration tests.

use crate::gate::{GateKind, Signal};
use crate::node_store::NodeStore;

pub struct TestNetwork {
    pub store: NodeStore,
    pub inputs: Vec<Signal>,
}

fn with_inputs(kind: GateKind, n: usize) -> TestNetwork {
    let mut store = NodeStore::new(kind);
    let inputs = (0..n).map(|_| store.create_primary_input()).collect();
    TestNetwork { store, inputs }
}

/// `a ^ b` from six implications; one output.
pub fn setup_imply_xor() -> TestNetwork {
    let mut net = with_inputs(GateKind::Imply, 2);
    let (a, b) = (net.inputs[0], net.inputs[1]);
    let x = net.store.create_xor(a, b);
    net.store.create_output(x);
    net
}

/// 3-input parity from three majority gates with complemented edges:
/// `maj(!maj(a, b, c), maj(a, b, !c), c)`.
pub fn setup_majority_parity() -> TestNetwork {
    let mut net = with_inputs(GateKind::majority3(), 3);
    let (a, b, c) = (net.inputs[0], net.inputs[1], net.inputs[2]);
    let m1 = net.store.create_maj(a, b, c);
    let m2 = net.store.create_maj(a, b, !c);
    let top = net.store.create_maj(!m1, m2, c);
    net.store.create_output(top);
    net
}

/// Two structurally different realizations of `a | b` sharing inputs, with
/// both exposed as outputs; handy for substitution tests.
pub fn setup_redundant_or() -> TestNetwork {
    let mut net = with_inputs(GateKind::Imply, 2);
    let (a, b) = (net.inputs[0], net.inputs[1]);
    let or1 = net.store.create_or(a, b);
    let or2 = net.store.create_or(b, a);
    net.store.create_output(or1);
    net.store.create_output(or2);
    net
}
