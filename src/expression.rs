// SPDX-License-Identifier: Apache-2.0

//! Textual expressions for networks: `maj(a, !b, imp(c, 0))`.

use std::collections::HashMap;

use crate::gate::{NodeKind, NodeRef, Signal};
use crate::node_store::NodeStore;
use crate::topo::postorder_from_signals;

/// `a`..`z`, then `x26`, `x27`, ...
pub fn input_name(index: usize) -> String {
    if index < 26 {
        ((b'a' + index as u8) as char).to_string()
    } else {
        format!("x{}", index)
    }
}

fn with_polarity(text: &str, negated: bool) -> String {
    if negated {
        format!("!{}", text)
    } else {
        text.to_string()
    }
}

/// Renders every output of `store` as a nested expression.
pub fn output_expressions(store: &NodeStore) -> Vec<String> {
    let outputs = store.outputs();
    let order = postorder_from_signals(outputs, store.nodes());
    let mut rendered: HashMap<NodeRef, String> = HashMap::new();
    for node_ref in order {
        let text = match &store.node(node_ref).kind {
            NodeKind::Constant => "0".to_string(),
            NodeKind::Input { index } => input_name(*index),
            NodeKind::Gate { children } => {
                let args: Vec<String> = children
                    .iter()
                    .map(|c| signal_text(&rendered, *c))
                    .collect();
                format!("{}({})", store.gate_kind().mnemonic(), args.join(", "))
            }
        };
        rendered.insert(node_ref, text);
    }
    outputs.iter().map(|o| signal_text(&rendered, *o)).collect()
}

fn signal_text(rendered: &HashMap<NodeRef, String>, signal: Signal) -> String {
    if signal.node.id == 0 {
        return if signal.negated { "1" } else { "0" }.to_string();
    }
    let base = rendered
        .get(&signal.node)
        .map(String::as_str)
        .unwrap_or("?");
    with_polarity(base, signal.negated)
}

/// Outputs joined with `; ` (a single-output network renders as one
/// expression).
pub fn to_expression(store: &NodeStore) -> String {
    output_expressions(store).join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateKind;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(0, "a")]
    #[test_case(2, "c")]
    #[test_case(25, "z")]
    #[test_case(26, "x26")]
    fn test_input_name(index: usize, want: &str) {
        assert_eq!(input_name(index), want);
    }

    #[test]
    fn test_nested_majority_expression() {
        let mut store = NodeStore::new(GateKind::majority3());
        let a = store.create_primary_input();
        let b = store.create_primary_input();
        let c = store.create_primary_input();
        let t = store.get_constant(true);
        let inner = store.create_gate(&[a, b, t]);
        let outer = store.create_gate(&[inner, !c, a]);
        store.create_output(!outer);
        assert_eq!(to_expression(&store), "!maj(a, !c, maj(1, a, b))");
    }

    #[test]
    fn test_imply_expression_and_constants() {
        let mut store = NodeStore::new(GateKind::Imply);
        let a = store.create_primary_input();
        let b = store.create_primary_input();
        let or = store.create_or(a, b);
        let t = store.get_constant(true);
        store.create_output(or);
        store.create_output(t);
        assert_eq!(
            output_expressions(&store),
            vec!["imp(imp(a, 0), b)".to_string(), "1".to_string()]
        );
    }
}
