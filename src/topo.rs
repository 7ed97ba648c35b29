// SPDX-License-Identifier: Apache-2.0

use crate::exsyn_error::ExsynError;
use crate::gate::{Node, NodeRef, Signal};
use std::collections::{HashSet, VecDeque};

/// Returns a postorder traversal (children before parents) of the nodes
/// reachable from `signals`, deduplicated by node.
///
/// The graph must be acyclic; use `topo_order_and_cycle_check` first when
/// that is in doubt.
pub fn postorder_from_signals(signals: &[Signal], nodes: &[Node]) -> Vec<NodeRef> {
    let mut worklist: Vec<NodeRef> = signals.iter().rev().map(|s| s.node).collect();
    let mut visited: HashSet<NodeRef> = HashSet::new();
    let mut postorder = Vec::new();
    while let Some(current) = worklist.pop() {
        if visited.contains(&current) {
            continue;
        }
        let mut all_deps_visited = true;
        for dep in nodes[current.id].children() {
            if !visited.contains(&dep.node) {
                worklist.push(current); // Revisit after dependencies
                worklist.push(dep.node);
                all_deps_visited = false;
                break;
            }
        }
        if all_deps_visited {
            visited.insert(current);
            postorder.push(current);
        }
    }
    postorder
}

/// Kahn's algorithm over every node in the arena. Returns the order plus, if
/// a cycle exists, the ids that could not be placed.
pub fn topo_order_and_cycle_check(nodes: &[Node]) -> (Vec<NodeRef>, Option<Vec<usize>>) {
    let count = nodes.len();
    let mut indegree = vec![0usize; count];
    let mut parents: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (i, node) in nodes.iter().enumerate() {
        for child in node.children() {
            if child.node.id < count {
                indegree[i] += 1;
                parents[child.node.id].push(i);
            }
        }
    }
    let mut queue: VecDeque<usize> = (0..count).filter(|i| indegree[*i] == 0).collect();
    let mut topo: Vec<NodeRef> = Vec::with_capacity(count);
    while let Some(id) = queue.pop_front() {
        topo.push(NodeRef { id });
        for &parent in &parents[id] {
            indegree[parent] -= 1;
            if indegree[parent] == 0 {
                queue.push_back(parent);
            }
        }
    }
    if topo.len() != count {
        let placed: HashSet<usize> = topo.iter().map(|r| r.id).collect();
        let not_visited: Vec<usize> = (0..count).filter(|id| !placed.contains(id)).collect();
        (topo, Some(not_visited))
    } else {
        (topo, None)
    }
}

/// Topological order of all nodes; a cycle is an invariant violation.
pub fn topo_sort_refs(nodes: &[Node]) -> Result<Vec<NodeRef>, ExsynError> {
    let (order, cycle) = topo_order_and_cycle_check(nodes);
    if let Some(not_visited) = cycle {
        log::error!("cycle detected; not visited: {:?}", not_visited);
        return Err(ExsynError::InternalInvariantViolation(format!(
            "cycle detected: topological sort visited {} of {} nodes; not visited: {:?}",
            nodes.len() - not_visited.len(),
            nodes.len(),
            not_visited
        )));
    }
    Ok(order)
}
