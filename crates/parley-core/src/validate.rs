//! Structural invariant checks.
//!
//! [`check`] is run by every graph primitive before a staged mutation is
//! committed, and by the load path before a deserialized graph is accepted.
//! Cycles are rejected here rather than tolerated by traversal: a graph that
//! passes `check` is a DAG rooted at the synthetic root.

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;

use crate::error::{CoreError, Invariant};
use crate::graph::DialogueGraph;
use crate::id::{ParentRef, PointerId};
use crate::node::NodeKind;

/// Checks all structural invariants, reporting the first violation found.
///
/// Order: identity, dangling pointers, kind alternation, acyclicity,
/// reachability. Later checks rely on earlier ones (e.g. reachability is
/// only meaningful once every target is known to exist).
pub fn check(graph: &DialogueGraph) -> Result<(), CoreError> {
    check_identity(graph)?;
    check_targets(graph)?;
    check_alternation(graph)?;
    let map = structure_map(graph);
    check_acyclic(&map)?;
    check_reachable(graph, &map)
}

/// Builds a petgraph view of the parent -> child structure.
///
/// Parallel pointers between the same pair collapse into one edge; the edge
/// weight is the last such pointer.
pub fn structure_map(graph: &DialogueGraph) -> DiGraphMap<ParentRef, PointerId> {
    let mut map = DiGraphMap::new();
    map.add_node(ParentRef::Root);
    for node in graph.nodes() {
        map.add_node(ParentRef::Node(node.id));
    }
    for (parent, pointers) in graph.pointer_lists() {
        for pointer in pointers {
            map.add_edge(parent, ParentRef::Node(pointer.target), pointer.id);
        }
    }
    map
}

fn check_identity(graph: &DialogueGraph) -> Result<(), CoreError> {
    for (key, node) in graph.node_entries() {
        if *key != node.id {
            return Err(CoreError::violation(
                Invariant::UniqueIdentity,
                format!("node stored under id {} reports id {}", key, node.id),
            ));
        }
    }
    let mut seen = HashSet::new();
    for (parent, pointers) in graph.pointer_lists() {
        for pointer in pointers {
            if !seen.insert(pointer.id) {
                return Err(CoreError::violation(
                    Invariant::UniqueIdentity,
                    format!("pointer {} appears more than once (again under {})", pointer.id, parent),
                ));
            }
        }
    }
    Ok(())
}

fn check_targets(graph: &DialogueGraph) -> Result<(), CoreError> {
    for (parent, pointers) in graph.pointer_lists() {
        for pointer in pointers {
            if !graph.contains(pointer.target) {
                return Err(CoreError::violation(
                    Invariant::DanglingPointer,
                    format!(
                        "pointer {} under {} targets missing node {}",
                        pointer.id, parent, pointer.target
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_alternation(graph: &DialogueGraph) -> Result<(), CoreError> {
    for (parent, pointers) in graph.pointer_lists() {
        let expected = match parent {
            ParentRef::Root => NodeKind::Entry,
            ParentRef::Node(id) => match graph.node(id) {
                Some(node) => node.kind.child_kind(),
                None => continue,
            },
        };
        for pointer in pointers {
            let Some(child) = graph.node(pointer.target) else {
                continue;
            };
            if child.kind != expected {
                return Err(CoreError::violation(
                    Invariant::KindAlternation,
                    format!(
                        "{} cannot hold {} {} (expected {})",
                        parent, child.kind, child.id, expected
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_acyclic(map: &DiGraphMap<ParentRef, PointerId>) -> Result<(), CoreError> {
    toposort(map, None).map(|_| ()).map_err(|cycle| {
        CoreError::violation(
            Invariant::Acyclic,
            format!("node {} is its own ancestor", cycle.node_id()),
        )
    })
}

fn check_reachable(
    graph: &DialogueGraph,
    map: &DiGraphMap<ParentRef, PointerId>,
) -> Result<(), CoreError> {
    let mut reached = HashSet::new();
    let mut dfs = Dfs::new(map, ParentRef::Root);
    while let Some(visited) = dfs.next(map) {
        reached.insert(visited);
    }
    for node in graph.nodes() {
        if !reached.contains(&ParentRef::Node(node.id)) {
            return Err(CoreError::violation(
                Invariant::Reachability,
                format!("node {} is not reachable from the root", node.id),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;
    use crate::node::{DialogueNode, NodeContent};
    use crate::pointer::Pointer;

    fn entry(id: u32, pointers: Vec<Pointer>) -> DialogueNode {
        DialogueNode::with_pointers(NodeId(id), NodeKind::Entry, NodeContent::text("e"), pointers)
    }

    fn reply(id: u32, pointers: Vec<Pointer>) -> DialogueNode {
        DialogueNode::with_pointers(NodeId(id), NodeKind::Reply, NodeContent::text("r"), pointers)
    }

    fn ptr(id: u32, target: u32) -> Pointer {
        Pointer::new(PointerId(id), NodeId(target))
    }

    #[test]
    fn valid_dag_passes() {
        // Two replies share the same follow-up entry.
        let graph = DialogueGraph::from_parts(
            vec![ptr(0, 0)],
            vec![
                entry(0, vec![ptr(1, 1), ptr(2, 2)]),
                reply(1, vec![ptr(3, 3)]),
                reply(2, vec![ptr(4, 3)]),
                entry(3, vec![]),
            ],
        );
        assert!(graph.is_ok());
    }

    #[test]
    fn cycle_is_rejected_at_load() {
        let err = DialogueGraph::from_parts(
            vec![ptr(0, 0)],
            vec![entry(0, vec![ptr(1, 1)]), reply(1, vec![ptr(2, 0)])],
        )
        .unwrap_err();
        assert_eq!(err.invariant(), Some(Invariant::Acyclic));
    }

    #[test]
    fn dangling_pointer_is_rejected() {
        let err = DialogueGraph::from_parts(vec![ptr(0, 0)], vec![entry(0, vec![ptr(1, 9)])])
            .unwrap_err();
        assert_eq!(err.invariant(), Some(Invariant::DanglingPointer));
    }

    #[test]
    fn root_reply_breaks_alternation() {
        let err = DialogueGraph::from_parts(vec![ptr(0, 0)], vec![reply(0, vec![])]).unwrap_err();
        assert_eq!(err.invariant(), Some(Invariant::KindAlternation));
    }

    #[test]
    fn entry_under_entry_breaks_alternation() {
        let err = DialogueGraph::from_parts(
            vec![ptr(0, 0)],
            vec![entry(0, vec![ptr(1, 1)]), entry(1, vec![])],
        )
        .unwrap_err();
        assert_eq!(err.invariant(), Some(Invariant::KindAlternation));
    }

    #[test]
    fn orphan_is_rejected() {
        let err = DialogueGraph::from_parts(vec![ptr(0, 0)], vec![entry(0, vec![]), entry(1, vec![])])
            .unwrap_err();
        assert_eq!(err.invariant(), Some(Invariant::Reachability));
    }

    #[test]
    fn duplicate_pointer_ids_are_rejected() {
        let err = DialogueGraph::from_parts(
            vec![ptr(0, 0)],
            vec![entry(0, vec![ptr(0, 1)]), reply(1, vec![])],
        )
        .unwrap_err();
        assert_eq!(err.invariant(), Some(Invariant::UniqueIdentity));
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let err = DialogueGraph::from_parts(vec![ptr(0, 0)], vec![entry(0, vec![]), entry(0, vec![])])
            .unwrap_err();
        assert_eq!(err.invariant(), Some(Invariant::UniqueIdentity));
    }

    #[test]
    fn last_possible_ids_are_rejected_at_load() {
        let err = DialogueGraph::from_parts(vec![ptr(0, u32::MAX)], vec![entry(u32::MAX, vec![])])
            .unwrap_err();
        assert_eq!(err, CoreError::IdSpaceExhausted { space: "node" });

        let err = DialogueGraph::from_parts(vec![ptr(u32::MAX, 0)], vec![entry(0, vec![])])
            .unwrap_err();
        assert_eq!(err, CoreError::IdSpaceExhausted { space: "pointer" });

        // One below the limit still loads.
        let graph = DialogueGraph::from_parts(vec![ptr(0, u32::MAX - 1)], vec![entry(u32::MAX - 1, vec![])]);
        assert!(graph.is_ok());
    }

    #[test]
    fn deserialized_snapshot_with_max_pointer_id_is_an_error() {
        let graph = DialogueGraph::from_parts(vec![ptr(0, 0)], vec![entry(0, vec![])]).unwrap();
        let mut value = serde_json::to_value(&graph).unwrap();
        value["root"][0]["id"] = u32::MAX.into();
        value["next_pointer_id"] = 0.into();
        let loaded: DialogueGraph = serde_json::from_value(value).unwrap();
        // Structurally fine, but no pointer id can follow it.
        assert!(loaded.validate().is_ok());
        assert_eq!(loaded.validated().unwrap_err(), CoreError::IdSpaceExhausted { space: "pointer" });
    }

    #[test]
    fn structure_map_has_root_and_every_node() {
        let graph = DialogueGraph::from_parts(
            vec![ptr(0, 0)],
            vec![entry(0, vec![ptr(1, 1)]), reply(1, vec![])],
        )
        .unwrap();
        let map = structure_map(&graph);
        assert_eq!(map.node_count(), 3);
        assert_eq!(map.edge_count(), 2);
        assert_eq!(map.edge_weight(ParentRef::Root, ParentRef::Node(NodeId(0))), Some(&PointerId(0)));
    }
}
