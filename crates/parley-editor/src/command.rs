//! Reversible edit commands.
//!
//! The engine builds one [`EditCommand`] at the moment it mutates the graph.
//! Each variant carries enough to replay the mutation forward and to build its
//! inverse, so undo never needs a snapshot of the whole graph.

use parley_core::{
    CoreError, DialogueGraph, DialogueNode, NodeContent, NodeId, Pointer, PointerData, PointerId,
    PointerLocation,
};
use serde::{Deserialize, Serialize};

use crate::bus::ChangeKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditCommand {
    /// A pointer was inserted together with the nodes only it reaches
    /// (empty for a link).
    Attach {
        location: PointerLocation,
        pointer: Pointer,
        nodes: Vec<DialogueNode>,
    },
    /// A pointer was removed; `nodes` were garbage-collected with it.
    Detach {
        location: PointerLocation,
        pointer: Pointer,
        nodes: Vec<DialogueNode>,
    },
    /// A pointer moved. `to.index` is its index after the move.
    Move {
        pointer: PointerId,
        node: NodeId,
        from: PointerLocation,
        to: PointerLocation,
    },
    SetContent {
        node: NodeId,
        old: NodeContent,
        new: NodeContent,
    },
    SetPointerData {
        pointer: PointerId,
        node: NodeId,
        old: PointerData,
        new: PointerData,
    },
}

impl EditCommand {
    /// Returns the command that undoes this one.
    pub fn inverse(&self) -> EditCommand {
        match self {
            EditCommand::Attach {
                location,
                pointer,
                nodes,
            } => EditCommand::Detach {
                location: *location,
                pointer: pointer.clone(),
                nodes: nodes.clone(),
            },
            EditCommand::Detach {
                location,
                pointer,
                nodes,
            } => EditCommand::Attach {
                location: *location,
                pointer: pointer.clone(),
                nodes: nodes.clone(),
            },
            EditCommand::Move {
                pointer,
                node,
                from,
                to,
            } => EditCommand::Move {
                pointer: *pointer,
                node: *node,
                from: *to,
                to: *from,
            },
            EditCommand::SetContent { node, old, new } => EditCommand::SetContent {
                node: *node,
                old: new.clone(),
                new: old.clone(),
            },
            EditCommand::SetPointerData {
                pointer,
                node,
                old,
                new,
            } => EditCommand::SetPointerData {
                pointer: *pointer,
                node: *node,
                old: new.clone(),
                new: old.clone(),
            },
        }
    }

    /// Replays the command. Each variant maps to one transactional graph
    /// primitive, so a failure leaves the graph unchanged.
    pub fn apply(&self, graph: &mut DialogueGraph) -> Result<(), CoreError> {
        match self {
            EditCommand::Attach {
                location,
                pointer,
                nodes,
            } => graph.graft(location.parent, location.index, pointer.clone(), nodes.clone()),
            EditCommand::Detach { pointer, .. } => graph.remove_pointer(pointer.id).map(|_| ()),
            EditCommand::Move { pointer, to, .. } => {
                graph.move_pointer(*pointer, to.parent, to.index).map(|_| ())
            }
            EditCommand::SetContent { node, new, .. } => {
                graph.replace_content(*node, new.clone()).map(|_| ())
            }
            EditCommand::SetPointerData { pointer, new, .. } => {
                graph.replace_pointer_data(*pointer, new.clone()).map(|_| ())
            }
        }
    }

    pub fn change_kind(&self) -> ChangeKind {
        match self {
            EditCommand::Attach { .. } => ChangeKind::NodeAdded,
            EditCommand::Detach { .. } => ChangeKind::NodeDeleted,
            EditCommand::Move { .. } => ChangeKind::NodeMoved,
            EditCommand::SetContent { .. } | EditCommand::SetPointerData { .. } => {
                ChangeKind::NodeModified
            }
        }
    }

    pub fn affected_node(&self) -> NodeId {
        match self {
            EditCommand::Attach { pointer, .. } | EditCommand::Detach { pointer, .. } => {
                pointer.target
            }
            EditCommand::Move { node, .. }
            | EditCommand::SetContent { node, .. }
            | EditCommand::SetPointerData { node, .. } => *node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::hash::structure_fingerprint;
    use parley_core::{NodeKind, ParentRef};

    fn graph() -> (DialogueGraph, NodeId, PointerId) {
        let mut g = DialogueGraph::new();
        let (e, p) = g
            .add_node(ParentRef::Root, None, NodeKind::Entry, NodeContent::text("Hello"))
            .unwrap();
        (g, e, p)
    }

    #[test]
    fn inverse_of_inverse_is_identity() {
        let cmd = EditCommand::SetContent {
            node: NodeId(0),
            old: NodeContent::text("a"),
            new: NodeContent::text("b"),
        };
        assert_eq!(cmd.inverse().inverse(), cmd);
        assert_eq!(cmd.change_kind(), ChangeKind::NodeModified);
    }

    #[test]
    fn detach_then_attach_round_trips() {
        let (mut g, _, p) = graph();
        let before = structure_fingerprint(&g);
        let detached = g.remove_pointer(p).unwrap();
        let cmd = EditCommand::Detach {
            location: detached.location,
            pointer: detached.pointer,
            nodes: detached.collected,
        };
        cmd.inverse().apply(&mut g).unwrap();
        assert_eq!(structure_fingerprint(&g), before);
        cmd.apply(&mut g).unwrap();
        assert!(g.is_empty());
    }

    #[test]
    fn move_inverse_restores_order() {
        let (mut g, e, _) = graph();
        let (_, a) = g
            .add_node(e.into(), None, NodeKind::Reply, NodeContent::text("a"))
            .unwrap();
        let (b_node, _) = g
            .add_node(e.into(), None, NodeKind::Reply, NodeContent::text("b"))
            .unwrap();
        let before = structure_fingerprint(&g);
        let from = g.move_pointer(a, e.into(), 1).unwrap();
        let cmd = EditCommand::Move {
            pointer: a,
            node: NodeId(1),
            from,
            to: PointerLocation {
                parent: e.into(),
                index: 1,
            },
        };
        assert_eq!(g.node(e).unwrap().pointers()[0].target, b_node);
        cmd.inverse().apply(&mut g).unwrap();
        assert_eq!(structure_fingerprint(&g), before);
    }

    #[test]
    fn failed_apply_leaves_graph_unchanged() {
        let (mut g, e, _) = graph();
        let before = structure_fingerprint(&g);
        let bad = EditCommand::Attach {
            location: PointerLocation {
                parent: e.into(),
                index: 0,
            },
            pointer: Pointer::new(PointerId(40), NodeId(40)),
            nodes: Vec::new(),
        };
        assert!(bad.apply(&mut g).is_err());
        assert_eq!(structure_fingerprint(&g), before);
    }

    #[test]
    fn serializes_with_type_tag() {
        let cmd = EditCommand::SetPointerData {
            pointer: PointerId(2),
            node: NodeId(1),
            old: PointerData::default(),
            new: PointerData::default(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "SetPointerData");
    }
}
