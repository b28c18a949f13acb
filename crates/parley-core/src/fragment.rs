//! Detached subgraph snapshots.
//!
//! A [`Fragment`] is a node plus every node reachable from it, captured by
//! value. It is closed: every pointer inside targets a node inside. The
//! clipboard stores fragments, and pasting a duplicate re-identifies one so it
//! can be grafted back without id clashes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::graph::DialogueGraph;
use crate::id::NodeId;
use crate::node::{DialogueNode, NodeKind};
use crate::pointer::Pointer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    root: NodeId,
    /// Depth-first pre-order; `nodes[0]` is the root.
    nodes: Vec<DialogueNode>,
}

impl Fragment {
    /// Snapshots `node` and its reachable descendants. Shared descendants
    /// appear once, so links inside the subtree survive as links.
    pub fn capture(graph: &DialogueGraph, node: NodeId) -> Result<Fragment, CoreError> {
        if !graph.contains(node) {
            return Err(CoreError::NodeNotFound { id: node });
        }
        let nodes = graph
            .descendants(node)
            .into_iter()
            .filter_map(|id| graph.node(id).cloned())
            .collect();
        Ok(Fragment { root: node, nodes })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_kind(&self) -> Option<NodeKind> {
        self.nodes.first().map(|n| n.kind)
    }

    pub fn nodes(&self) -> &[DialogueNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Returns a copy with fresh node and pointer ids allocated from `graph`.
    ///
    /// Only id counters on `graph` advance; nothing is inserted.
    pub fn reidentify(&self, graph: &mut DialogueGraph) -> Result<Fragment, CoreError> {
        let fresh: HashMap<NodeId, NodeId> = self
            .nodes
            .iter()
            .map(|n| Ok::<_, CoreError>((n.id, graph.allocate_node_id()?)))
            .collect::<Result<_, CoreError>>()?;
        let remap = |id: NodeId| fresh.get(&id).copied().unwrap_or(id);
        let nodes = self
            .nodes
            .iter()
            .map(|n| {
                let pointers = n
                    .pointers()
                    .iter()
                    .map(|p| Ok::<_, CoreError>(Pointer::with_data(graph.allocate_pointer_id()?, remap(p.target), p.data.clone())))
                    .collect::<Result<_, CoreError>>()?;
                Ok::<_, CoreError>(DialogueNode::with_pointers(remap(n.id), n.kind, n.content.clone(), pointers))
            })
            .collect::<Result<_, CoreError>>()?;
        Ok(Fragment {
            root: remap(self.root),
            nodes,
        })
    }

    pub fn into_nodes(self) -> Vec<DialogueNode> {
        self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ParentRef;
    use crate::node::NodeContent;

    fn diamond() -> DialogueGraph {
        // E0 -> {R1, R2} -> E3
        let mut g = DialogueGraph::new();
        let (e0, _) = g
            .add_node(ParentRef::Root, None, NodeKind::Entry, NodeContent::text("start"))
            .unwrap();
        let (r1, _) = g
            .add_node(e0.into(), None, NodeKind::Reply, NodeContent::text("a"))
            .unwrap();
        let (r2, _) = g
            .add_node(e0.into(), None, NodeKind::Reply, NodeContent::text("b"))
            .unwrap();
        let (e3, _) = g
            .add_node(r1.into(), None, NodeKind::Entry, NodeContent::text("end"))
            .unwrap();
        let link = g.allocate_pointer_id().unwrap();
        g.insert_pointer(r2.into(), 0, Pointer::new(link, e3)).unwrap();
        g
    }

    #[test]
    fn capture_lists_shared_nodes_once() {
        let g = diamond();
        let fragment = Fragment::capture(&g, NodeId(0)).unwrap();
        assert_eq!(fragment.len(), 4);
        assert_eq!(fragment.root_kind(), Some(NodeKind::Entry));
        assert!(fragment.contains(NodeId(3)));
    }

    #[test]
    fn capture_missing_node_errors() {
        let g = diamond();
        assert_eq!(
            Fragment::capture(&g, NodeId(9)).unwrap_err(),
            CoreError::NodeNotFound { id: NodeId(9) }
        );
    }

    #[test]
    fn reidentify_keeps_shape_with_fresh_ids() {
        let mut g = diamond();
        let fragment = Fragment::capture(&g, NodeId(1)).unwrap();
        let copy = fragment.reidentify(&mut g).unwrap();
        assert_eq!(copy.len(), 2);
        assert_ne!(copy.root(), fragment.root());
        for node in copy.nodes() {
            assert!(!g.contains(node.id));
        }
        let inner = copy.nodes()[0].pointers()[0].target;
        assert_eq!(inner, copy.nodes()[1].id);
        assert_eq!(copy.nodes()[1].text(), "end");
    }

    #[test]
    fn reidentified_fragment_grafts_cleanly() {
        let mut g = diamond();
        let fragment = Fragment::capture(&g, NodeId(1)).unwrap();
        let copy = fragment.reidentify(&mut g).unwrap();
        let pointer = Pointer::new(g.allocate_pointer_id().unwrap(), copy.root());
        g.graft(NodeId(0).into(), 2, pointer, copy.into_nodes()).unwrap();
        assert_eq!(g.node_count(), 6);
        assert!(g.validate().is_ok());
    }
}
