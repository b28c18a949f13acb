//! Deterministic structure hashing with blake3.
//!
//! Hashes are derived state and never stored. Nodes are hashed in id order so
//! two graphs with the same nodes, pointers and content hash equally even when
//! their arenas were filled in a different order (as happens after undoing a
//! deletion).

use crate::graph::DialogueGraph;
use crate::node::DialogueNode;
use crate::pointer::Pointer;

/// Hash of a node's id, kind and content, ignoring its pointers.
pub fn hash_node_content(node: &DialogueNode) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&node.id.0.to_le_bytes());
    let bytes = serde_json::to_vec(&(node.kind, &node.content))
        .expect("NodeContent serialization should never fail");
    hasher.update(&bytes);
    hasher.finalize()
}

fn hash_pointers(hasher: &mut blake3::Hasher, pointers: &[Pointer]) {
    hasher.update(&(pointers.len() as u64).to_le_bytes());
    for pointer in pointers {
        let bytes =
            serde_json::to_vec(pointer).expect("Pointer serialization should never fail");
        hasher.update(&bytes);
    }
}

/// Fingerprint of the whole graph: root pointers plus every node (content and
/// ordered pointers), sorted by node id.
///
/// Equal fingerprints mean structurally equal graphs; id counters are not
/// part of the structure.
pub fn structure_fingerprint(graph: &DialogueGraph) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hash_pointers(&mut hasher, graph.root_pointers());

    let mut nodes: Vec<&DialogueNode> = graph.nodes().collect();
    nodes.sort_by_key(|n| n.id);
    for node in nodes {
        hasher.update(hash_node_content(node).as_bytes());
        hash_pointers(&mut hasher, node.pointers());
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ParentRef;
    use crate::node::{NodeContent, NodeKind};

    fn small() -> DialogueGraph {
        let mut g = DialogueGraph::new();
        let (e, _) = g
            .add_node(ParentRef::Root, None, NodeKind::Entry, NodeContent::text("Hello"))
            .unwrap();
        g.add_node(e.into(), None, NodeKind::Reply, NodeContent::text("Yes"))
            .unwrap();
        g
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(structure_fingerprint(&small()), structure_fingerprint(&small()));
    }

    #[test]
    fn content_change_changes_fingerprint() {
        let a = small();
        let mut b = small();
        b.replace_content(crate::id::NodeId(1), NodeContent::text("No"))
            .unwrap();
        assert_ne!(structure_fingerprint(&a), structure_fingerprint(&b));
    }

    #[test]
    fn remove_then_restore_keeps_fingerprint() {
        let mut g = small();
        let before = structure_fingerprint(&g);
        let pointer = g.root_pointers()[0].id;
        let detached = g.remove_pointer(pointer).unwrap();
        assert_ne!(structure_fingerprint(&g), before);
        g.restore(detached).unwrap();
        assert_eq!(structure_fingerprint(&g), before);
    }

    #[test]
    fn node_content_hash_ignores_pointers() {
        let g = small();
        let node = g.node(crate::id::NodeId(0)).unwrap();
        let bare = DialogueNode::new(node.id, node.kind, node.content.clone());
        assert_eq!(hash_node_content(node), hash_node_content(&bare));
    }
}
