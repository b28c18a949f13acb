//! Stable ID newtypes for dialogue graph entities.
//!
//! All IDs are distinct newtype wrappers over `u32`, providing type safety
//! so that a `NodeId` cannot be accidentally used where a `PointerId` is
//! expected. IDs are allocated by [`DialogueGraph`](crate::graph::DialogueGraph)
//! from monotonically increasing counters and are never reused.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable dialogue node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Stable pointer (link) identifier.
///
/// Within one traversal every pointer produces exactly one occurrence, so a
/// `PointerId` also identifies a presentation occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PointerId(pub u32);

/// The owner of an ordered pointer list: the synthetic root or a node.
///
/// The root has no `NodeId`, which is what makes "no pointer targets Root"
/// hold by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParentRef {
    Root,
    Node(NodeId),
}

impl ParentRef {
    /// Returns the node id, or `None` for the root.
    pub fn node(self) -> Option<NodeId> {
        match self {
            ParentRef::Root => None,
            ParentRef::Node(id) => Some(id),
        }
    }

    pub fn is_root(self) -> bool {
        matches!(self, ParentRef::Root)
    }
}

impl From<NodeId> for ParentRef {
    fn from(id: NodeId) -> Self {
        ParentRef::Node(id)
    }
}

// Display implementations -- just print the inner value.

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PointerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::Root => write!(f, "root"),
            ParentRef::Node(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        assert_eq!(format!("{}", NodeId(7)), "7");
    }

    #[test]
    fn pointer_id_display() {
        assert_eq!(format!("{}", PointerId(99)), "99");
    }

    #[test]
    fn parent_ref_display() {
        assert_eq!(ParentRef::Root.to_string(), "root");
        assert_eq!(ParentRef::Node(NodeId(3)).to_string(), "3");
    }

    #[test]
    fn parent_ref_node_accessor() {
        assert_eq!(ParentRef::Root.node(), None);
        assert_eq!(ParentRef::from(NodeId(4)).node(), Some(NodeId(4)));
        assert!(ParentRef::Root.is_root());
    }

    #[test]
    fn root_sorts_before_nodes() {
        assert!(ParentRef::Root < ParentRef::Node(NodeId(0)));
    }

    #[test]
    fn serde_roundtrip() {
        let node = NodeId(42);
        let json = serde_json::to_string(&node).unwrap();
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);

        let parent = ParentRef::Node(NodeId(5));
        let json = serde_json::to_string(&parent).unwrap();
        let back: ParentRef = serde_json::from_str(&json).unwrap();
        assert_eq!(parent, back);
    }
}
