//! Pointer (link) type.
//!
//! A [`Pointer`] is a directed edge from a parent (a node or the synthetic
//! root) to a child node. It is the only way a node becomes a child, and the
//! same node may be the target of many pointers. Edge-local data lives in
//! [`PointerData`] so it can be edited per occurrence.

use serde::{Deserialize, Serialize};

use crate::id::{NodeId, PointerId};
use crate::node::ScriptHook;

/// Data carried by a single pointer, independent of its target node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerData {
    /// "Appears when" condition evaluated for this edge.
    pub condition: ScriptHook,
    /// Comment specific to this link.
    pub comment: String,
}

impl PointerData {
    pub fn with_condition(condition: ScriptHook) -> Self {
        PointerData {
            condition,
            comment: String::new(),
        }
    }
}

/// A directed edge to a child node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    pub id: PointerId,
    pub target: NodeId,
    #[serde(default)]
    pub data: PointerData,
}

impl Pointer {
    /// Creates a pointer with empty edge data.
    pub fn new(id: PointerId, target: NodeId) -> Self {
        Pointer {
            id,
            target,
            data: PointerData::default(),
        }
    }

    pub fn with_data(id: PointerId, target: NodeId, data: PointerData) -> Self {
        Pointer { id, target, data }
    }

    pub fn has_condition(&self) -> bool {
        self.data.condition.is_set()
    }
}
