//! The current node, shared by every view.
//!
//! Selection is stored as a node identity plus the occurrence it is shown
//! through. The occurrence is a hint: whenever it does not show the node (it
//! was deleted, or the caller had none), the node's canonical occurrence is
//! used instead. A node with no occurrence at all cannot be selected.

use parley_core::{NodeId, PointerId, Projection};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub node: NodeId,
    pub occurrence: PointerId,
}

/// Resolves `node` to a visible occurrence, preferring `preferred`.
pub fn resolve(projection: &Projection, node: NodeId, preferred: Option<PointerId>) -> Option<Selection> {
    let occurrence = preferred
        .and_then(|p| projection.get(p))
        .filter(|o| o.node == node)
        .or_else(|| projection.canonical(node))?;
    Some(Selection {
        node,
        occurrence: occurrence.pointer,
    })
}

#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    current: Option<Selection>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Selection> {
        self.current
    }

    pub fn node(&self) -> Option<NodeId> {
        self.current.map(|s| s.node)
    }

    /// Selects `node`. Returns the new selection, or `None` (leaving the
    /// state untouched) when the node has no occurrence.
    pub fn select(
        &mut self,
        projection: &Projection,
        node: NodeId,
        preferred: Option<PointerId>,
    ) -> Option<Selection> {
        let selection = resolve(projection, node, preferred)?;
        self.current = Some(selection);
        Some(selection)
    }

    pub fn set(&mut self, selection: Option<Selection>) {
        self.current = selection;
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Re-resolves the selection after the projection was rebuilt.
    /// Returns whether it changed.
    pub fn revalidate(&mut self, projection: &Projection) -> bool {
        let Some(old) = self.current else {
            return false;
        };
        self.current = resolve(projection, old.node, Some(old.occurrence));
        self.current != Some(old)
    }
}
