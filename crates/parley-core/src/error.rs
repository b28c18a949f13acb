//! Core error types for parley-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! all anticipated failure modes in the dialogue graph data model.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::{NodeId, PointerId};

/// The structural invariants every committed graph must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Invariant {
    /// Every node is reachable from the root.
    Reachability,
    /// Root -> Entry, Entry -> Reply, Reply -> Entry.
    KindAlternation,
    /// No node is its own ancestor.
    Acyclic,
    /// Every pointer targets a node in the node set.
    DanglingPointer,
    /// Node keys match node ids and pointer ids are unique.
    UniqueIdentity,
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Invariant::Reachability => "reachability",
            Invariant::KindAlternation => "kind alternation",
            Invariant::Acyclic => "acyclicity",
            Invariant::DanglingPointer => "dangling pointer",
            Invariant::UniqueIdentity => "unique identity",
        };
        f.write_str(name)
    }
}

/// Core errors produced by the parley-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A node id was not found in the graph.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// A pointer id was not found in the graph.
    #[error("pointer not found: PointerId({id})", id = id.0)]
    PointerNotFound { id: PointerId },

    /// An insertion index was past the end of a pointer list.
    #[error("index {index} out of range for pointer list of length {len}")]
    InvalidIndex { index: usize, len: usize },

    /// A mutation would break (or a loaded graph breaks) a structural invariant.
    #[error("graph invariant violated ({invariant}): {reason}")]
    InvariantViolation { invariant: Invariant, reason: String },

    /// Every `u32` id of this space is taken.
    #[error("no {space} ids left to allocate")]
    IdSpaceExhausted { space: &'static str },
}

impl CoreError {
    pub(crate) fn violation(invariant: Invariant, reason: impl Into<String>) -> Self {
        CoreError::InvariantViolation {
            invariant,
            reason: reason.into(),
        }
    }

    /// Returns the violated invariant, if this is an invariant violation.
    pub fn invariant(&self) -> Option<Invariant> {
        match self {
            CoreError::InvariantViolation { invariant, .. } => Some(*invariant),
            _ => None,
        }
    }
}
