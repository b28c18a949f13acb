//! Edit result types.
//!
//! Every edit operation returns [`EditResult`]:
//! - `Ok(Outcome::Applied(_))`: the operation took effect. For graph edits
//!   that means one undo entry was recorded and one notification published;
//!   copy only stages the clipboard.
//! - `Ok(Outcome::Skipped(_))`: a legal no-op; carries a status message.
//! - `Err(EditError::Refused(_))`: a user-recoverable rule violation; nothing
//!   changed.
//! - `Err(EditError::Core(_))`: a graph invariant breach, which means an
//!   engine bug, or no fresh ids are left; nothing changed.

use parley_core::{CoreError, NodeId, NodeKind, ParentRef, PointerId};
use thiserror::Error;

/// Why an edit was refused. Each variant is a rule the author can act on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("occurrence {pointer} is not part of the current dialogue")]
    UnknownOccurrence { pointer: PointerId },

    #[error("node {node} is not part of the current dialogue")]
    UnknownNode { node: NodeId },

    #[error("cannot add children under a link; use the original node instead")]
    LinkParent,

    #[error("{found} cannot be placed under {parent} (expected {expected})")]
    KindMismatch {
        parent: ParentRef,
        expected: NodeKind,
        found: NodeKind,
    },

    #[error("cannot drop a node onto itself")]
    DropOntoSelf,

    #[error("node {node} would become its own descendant")]
    WouldCreateCycle { node: NodeId },

    #[error("only the original occurrence of a node can be moved, not a link")]
    DraggedLink,

    #[error("cannot drop into a link; drop into the original node instead")]
    IntoLink,

    #[error("index {index} is out of range for a list of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("the clipboard is empty")]
    ClipboardEmpty,

    #[error("cannot paste a cut node as a link; undo the cut and copy it, or paste as duplicate")]
    LinkAfterCut,

    #[error("the copied node {node} no longer exists")]
    ClipboardSourceMissing { node: NodeId },

    #[error("the cut is no longer the most recent edit and cannot be recovered")]
    CutNotRecoverable,

    #[error("node content can only be edited through its original occurrence")]
    EditThroughLink,

    #[error("replies are always spoken by the player")]
    SpeakerOnReply,

    #[error("a {0} is in progress; the dialogue cannot change until it finishes")]
    IoPending(IoOperation),

    #[error("the loaded dialogue is invalid: {0}")]
    InvalidGraph(CoreError),
}

/// An outstanding external file operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    Save,
    Load,
}

impl std::fmt::Display for IoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoOperation::Save => f.write_str("save"),
            IoOperation::Load => f.write_str("load"),
        }
    }
}

/// Errors returned by edit operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("{0}")]
    Refused(#[from] Refusal),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EditError {
    pub fn refusal(&self) -> Option<&Refusal> {
        match self {
            EditError::Refused(r) => Some(r),
            EditError::Core(_) => None,
        }
    }
}

/// The successful result of an edit operation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    Applied(T),
    /// Nothing to do. The message is meant for a status bar.
    Skipped(String),
}

impl<T> Outcome<T> {
    pub fn skipped(message: impl Into<String>) -> Self {
        Outcome::Skipped(message.into())
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(v) => Some(v),
            Outcome::Skipped(_) => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Applied(_) => None,
            Outcome::Skipped(m) => Some(m),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Applied(v) => Outcome::Applied(f(v)),
            Outcome::Skipped(m) => Outcome::Skipped(m),
        }
    }
}

pub type EditResult<T> = Result<Outcome<T>, EditError>;
