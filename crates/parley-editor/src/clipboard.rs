//! Cut/copy staging.

use parley_core::{Fragment, NodeId, NodeKind, PointerData};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardMode {
    Copied,
    /// The source pointer was removed when the entry was staged.
    Cut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardEntry {
    pub mode: ClipboardMode,
    /// The staged node's id in the graph it was taken from.
    pub node: NodeId,
    pub kind: NodeKind,
    /// Edge data of the pointer the node was copied through.
    pub pointer_data: PointerData,
    /// Snapshot of the node and everything below it at staging time.
    pub fragment: Fragment,
    /// Undo entry recorded by the cut, used to recover it as a copy.
    pub cut_entry: Option<Uuid>,
}

impl ClipboardEntry {
    pub fn is_cut(&self) -> bool {
        self.mode == ClipboardMode::Cut
    }
}

#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    entry: Option<ClipboardEntry>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever was staged before.
    pub fn stage(&mut self, entry: ClipboardEntry) {
        self.entry = Some(entry);
    }

    pub fn get(&self) -> Option<&ClipboardEntry> {
        self.entry.as_ref()
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    /// Turns a recovered cut into a plain copy.
    pub fn mark_copied(&mut self) {
        if let Some(entry) = &mut self.entry {
            entry.mode = ClipboardMode::Copied;
            entry.cut_entry = None;
        }
    }
}
