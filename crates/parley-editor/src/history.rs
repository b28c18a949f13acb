//! Linear undo/redo history.
//!
//! Two stacks of [`UndoEntry`]. Recording clears the redo stack; the undo
//! stack is bounded and drops its oldest entry when full. Replaying an entry
//! goes through [`EditCommand::apply`], which is transactional, so a failed
//! undo or redo leaves both the graph and the stacks as they were.

use std::collections::VecDeque;

use parley_core::{CoreError, DialogueGraph};
use serde::Serialize;
use uuid::Uuid;

use crate::command::EditCommand;

/// One user-visible action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoEntry {
    pub id: Uuid,
    pub description: String,
    pub command: EditCommand,
}

/// A history listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub description: String,
    /// Whether this edit has been undone (sits on the redo stack).
    pub undone: bool,
}

impl From<&UndoEntry> for HistoryEntry {
    fn from(entry: &UndoEntry) -> Self {
        HistoryEntry {
            id: entry.id,
            description: entry.description.clone(),
            undone: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<UndoEntry>,
    redo: Vec<UndoEntry>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        History {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Records a committed edit. Returns the id assigned to it.
    pub fn record(&mut self, description: impl Into<String>, command: EditCommand) -> Uuid {
        let id = Uuid::new_v4();
        self.redo.clear();
        self.undo.push_back(UndoEntry {
            id,
            description: description.into(),
            command,
        });
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
        id
    }

    /// Applies the inverse of the newest entry and moves it to the redo
    /// stack. Returns `None` when there is nothing to undo.
    pub fn undo(&mut self, graph: &mut DialogueGraph) -> Result<Option<UndoEntry>, CoreError> {
        let Some(entry) = self.undo.back() else {
            return Ok(None);
        };
        entry.command.inverse().apply(graph)?;
        let entry = self.undo.pop_back();
        if let Some(entry) = &entry {
            self.redo.push(entry.clone());
        }
        Ok(entry)
    }

    /// Reapplies the most recently undone entry.
    pub fn redo(&mut self, graph: &mut DialogueGraph) -> Result<Option<UndoEntry>, CoreError> {
        let Some(entry) = self.redo.last() else {
            return Ok(None);
        };
        entry.command.apply(graph)?;
        let entry = self.redo.pop();
        if let Some(entry) = &entry {
            self.undo.push_back(entry.clone());
        }
        Ok(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// The entry the next undo would revert.
    pub fn peek_undo(&self) -> Option<&UndoEntry> {
        self.undo.back()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// All entries, newest first. Undone entries are chronologically the
    /// newest, so they come first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        let undone = self.redo.iter().map(|e| HistoryEntry {
            undone: true,
            ..HistoryEntry::from(e)
        });
        let done = self.undo.iter().rev().map(HistoryEntry::from);
        undone.chain(done).collect()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{NodeContent, NodeId, NodeKind, ParentRef};

    fn setup() -> (DialogueGraph, NodeId) {
        let mut g = DialogueGraph::new();
        let (e, _) = g
            .add_node(ParentRef::Root, None, NodeKind::Entry, NodeContent::text("v0"))
            .unwrap();
        (g, e)
    }

    fn edit(g: &mut DialogueGraph, h: &mut History, node: NodeId, text: &str) {
        let old = g.replace_content(node, NodeContent::text(text)).unwrap();
        h.record(
            format!("Edit Text {}", text),
            EditCommand::SetContent {
                node,
                old,
                new: NodeContent::text(text),
            },
        );
    }

    #[test]
    fn undo_redo_walks_both_stacks() {
        let (mut g, e) = setup();
        let mut h = History::new(10);
        edit(&mut g, &mut h, e, "v1");
        edit(&mut g, &mut h, e, "v2");

        let undone = h.undo(&mut g).unwrap().unwrap();
        assert_eq!(undone.description, "Edit Text v2");
        assert_eq!(g.node(e).unwrap().text(), "v1");
        assert!(h.can_redo());

        h.redo(&mut g).unwrap().unwrap();
        assert_eq!(g.node(e).unwrap().text(), "v2");
        assert!(!h.can_redo());
    }

    #[test]
    fn record_clears_redo() {
        let (mut g, e) = setup();
        let mut h = History::new(10);
        edit(&mut g, &mut h, e, "v1");
        h.undo(&mut g).unwrap();
        assert_eq!(h.redo_len(), 1);
        edit(&mut g, &mut h, e, "v3");
        assert_eq!(h.redo_len(), 0);
    }

    #[test]
    fn limit_drops_oldest() {
        let (mut g, e) = setup();
        let mut h = History::new(2);
        for text in ["a", "b", "c"] {
            edit(&mut g, &mut h, e, text);
        }
        assert_eq!(h.undo_len(), 2);
        h.undo(&mut g).unwrap();
        h.undo(&mut g).unwrap();
        assert!(h.undo(&mut g).unwrap().is_none());
        assert_eq!(g.node(e).unwrap().text(), "a");
    }

    #[test]
    fn failed_undo_keeps_stacks() {
        let (mut g, e) = setup();
        let mut h = History::new(10);
        edit(&mut g, &mut h, e, "v1");
        // The node disappears behind the history's back.
        let pointer = g.root_pointers()[0].id;
        g.remove_pointer(pointer).unwrap();
        assert!(h.undo(&mut g).is_err());
        assert_eq!(h.undo_len(), 1);
        assert_eq!(h.redo_len(), 0);
    }

    #[test]
    fn entries_are_newest_first() {
        let (mut g, e) = setup();
        let mut h = History::new(10);
        edit(&mut g, &mut h, e, "v1");
        edit(&mut g, &mut h, e, "v2");
        edit(&mut g, &mut h, e, "v3");
        h.undo(&mut g).unwrap();
        let listed: Vec<_> = h
            .entries()
            .into_iter()
            .map(|e| (e.description, e.undone))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("Edit Text v3".to_string(), true),
                ("Edit Text v2".to_string(), false),
                ("Edit Text v1".to_string(), false),
            ]
        );
    }
}
