//! The edit engine: the single owner of the dialogue graph.
//!
//! Every view goes through [`EditEngine`] to change the graph. An operation
//! first checks every authoring rule against the current graph and
//! projection, then builds one [`EditCommand`], applies it through a
//! transactional graph primitive, records it in the undo history and
//! publishes exactly one structural notification. A refused operation
//! touches nothing.

use std::sync::Arc;

use parley_core::hash::structure_fingerprint;
use parley_core::{
    CoreError, DialogueGraph, DialogueNode, Fragment, LocString, NodeContent, NodeId, NodeKind,
    Occurrence, OccurrenceRef, ParentRef, Pointer, PointerData, PointerId, PointerLocation,
    Projection, ScriptHook,
};
use uuid::Uuid;

use crate::bus::{ChangeBus, ChangeKind, DispatchContext, Notification, Origin, SelectionRequest, ViewId};
use crate::clipboard::{Clipboard, ClipboardEntry, ClipboardMode};
use crate::command::EditCommand;
use crate::config::EditorConfig;
use crate::dragdrop::{DropValidator, ResolvedDrop};
use crate::error::{EditError, EditResult, IoOperation, Outcome, Refusal};
use crate::history::{History, HistoryEntry};
use crate::selection::{self, Selection, SelectionState};
use crate::services::{
    quest_status, JournalSource, QuestStatus, ScriptMetadataSource, ScriptParameters, ScriptSuggestions,
};

/// Kind requested for a new node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewNodeKind {
    /// Whatever the parent requires: Entry under the root or a Reply, Reply
    /// under an Entry.
    Auto,
    Exactly(NodeKind),
}

pub struct EditEngine {
    graph: DialogueGraph,
    projection: Projection,
    selection: SelectionState,
    history: History,
    clipboard: Clipboard,
    bus: ChangeBus,
    config: EditorConfig,
    /// Attributed to notifications published by the running operation.
    origin: Origin,
    io: Option<IoOperation>,
    suggestions: Option<ScriptSuggestions>,
    journal: Option<Box<dyn JournalSource>>,
}

impl std::fmt::Debug for EditEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditEngine")
            .field("nodes", &self.graph.node_count())
            .field("selection", &self.selection.current())
            .field("undo", &self.history.undo_len())
            .field("redo", &self.history.redo_len())
            .field("io", &self.io)
            .field("bus", &self.bus)
            .finish()
    }
}

impl EditEngine {
    /// Takes ownership of `graph` after validating it.
    pub fn new(graph: DialogueGraph, config: EditorConfig) -> Result<Self, CoreError> {
        let graph = graph.validated()?;
        let projection = Projection::build(&graph);
        Ok(EditEngine {
            graph,
            projection,
            selection: SelectionState::new(),
            history: History::new(config.undo_limit),
            clipboard: Clipboard::new(),
            bus: ChangeBus::new(),
            config,
            origin: Origin::Engine,
            io: None,
            suggestions: None,
            journal: None,
        })
    }

    pub fn with_script_source(mut self, source: Arc<dyn ScriptMetadataSource>) -> Self {
        self.suggestions = Some(ScriptSuggestions::new(source));
        self
    }

    pub fn with_journal(mut self, journal: Box<dyn JournalSource>) -> Self {
        self.journal = Some(journal);
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn graph(&self) -> &DialogueGraph {
        &self.graph
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection.current()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        self.history.entries()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn clipboard(&self) -> Option<&ClipboardEntry> {
        self.clipboard.get()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn pending_io(&self) -> Option<IoOperation> {
        self.io
    }

    pub fn fingerprint(&self) -> blake3::Hash {
        structure_fingerprint(&self.graph)
    }

    pub fn drop_validator(&self) -> DropValidator<'_> {
        DropValidator::new(&self.graph, &self.projection)
    }

    // -----------------------------------------------------------------------
    // Views and the bus
    // -----------------------------------------------------------------------

    pub fn register_view(&mut self) -> ViewId {
        self.bus.register()
    }

    pub fn subscribe(
        &mut self,
        view: ViewId,
        callback: impl FnMut(&Notification, &DispatchContext<'_>) + 'static,
    ) {
        self.bus.subscribe(view, callback);
    }

    pub fn unsubscribe(&mut self, view: ViewId) -> bool {
        self.bus.unsubscribe(view)
    }

    /// Runs `op` with notifications attributed to `view`.
    pub fn on_behalf_of<R>(&mut self, view: ViewId, op: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.origin, Origin::View(view));
        let out = op(self);
        self.origin = previous;
        out
    }

    /// Runs the edits subscribers deferred so far and merges finished script
    /// lookups. Edits deferred while this batch runs wait for the next tick.
    /// Returns how many deferred edits ran.
    pub fn tick(&mut self) -> usize {
        let batch = self.bus.take_deferred();
        let ran = batch.len();
        for edit in batch {
            edit(self);
        }
        if let Some(suggestions) = &mut self.suggestions {
            suggestions.drain();
        }
        ran
    }

    // -----------------------------------------------------------------------
    // Structural edits
    // -----------------------------------------------------------------------

    /// Appends a new, empty node under `parent`.
    pub fn add_node(&mut self, parent: OccurrenceRef, kind: NewNodeKind) -> EditResult<(NodeId, PointerId)> {
        self.add_node_with(parent, kind, NodeContent::default())
    }

    pub fn add_node_with(
        &mut self,
        parent: OccurrenceRef,
        kind: NewNodeKind,
        content: NodeContent,
    ) -> EditResult<(NodeId, PointerId)> {
        self.ensure_idle()?;
        let parent = self.parent_for(parent)?;
        let expected = self.child_kind(parent)?;
        let kind = match kind {
            NewNodeKind::Auto => expected,
            NewNodeKind::Exactly(kind) => kind,
        };
        self.check_child(parent, kind)?;
        if kind == NodeKind::Reply && content.speaker.is_some() {
            return Err(Refusal::SpeakerOnReply.into());
        }

        let node = self.graph.allocate_node_id()?;
        let pointer = self.graph.allocate_pointer_id()?;
        let command = EditCommand::Attach {
            location: self.append_location(parent),
            pointer: Pointer::new(pointer, node),
            nodes: vec![DialogueNode::new(node, kind, content)],
        };
        let description = match kind {
            NodeKind::Entry => "Add Entry",
            NodeKind::Reply => "Add Reply",
        };
        self.execute(description, command)?;
        self.select_new(node, pointer);
        Ok(Outcome::Applied((node, pointer)))
    }

    /// Removes the pointer behind `occ`. The node goes with it only if that
    /// was its last pointer.
    pub fn delete_node(&mut self, occ: OccurrenceRef) -> EditResult<NodeId> {
        self.ensure_idle()?;
        let OccurrenceRef::Pointer(pointer) = occ else {
            return Ok(Outcome::skipped("The root cannot be deleted"));
        };
        self.occurrence(pointer)?;
        let command = self.detach(pointer)?;
        let node = command.affected_node();
        self.commit("Delete Node", command);
        Ok(Outcome::Applied(node))
    }

    /// Moves the pointer behind `dragged` to `new_parent` at `index`, counted
    /// after the pointer has left its current list.
    pub fn move_node(&mut self, dragged: PointerId, new_parent: ParentRef, index: usize) -> EditResult<()> {
        self.ensure_idle()?;
        let resolved = self.drop_validator().check_move(dragged, new_parent, index)?;
        self.relocate("Move Node", resolved)
    }

    /// Applies a drop resolved by the [`DropValidator`], re-checking it
    /// against the current graph first.
    pub fn apply_drop(&mut self, drop: ResolvedDrop) -> EditResult<()> {
        self.move_node(drop.dragged, drop.new_parent, drop.index)
    }

    pub fn move_node_up(&mut self, occ: OccurrenceRef) -> EditResult<()> {
        self.shift(occ, true)
    }

    pub fn move_node_down(&mut self, occ: OccurrenceRef) -> EditResult<()> {
        self.shift(occ, false)
    }

    fn shift(&mut self, occ: OccurrenceRef, up: bool) -> EditResult<()> {
        self.ensure_idle()?;
        let OccurrenceRef::Pointer(pointer) = occ else {
            return Ok(Outcome::skipped("The root cannot be moved"));
        };
        let node = self.occurrence(pointer)?.node;
        let from = self.locate(pointer)?;
        let len = self
            .graph
            .pointers_of(from.parent)
            .map(|l| l.len())
            .unwrap_or(0);
        let index = if up {
            if from.index == 0 {
                return Ok(Outcome::skipped("Node is already first"));
            }
            from.index - 1
        } else {
            if from.index + 1 >= len {
                return Ok(Outcome::skipped("Node is already last"));
            }
            from.index + 1
        };
        let command = EditCommand::Move {
            pointer,
            node,
            from,
            to: PointerLocation {
                parent: from.parent,
                index,
            },
        };
        self.execute(if up { "Move Node Up" } else { "Move Node Down" }, command)?;
        Ok(Outcome::Applied(()))
    }

    fn relocate(&mut self, description: &str, drop: ResolvedDrop) -> EditResult<()> {
        let from = self.locate(drop.dragged)?;
        let to = PointerLocation {
            parent: drop.new_parent,
            index: drop.index,
        };
        if from == to {
            return Ok(Outcome::skipped("Node is already there"));
        }
        let command = EditCommand::Move {
            pointer: drop.dragged,
            node: drop.node,
            from,
            to,
        };
        self.execute(description, command)?;
        Ok(Outcome::Applied(()))
    }

    // -----------------------------------------------------------------------
    // Clipboard
    // -----------------------------------------------------------------------

    /// Stages the node behind `occ` and removes its pointer.
    pub fn cut_node(&mut self, occ: OccurrenceRef) -> EditResult<NodeId> {
        self.ensure_idle()?;
        let OccurrenceRef::Pointer(pointer) = occ else {
            return Ok(Outcome::skipped("The root cannot be cut"));
        };
        let staged = self.stage(pointer, ClipboardMode::Cut)?;
        let command = self.detach(pointer)?;
        let id = self.commit("Cut Node", command);
        let node = staged.node;
        self.clipboard.stage(ClipboardEntry {
            cut_entry: Some(id),
            ..staged
        });
        Ok(Outcome::Applied(node))
    }

    /// Stages the node behind `occ`. The graph is left as it is.
    pub fn copy_node(&mut self, occ: OccurrenceRef) -> EditResult<NodeId> {
        let OccurrenceRef::Pointer(pointer) = occ else {
            return Ok(Outcome::skipped("The root cannot be copied"));
        };
        let staged = self.stage(pointer, ClipboardMode::Copied)?;
        let node = staged.node;
        self.clipboard.stage(staged);
        Ok(Outcome::Applied(node))
    }

    fn stage(&self, pointer: PointerId, mode: ClipboardMode) -> Result<ClipboardEntry, EditError> {
        let occ = self.occurrence(pointer)?;
        let pointer_data = self
            .graph
            .pointer(pointer)
            .map(|p| p.data.clone())
            .ok_or(Refusal::UnknownOccurrence { pointer })?;
        let fragment = Fragment::capture(&self.graph, occ.node).map_err(Self::breach)?;
        Ok(ClipboardEntry {
            mode,
            node: occ.node,
            kind: occ.kind,
            pointer_data,
            fragment,
            cut_entry: None,
        })
    }

    /// Grafts a fresh copy of the staged subtree under `target`. Every node
    /// and pointer in the copy gets a new id.
    pub fn paste_as_duplicate(&mut self, target: OccurrenceRef) -> EditResult<(NodeId, PointerId)> {
        self.ensure_idle()?;
        let entry = self.clipboard.get().cloned().ok_or(Refusal::ClipboardEmpty)?;
        let parent = self.parent_for(target)?;
        self.check_child(parent, entry.kind)?;

        let fragment = entry.fragment.reidentify(&mut self.graph)?;
        let node = fragment.root();
        let pointer = self.graph.allocate_pointer_id()?;
        let command = EditCommand::Attach {
            location: self.append_location(parent),
            pointer: Pointer::with_data(pointer, node, entry.pointer_data),
            nodes: fragment.into_nodes(),
        };
        self.execute("Paste Node", command)?;
        self.select_new(node, pointer);
        Ok(Outcome::Applied((node, pointer)))
    }

    /// Adds a new pointer under `target` to the staged node itself.
    pub fn paste_as_link(&mut self, target: OccurrenceRef) -> EditResult<PointerId> {
        self.ensure_idle()?;
        let entry = self.clipboard.get().cloned().ok_or(Refusal::ClipboardEmpty)?;
        if entry.is_cut() {
            return Err(Refusal::LinkAfterCut.into());
        }
        if !self.graph.contains(entry.node) {
            return Err(Refusal::ClipboardSourceMissing { node: entry.node }.into());
        }
        let parent = self.parent_for(target)?;
        self.check_child(parent, entry.kind)?;
        if let ParentRef::Node(p) = parent {
            if self.graph.reaches(entry.node, p) {
                return Err(Refusal::WouldCreateCycle { node: entry.node }.into());
            }
        }

        let pointer = self.graph.allocate_pointer_id()?;
        let command = EditCommand::Attach {
            location: self.append_location(parent),
            pointer: Pointer::new(pointer, entry.node),
            nodes: Vec::new(),
        };
        self.execute("Paste as Link", command)?;
        self.select_new(entry.node, pointer);
        Ok(Outcome::Applied(pointer))
    }

    /// Undoes a cut that is still the latest edit and keeps the node staged
    /// as a copy, so it can then be pasted as a link.
    pub fn recover_cut_as_copy(&mut self) -> EditResult<NodeId> {
        self.ensure_idle()?;
        let entry = self.clipboard.get().cloned().ok_or(Refusal::ClipboardEmpty)?;
        if !entry.is_cut() {
            return Ok(Outcome::skipped("The clipboard already holds a copy"));
        }
        if self.history.peek_undo().map(|e| e.id) != entry.cut_entry {
            return Err(Refusal::CutNotRecoverable.into());
        }
        if let Outcome::Skipped(message) = self.undo()? {
            return Ok(Outcome::Skipped(message));
        }
        self.clipboard.mark_copied();
        Ok(Outcome::Applied(entry.node))
    }

    // -----------------------------------------------------------------------
    // Content edits
    // -----------------------------------------------------------------------

    /// Edits the content of the node behind `occ`, which must be its
    /// canonical occurrence. Records nothing when `edit` changes nothing.
    pub fn update_node(
        &mut self,
        occ: PointerId,
        description: &str,
        edit: impl FnOnce(&mut NodeContent),
    ) -> EditResult<NodeId> {
        self.ensure_idle()?;
        let occurrence = self.occurrence(occ)?;
        if occurrence.is_link {
            return Err(Refusal::EditThroughLink.into());
        }
        let (node, kind) = (occurrence.node, occurrence.kind);
        let old = self
            .graph
            .node(node)
            .map(|n| n.content.clone())
            .ok_or(Refusal::UnknownNode { node })?;
        let mut new = old.clone();
        edit(&mut new);
        if new == old {
            return Ok(Outcome::skipped("No changes"));
        }
        if kind == NodeKind::Reply && new.speaker.is_some() {
            return Err(Refusal::SpeakerOnReply.into());
        }
        self.execute(description, EditCommand::SetContent { node, old, new })?;
        Ok(Outcome::Applied(node))
    }

    pub fn set_text(&mut self, occ: PointerId, text: &str) -> EditResult<NodeId> {
        self.update_node(occ, "Edit Text", |content| {
            content.text.set(LocString::DEFAULT_LANGUAGE, text);
        })
    }

    /// An empty speaker clears the tag.
    pub fn set_speaker(&mut self, occ: PointerId, speaker: &str) -> EditResult<NodeId> {
        let speaker = (!speaker.trim().is_empty()).then(|| speaker.trim().to_string());
        self.update_node(occ, "Edit Speaker", |content| content.speaker = speaker)
    }

    /// Edits the data of the pointer behind `occ`. Allowed on link
    /// occurrences: every occurrence has its own pointer.
    pub fn update_pointer(
        &mut self,
        occ: PointerId,
        description: &str,
        edit: impl FnOnce(&mut PointerData),
    ) -> EditResult<PointerId> {
        self.ensure_idle()?;
        let node = self.occurrence(occ)?.node;
        let old = self
            .graph
            .pointer(occ)
            .map(|p| p.data.clone())
            .ok_or(Refusal::UnknownOccurrence { pointer: occ })?;
        let mut new = old.clone();
        edit(&mut new);
        if new == old {
            return Ok(Outcome::skipped("No changes"));
        }
        let command = EditCommand::SetPointerData {
            pointer: occ,
            node,
            old,
            new,
        };
        self.execute(description, command)?;
        Ok(Outcome::Applied(occ))
    }

    /// Sets the "appears when" script of the pointer behind `occ` and starts
    /// a parameter lookup for it.
    pub fn set_condition(&mut self, occ: PointerId, condition: ScriptHook) -> EditResult<PointerId> {
        let script = condition.script.clone();
        let outcome = self.update_pointer(occ, "Edit Condition", |data| data.condition = condition)?;
        if let Some(suggestions) = &mut self.suggestions {
            suggestions.request(&script);
        }
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    pub fn undo(&mut self) -> EditResult<HistoryEntry> {
        self.ensure_idle()?;
        let Some(entry) = self.history.undo(&mut self.graph).map_err(Self::breach)? else {
            return Ok(Outcome::skipped("Nothing to undo"));
        };
        tracing::debug!("undo {:?}", entry.description);
        self.after_change(entry.command.inverse().change_kind(), Some(entry.command.affected_node()));
        Ok(Outcome::Applied(HistoryEntry {
            undone: true,
            ..HistoryEntry::from(&entry)
        }))
    }

    pub fn redo(&mut self) -> EditResult<HistoryEntry> {
        self.ensure_idle()?;
        let Some(entry) = self.history.redo(&mut self.graph).map_err(Self::breach)? else {
            return Ok(Outcome::skipped("Nothing to redo"));
        };
        tracing::debug!("redo {:?}", entry.description);
        self.after_change(entry.command.change_kind(), Some(entry.command.affected_node()));
        Ok(Outcome::Applied(HistoryEntry::from(&entry)))
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Applies a selection request and publishes the result when it differs
    /// from the current selection. Requests for a node with no occurrence
    /// are ignored. Returns the selection in effect afterwards.
    pub fn request_selection(&mut self, request: SelectionRequest) -> Option<Selection> {
        let next = match request.node {
            None => None,
            Some(node) => match selection::resolve(&self.projection, node, request.occurrence) {
                Some(sel) => Some(sel),
                None => {
                    tracing::debug!("ignoring selection of node {} with no occurrence", node);
                    return self.selection.current();
                }
            },
        };
        if next == self.selection.current() {
            return next;
        }
        self.selection.set(next);
        self.publish_selection(request.origin);
        next
    }

    pub fn select(&mut self, node: NodeId) -> Option<Selection> {
        self.request_selection(SelectionRequest {
            node: Some(node),
            occurrence: None,
            origin: self.origin,
        })
    }

    fn select_new(&mut self, node: NodeId, pointer: PointerId) {
        let before = self.selection.current();
        if self.selection.select(&self.projection, node, Some(pointer)) != before {
            self.publish_selection(Origin::Engine);
        }
    }

    fn publish_selection(&mut self, origin: Origin) {
        let current = self.selection.current();
        self.bus.publish_selection(
            current.map(|s| s.node),
            current.map(|s| s.occurrence),
            origin,
            &self.graph,
            &self.projection,
        );
    }

    // -----------------------------------------------------------------------
    // Persistence hand-off
    // -----------------------------------------------------------------------

    /// Starts a save: returns the graph to encode and freezes editing until
    /// [`finish_save`](Self::finish_save).
    pub fn begin_save(&mut self) -> Result<DialogueGraph, EditError> {
        self.ensure_idle()?;
        self.io = Some(IoOperation::Save);
        Ok(self.graph.clone())
    }

    /// Returns whether a save was pending.
    pub fn finish_save(&mut self) -> bool {
        self.finish_io(IoOperation::Save)
    }

    pub fn begin_load(&mut self) -> Result<(), EditError> {
        self.ensure_idle()?;
        self.io = Some(IoOperation::Load);
        Ok(())
    }

    /// Returns whether a load was pending.
    pub fn cancel_load(&mut self) -> bool {
        self.finish_io(IoOperation::Load)
    }

    fn finish_io(&mut self, op: IoOperation) -> bool {
        if self.io == Some(op) {
            self.io = None;
            true
        } else {
            false
        }
    }

    /// Ends a load by replacing the dialogue. The incoming graph is fully
    /// validated; an invalid one is refused and the current dialogue kept.
    /// History, clipboard and selection are reset.
    pub fn finish_load(&mut self, graph: DialogueGraph) -> Result<(), EditError> {
        if self.io == Some(IoOperation::Save) {
            return Err(Refusal::IoPending(IoOperation::Save).into());
        }
        self.io = None;
        let graph = graph.validated().map_err(Refusal::InvalidGraph)?;
        tracing::info!(
            "loaded dialogue with {} nodes and {} pointers",
            graph.node_count(),
            graph.pointer_count()
        );
        self.graph = graph;
        self.history.clear();
        self.clipboard.clear();
        self.after_change(ChangeKind::DialogRefreshed, None);
        if self.selection.current().is_some() {
            self.selection.clear();
            self.publish_selection(Origin::Engine);
        }
        Ok(())
    }

    /// Replaces the dialogue in one step.
    pub fn load(&mut self, graph: DialogueGraph) -> Result<(), EditError> {
        self.begin_load()?;
        self.finish_load(graph)
    }

    // -----------------------------------------------------------------------
    // Collaborators
    // -----------------------------------------------------------------------

    /// Cached parameters for `script`, starting a lookup on a miss.
    pub fn script_parameters(&mut self, script: &str) -> Option<&ScriptParameters> {
        let suggestions = self.suggestions.as_mut()?;
        suggestions.request(script);
        suggestions.get(script)
    }

    pub fn quest_status(&self, node: NodeId) -> Option<QuestStatus> {
        let quest = self.graph.node(node)?.content.quest.as_ref()?;
        Some(quest_status(self.journal.as_deref(), quest))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn ensure_idle(&self) -> Result<(), EditError> {
        match self.io {
            Some(op) => Err(Refusal::IoPending(op).into()),
            None => Ok(()),
        }
    }

    fn occurrence(&self, pointer: PointerId) -> Result<&Occurrence, Refusal> {
        self.projection
            .get(pointer)
            .ok_or(Refusal::UnknownOccurrence { pointer })
    }

    fn locate(&self, pointer: PointerId) -> Result<PointerLocation, Refusal> {
        self.graph
            .locate(pointer)
            .ok_or(Refusal::UnknownOccurrence { pointer })
    }

    /// The node new children of `occ` attach to. Link occurrences never take
    /// children.
    fn parent_for(&self, occ: OccurrenceRef) -> Result<ParentRef, Refusal> {
        match occ {
            OccurrenceRef::Root => Ok(ParentRef::Root),
            OccurrenceRef::Pointer(pointer) => {
                let occurrence = self.occurrence(pointer)?;
                if occurrence.is_link {
                    return Err(Refusal::LinkParent);
                }
                Ok(ParentRef::Node(occurrence.node))
            }
        }
    }

    fn child_kind(&self, parent: ParentRef) -> Result<NodeKind, Refusal> {
        self.graph.child_kind(parent).map_err(|err| match err {
            CoreError::NodeNotFound { id } => Refusal::UnknownNode { node: id },
            other => Refusal::InvalidGraph(other),
        })
    }

    fn check_child(&self, parent: ParentRef, kind: NodeKind) -> Result<(), Refusal> {
        let expected = self.child_kind(parent)?;
        if expected != kind {
            return Err(Refusal::KindMismatch {
                parent,
                expected,
                found: kind,
            });
        }
        Ok(())
    }

    fn append_location(&self, parent: ParentRef) -> PointerLocation {
        let index = self.graph.pointers_of(parent).map(|l| l.len()).unwrap_or(0);
        PointerLocation { parent, index }
    }

    /// Removes `pointer` and returns the command describing the removal.
    fn detach(&mut self, pointer: PointerId) -> Result<EditCommand, EditError> {
        let detached = self.graph.remove_pointer(pointer).map_err(Self::breach)?;
        Ok(EditCommand::Detach {
            location: detached.location,
            pointer: detached.pointer,
            nodes: detached.collected,
        })
    }

    fn execute(&mut self, description: &str, command: EditCommand) -> Result<Uuid, EditError> {
        command.apply(&mut self.graph).map_err(Self::breach)?;
        Ok(self.commit(description, command))
    }

    /// Records an already applied command and announces it.
    fn commit(&mut self, description: &str, command: EditCommand) -> Uuid {
        let kind = command.change_kind();
        let node = command.affected_node();
        tracing::debug!("{} ({}, node {})", description, kind, node);
        let id = self.history.record(description, command);
        self.after_change(kind, Some(node));
        id
    }

    fn after_change(&mut self, kind: ChangeKind, node: Option<NodeId>) {
        self.projection = Projection::build(&self.graph);
        let moved = self.selection.revalidate(&self.projection);
        self.bus
            .publish_structure(kind, node, self.origin, &self.graph, &self.projection);
        if moved {
            self.publish_selection(Origin::Engine);
        }
    }

    /// An authoring rule let through an edit the graph rejected.
    fn breach(err: CoreError) -> EditError {
        tracing::error!("graph invariant breach: {}", err);
        if cfg!(debug_assertions) {
            panic!("graph invariant breach: {}", err);
        }
        EditError::Core(err)
    }
}
