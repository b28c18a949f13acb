//! Drag-and-drop validation.
//!
//! [`DropValidator`] borrows the graph and the current projection and never
//! mutates either. Views call [`DropValidator::evaluate`] on every pointer
//! move for live feedback and once more at drop time; the engine then applies
//! the [`ResolvedDrop`] through
//! [`EditEngine::apply_drop`](crate::engine::EditEngine::apply_drop).

use parley_core::{
    CoreError, DialogueGraph, NodeId, NodeKind, Occurrence, OccurrenceRef, ParentRef, PointerId,
    Projection,
};
use serde::{Deserialize, Serialize};

use crate::error::Refusal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropPosition {
    /// Previous sibling of the target.
    Before,
    /// Next sibling of the target.
    After,
    /// First child of the target.
    Into,
}

/// Classifies a pointer position within the target's row.
///
/// The top third is `Before`, the bottom third `After`. The middle band is
/// `Into` when the target accepts the dragged node as a child, otherwise the
/// nearer of `Before` and `After`.
pub fn classify_drop(y: f64, height: f64, accepts_into: bool) -> DropPosition {
    let ratio = if height > 0.0 { y / height } else { 0.5 };
    if ratio < 1.0 / 3.0 {
        DropPosition::Before
    } else if ratio > 2.0 / 3.0 {
        DropPosition::After
    } else if accepts_into {
        DropPosition::Into
    } else if ratio < 0.5 {
        DropPosition::Before
    } else {
        DropPosition::After
    }
}

/// A validated move, ready to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDrop {
    pub dragged: PointerId,
    pub node: NodeId,
    pub new_parent: ParentRef,
    /// Index in the destination list once the dragged pointer has been
    /// removed from its current place.
    pub index: usize,
    pub position: DropPosition,
}

/// Live feedback for one hover position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropFeedback {
    pub target: OccurrenceRef,
    pub position: DropPosition,
    pub result: Result<ResolvedDrop, Refusal>,
}

impl DropFeedback {
    pub fn is_valid(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct DropValidator<'a> {
    graph: &'a DialogueGraph,
    projection: &'a Projection,
}

impl<'a> DropValidator<'a> {
    pub fn new(graph: &'a DialogueGraph, projection: &'a Projection) -> Self {
        DropValidator { graph, projection }
    }

    fn occurrence(&self, pointer: PointerId) -> Result<&'a Occurrence, Refusal> {
        self.projection
            .get(pointer)
            .ok_or(Refusal::UnknownOccurrence { pointer })
    }

    /// Whether `target` can take a node of `kind` as a new child.
    pub fn accepts_into(&self, kind: NodeKind, target: OccurrenceRef) -> bool {
        match target {
            OccurrenceRef::Root => kind == NodeKind::Entry,
            OccurrenceRef::Pointer(p) => self
                .projection
                .get(p)
                .is_some_and(|o| !o.is_link && o.kind.child_kind() == kind),
        }
    }

    /// Classifies the pointer position for `dragged` over `target`.
    pub fn classify(&self, dragged: PointerId, target: OccurrenceRef, y: f64, height: f64) -> DropPosition {
        if target == OccurrenceRef::Root {
            return DropPosition::Into;
        }
        let accepts = self
            .projection
            .get(dragged)
            .is_some_and(|o| self.accepts_into(o.kind, target));
        classify_drop(y, height, accepts)
    }

    /// Classifies and validates in one step.
    pub fn evaluate(&self, dragged: PointerId, target: OccurrenceRef, y: f64, height: f64) -> DropFeedback {
        let position = self.classify(dragged, target, y, height);
        DropFeedback {
            target,
            position,
            result: self.validate(dragged, target, position),
        }
    }

    /// Validates dropping `dragged` at `position` relative to `target`.
    ///
    /// Checks, first failure wins: onto itself or below itself, dragging a
    /// link, kind alternation at the new parent, into a link. Dropping on the
    /// root always means first top-level entry.
    pub fn validate(
        &self,
        dragged: PointerId,
        target: OccurrenceRef,
        position: DropPosition,
    ) -> Result<ResolvedDrop, Refusal> {
        let source = self.occurrence(dragged)?;
        let (new_parent, raw_index, position, target_occ) = match target {
            OccurrenceRef::Root => (ParentRef::Root, 0, DropPosition::Into, None),
            OccurrenceRef::Pointer(p) => {
                let occ = self.occurrence(p)?;
                let (parent, index) = match position {
                    DropPosition::Before => (occ.parent, occ.index),
                    DropPosition::After => (occ.parent, occ.index + 1),
                    DropPosition::Into => (ParentRef::Node(occ.node), 0),
                };
                (parent, index, position, Some(occ))
            }
        };

        if target_occ.is_some_and(|o| o.node == source.node) {
            return Err(Refusal::DropOntoSelf);
        }
        self.check_cycle(source.node, new_parent)?;
        if source.is_link {
            return Err(Refusal::DraggedLink);
        }
        self.check_kind(source.kind, new_parent)?;
        if position == DropPosition::Into && target_occ.is_some_and(|o| o.is_link) {
            return Err(Refusal::IntoLink);
        }

        let index = match self.graph.locate(dragged) {
            Some(old) if old.parent == new_parent && old.index < raw_index => raw_index - 1,
            _ => raw_index,
        };
        self.check_index(dragged, new_parent, index)?;
        Ok(ResolvedDrop {
            dragged,
            node: source.node,
            new_parent,
            index,
            position,
        })
    }

    /// Validates an explicit move of `dragged` to `new_parent` at `index`
    /// (post-removal). Same rules as [`validate`](Self::validate) minus the
    /// target-occurrence checks.
    pub fn check_move(
        &self,
        dragged: PointerId,
        new_parent: ParentRef,
        index: usize,
    ) -> Result<ResolvedDrop, Refusal> {
        let source = self.occurrence(dragged)?;
        self.check_cycle(source.node, new_parent)?;
        if source.is_link {
            return Err(Refusal::DraggedLink);
        }
        self.check_kind(source.kind, new_parent)?;
        self.check_index(dragged, new_parent, index)?;
        Ok(ResolvedDrop {
            dragged,
            node: source.node,
            new_parent,
            index,
            position: if index == 0 {
                DropPosition::Into
            } else {
                DropPosition::After
            },
        })
    }

    fn check_cycle(&self, node: NodeId, new_parent: ParentRef) -> Result<(), Refusal> {
        let ParentRef::Node(parent) = new_parent else {
            return Ok(());
        };
        if !self.graph.contains(parent) {
            return Err(Refusal::UnknownNode { node: parent });
        }
        if parent == node || self.graph.ancestors(parent).contains(&node) {
            return Err(Refusal::WouldCreateCycle { node });
        }
        Ok(())
    }

    fn check_kind(&self, kind: NodeKind, new_parent: ParentRef) -> Result<(), Refusal> {
        let expected = self.graph.child_kind(new_parent).map_err(|err| match err {
            CoreError::NodeNotFound { id } => Refusal::UnknownNode { node: id },
            other => Refusal::InvalidGraph(other),
        })?;
        if expected != kind {
            return Err(Refusal::KindMismatch {
                parent: new_parent,
                expected,
                found: kind,
            });
        }
        Ok(())
    }

    fn check_index(&self, dragged: PointerId, new_parent: ParentRef, index: usize) -> Result<(), Refusal> {
        let list = self
            .graph
            .pointers_of(new_parent)
            .map(|l| l.len())
            .unwrap_or(0);
        let same_list = self
            .graph
            .locate(dragged)
            .is_some_and(|old| old.parent == new_parent);
        let len = if same_list { list - 1 } else { list };
        if index > len {
            return Err(Refusal::IndexOutOfRange { index, len });
        }
        Ok(())
    }
}

/// State of one interactive drag gesture.
///
/// Holds nothing but the dragged occurrence and the last feedback, so
/// abandoning a drag needs no rollback.
#[derive(Debug, Clone)]
pub struct DragSession {
    dragged: PointerId,
    last: Option<DropFeedback>,
}

impl DragSession {
    pub fn begin(dragged: PointerId) -> Self {
        DragSession { dragged, last: None }
    }

    pub fn dragged(&self) -> PointerId {
        self.dragged
    }

    pub fn hover(
        &mut self,
        validator: &DropValidator<'_>,
        target: OccurrenceRef,
        y: f64,
        height: f64,
    ) -> &DropFeedback {
        self.last.insert(validator.evaluate(self.dragged, target, y, height))
    }

    pub fn feedback(&self) -> Option<&DropFeedback> {
        self.last.as_ref()
    }

    /// Re-validates the last hovered target against the current graph.
    /// `None` when the pointer never hovered a target.
    pub fn finish(self, validator: &DropValidator<'_>) -> Option<Result<ResolvedDrop, Refusal>> {
        let last = self.last?;
        Some(validator.validate(self.dragged, last.target, last.position))
    }

    pub fn cancel(self) {}
}
