//! Hierarchical outline of the dialogue.
//!
//! One row per occurrence in projection order. Collapse state is keyed by
//! node identity, so it survives the full rebuild that follows every
//! structural change within one dialogue. Loading a dialogue clears it.

use std::collections::HashSet;
use std::fmt::Write as _;

use parley_core::{DialogueGraph, NodeId, NodeKind, PointerId, Projection};
use serde::Serialize;

use crate::bus::{ChangeKind, DispatchContext, Notification, Origin, SelectionRequest, ViewId};
use crate::engine::EditEngine;
use crate::selection;
use crate::sync::guard::{EchoFilter, ReentrancyGuard};
use crate::sync::View;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeRow {
    pub pointer: PointerId,
    pub node: NodeId,
    pub kind: NodeKind,
    pub depth: usize,
    pub is_link: bool,
    pub text: String,
    pub speaker: Option<String>,
    /// Whether the row can be expanded. Always false for links.
    pub has_children: bool,
    pub parent_occurrence: Option<PointerId>,
}

#[derive(Debug)]
pub struct TreeOutline {
    id: ViewId,
    filter: EchoFilter,
    guard: ReentrancyGuard,
    rows: Vec<TreeRow>,
    collapsed: HashSet<NodeId>,
    selected: Option<PointerId>,
    outbox: Vec<SelectionRequest>,
    rebuilds: usize,
}

impl TreeOutline {
    pub fn new(id: ViewId, graph: &DialogueGraph, projection: &Projection) -> Self {
        let mut tree = TreeOutline {
            id,
            filter: EchoFilter::new(id),
            guard: ReentrancyGuard::new(),
            rows: Vec::new(),
            collapsed: HashSet::new(),
            selected: None,
            outbox: Vec::new(),
            rebuilds: 0,
        };
        tree.rebuild(graph, projection);
        tree
    }

    /// Creates an outline showing `engine`'s dialogue and subscribes it.
    pub fn attach(engine: &mut EditEngine) -> std::rc::Rc<std::cell::RefCell<TreeOutline>> {
        crate::sync::attach(engine, |id, engine| {
            let mut tree = TreeOutline::new(id, engine.graph(), engine.projection());
            tree.selected = engine.selection().map(|s| s.occurrence);
            tree
        })
    }

    pub fn rows(&self) -> &[TreeRow] {
        &self.rows
    }

    pub fn row(&self, pointer: PointerId) -> Option<&TreeRow> {
        self.rows.iter().find(|r| r.pointer == pointer)
    }

    pub fn selected(&self) -> Option<PointerId> {
        self.selected
    }

    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    pub fn is_collapsed(&self, node: NodeId) -> bool {
        self.collapsed.contains(&node)
    }

    fn rebuild(&mut self, graph: &DialogueGraph, projection: &Projection) {
        self.rows = projection
            .occurrences()
            .iter()
            .filter_map(|occ| {
                let node = graph.node(occ.node)?;
                Some(TreeRow {
                    pointer: occ.pointer,
                    node: occ.node,
                    kind: occ.kind,
                    depth: occ.depth,
                    is_link: occ.is_link,
                    text: node.text().to_string(),
                    speaker: node.content.speaker.clone(),
                    has_children: !occ.is_link && !node.is_leaf(),
                    parent_occurrence: occ.parent_occurrence,
                })
            })
            .collect();
        self.collapsed.retain(|node| graph.contains(*node));
        if self.selected.is_some_and(|p| projection.get(p).is_none()) {
            self.selected = None;
        }
        self.rebuilds += 1;
    }

    /// Rows not hidden under a collapsed ancestor.
    pub fn visible_rows(&self) -> Vec<&TreeRow> {
        let mut visible = Vec::new();
        let mut hidden_below: Option<usize> = None;
        for row in &self.rows {
            if let Some(depth) = hidden_below {
                if row.depth > depth {
                    continue;
                }
                hidden_below = None;
            }
            if row.has_children && self.collapsed.contains(&row.node) {
                hidden_below = Some(row.depth);
            }
            visible.push(row);
        }
        visible
    }

    pub fn collapse(&mut self, node: NodeId) {
        self.collapsed.insert(node);
    }

    pub fn expand(&mut self, node: NodeId) {
        self.collapsed.remove(&node);
    }

    pub fn toggle(&mut self, node: NodeId) {
        if !self.collapsed.remove(&node) {
            self.collapsed.insert(node);
        }
    }

    /// The user selected a row.
    pub fn click(&mut self, pointer: PointerId) {
        if self.row(pointer).is_none() {
            return;
        }
        self.selected = Some(pointer);
        self.on_row_selected(pointer);
    }

    /// Row-selection handler. Also fires when the outline itself moves the
    /// highlight, which is when the guard is held.
    fn on_row_selected(&mut self, pointer: PointerId) {
        if self.guard.is_held() {
            return;
        }
        let Some(node) = self.row(pointer).map(|r| r.node) else {
            return;
        };
        self.outbox.push(SelectionRequest {
            node: Some(node),
            occurrence: Some(pointer),
            origin: Origin::View(self.id),
        });
    }

    fn apply_selection(&mut self, node: Option<NodeId>, occurrence: Option<PointerId>, projection: &Projection) {
        let Some(_held) = self.guard.hold() else {
            return;
        };
        let target = node
            .and_then(|n| selection::resolve(projection, n, occurrence))
            .map(|s| s.occurrence);
        if let Some(pointer) = target {
            for ancestor in projection.ancestors(pointer) {
                self.collapsed.remove(&ancestor.node);
            }
        }
        self.selected = target;
        if let Some(pointer) = target {
            self.on_row_selected(pointer);
        }
    }

    /// Indented text rendering of the visible rows.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in self.visible_rows() {
            let _ = write!(out, "{}{} #{}", "  ".repeat(row.depth), row.kind, row.node);
            if let Some(speaker) = &row.speaker {
                let _ = write!(out, " [{}]", speaker);
            }
            let _ = write!(out, " {:?}", row.text);
            if row.is_link {
                out.push_str(" (link)");
            }
            if row.has_children && self.collapsed.contains(&row.node) {
                out.push_str(" [+]");
            }
            if self.selected == Some(row.pointer) {
                out.push_str(" *");
            }
            out.push('\n');
        }
        out
    }
}

impl View for TreeOutline {
    fn id(&self) -> ViewId {
        self.id
    }

    fn on_notification(&mut self, notification: &Notification, ctx: &DispatchContext<'_>) {
        if !self.filter.admit(notification) {
            return;
        }
        match notification {
            Notification::Structure { kind, .. } => {
                if *kind == ChangeKind::DialogRefreshed {
                    // A new dialogue reuses ids for unrelated nodes.
                    self.collapsed.clear();
                    self.selected = None;
                }
                self.rebuild(ctx.graph(), ctx.projection())
            }
            Notification::Selection { node, occurrence, .. } => {
                self.apply_selection(*node, *occurrence, ctx.projection())
            }
        }
    }

    fn take_requests(&mut self) -> Vec<SelectionRequest> {
        std::mem::take(&mut self.outbox)
    }
}
