//! Change notification bus.
//!
//! One [`ChangeBus`] lives inside each [`EditEngine`](crate::engine::EditEngine).
//! Views register for a [`ViewId`] and subscribe a callback. Every structural
//! change and every selection change is published as a [`Notification`]
//! stamped with its [`Origin`] and a monotonically increasing
//! [`ChangeToken`], which is what subscribers use to drop their own echoes.
//!
//! Callbacks only see the graph through a shared borrow in
//! [`DispatchContext`]. A subscriber that wants to edit in response to a
//! notification queues the edit with [`DispatchContext::defer`]; the engine
//! runs it on the next [`tick`](crate::engine::EditEngine::tick).

use std::cell::RefCell;
use std::fmt;

use parley_core::{DialogueGraph, NodeId, PointerId, Projection};
use serde::{Deserialize, Serialize};

use crate::engine::EditEngine;

/// What kind of structural change happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    NodeAdded,
    NodeDeleted,
    NodeMoved,
    NodeModified,
    DialogRefreshed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::NodeAdded => "node added",
            ChangeKind::NodeDeleted => "node deleted",
            ChangeKind::NodeMoved => "node moved",
            ChangeKind::NodeModified => "node modified",
            ChangeKind::DialogRefreshed => "dialog refreshed",
        };
        f.write_str(name)
    }
}

/// Identity of a registered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ViewId(pub u32);

/// Who caused a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Changes not attributed to a view: undo/redo, loads and selection
    /// fix-ups.
    Engine,
    View(ViewId),
}

/// Position of a notification in the engine's global order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChangeToken(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Notification {
    Structure {
        kind: ChangeKind,
        /// The node most affected, if any. `None` for whole-dialog refreshes.
        node: Option<NodeId>,
        origin: Origin,
        token: ChangeToken,
    },
    Selection {
        /// `None` when the selection was cleared.
        node: Option<NodeId>,
        occurrence: Option<PointerId>,
        origin: Origin,
        token: ChangeToken,
    },
}

impl Notification {
    pub fn origin(&self) -> Origin {
        match self {
            Notification::Structure { origin, .. } | Notification::Selection { origin, .. } => {
                *origin
            }
        }
    }

    pub fn token(&self) -> ChangeToken {
        match self {
            Notification::Structure { token, .. } | Notification::Selection { token, .. } => *token,
        }
    }

    pub fn is_selection(&self) -> bool {
        matches!(self, Notification::Selection { .. })
    }
}

/// A request, usually from a view, to select a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRequest {
    /// `None` clears the selection.
    pub node: Option<NodeId>,
    /// Preferred occurrence; falls back to the canonical one when absent or
    /// stale.
    pub occurrence: Option<PointerId>,
    pub origin: Origin,
}

pub type DeferredEdit = Box<dyn FnOnce(&mut EditEngine)>;

type Callback = Box<dyn FnMut(&Notification, &DispatchContext<'_>)>;

/// What a subscriber can see and do while handling a notification.
pub struct DispatchContext<'a> {
    graph: &'a DialogueGraph,
    projection: &'a Projection,
    deferred: RefCell<Vec<DeferredEdit>>,
}

impl<'a> DispatchContext<'a> {
    pub fn graph(&self) -> &'a DialogueGraph {
        self.graph
    }

    pub fn projection(&self) -> &'a Projection {
        self.projection
    }

    /// Queues an edit for the engine's next tick.
    pub fn defer(&self, edit: impl FnOnce(&mut EditEngine) + 'static) {
        self.deferred.borrow_mut().push(Box::new(edit));
    }
}

/// Publish/subscribe dispatcher owned by the engine.
#[derive(Default)]
pub struct ChangeBus {
    next_view: u32,
    next_token: u64,
    subscribers: Vec<(ViewId, Callback)>,
    deferred: Vec<DeferredEdit>,
}

impl fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeBus")
            .field("next_token", &self.next_token)
            .field("subscribers", &self.subscribers.len())
            .field("deferred", &self.deferred.len())
            .finish()
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self) -> ViewId {
        let id = ViewId(self.next_view);
        self.next_view += 1;
        id
    }

    pub fn subscribe(
        &mut self,
        view: ViewId,
        callback: impl FnMut(&Notification, &DispatchContext<'_>) + 'static,
    ) {
        self.subscribers.push((view, Box::new(callback)));
    }

    /// Removes every callback of `view`. Returns whether any were removed.
    pub fn unsubscribe(&mut self, view: ViewId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(id, _)| *id != view);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// The token the next notification will carry.
    pub fn peek_token(&self) -> ChangeToken {
        ChangeToken(self.next_token)
    }

    fn next_token(&mut self) -> ChangeToken {
        let token = ChangeToken(self.next_token);
        self.next_token += 1;
        token
    }

    pub fn publish_structure(
        &mut self,
        kind: ChangeKind,
        node: Option<NodeId>,
        origin: Origin,
        graph: &DialogueGraph,
        projection: &Projection,
    ) -> Notification {
        let token = self.next_token();
        let notification = Notification::Structure {
            kind,
            node,
            origin,
            token,
        };
        self.dispatch(&notification, graph, projection);
        notification
    }

    pub fn publish_selection(
        &mut self,
        node: Option<NodeId>,
        occurrence: Option<PointerId>,
        origin: Origin,
        graph: &DialogueGraph,
        projection: &Projection,
    ) -> Notification {
        let token = self.next_token();
        let notification = Notification::Selection {
            node,
            occurrence,
            origin,
            token,
        };
        self.dispatch(&notification, graph, projection);
        notification
    }

    fn dispatch(&mut self, notification: &Notification, graph: &DialogueGraph, projection: &Projection) {
        let ctx = DispatchContext {
            graph,
            projection,
            deferred: RefCell::new(Vec::new()),
        };
        for (_, callback) in self.subscribers.iter_mut() {
            callback(notification, &ctx);
        }
        self.deferred.extend(ctx.deferred.into_inner());
    }

    /// Takes every edit queued by subscribers so far.
    pub fn take_deferred(&mut self) -> Vec<DeferredEdit> {
        std::mem::take(&mut self.deferred)
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }
}
