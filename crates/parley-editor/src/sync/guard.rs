//! Echo prevention shared by the views.

use std::cell::Cell;
use std::rc::Rc;

use crate::bus::{ChangeToken, Notification, Origin, ViewId};

/// Set while a view applies a programmatic change.
///
/// The view's own input handlers check [`is_held`](Self::is_held) and skip
/// publishing, so applying a selection never turns into a new request.
#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuard(Rc<Cell<bool>>);

pub struct Held(Rc<Cell<bool>>);

impl Drop for Held {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds the guard until the returned value is dropped. `None` if it is
    /// already held.
    pub fn hold(&self) -> Option<Held> {
        if self.0.replace(true) {
            return None;
        }
        Some(Held(Rc::clone(&self.0)))
    }

    pub fn is_held(&self) -> bool {
        self.0.get()
    }
}

/// Per-view filter comparing notifications against the last token applied.
#[derive(Debug, Clone)]
pub struct EchoFilter {
    view: ViewId,
    last: Option<ChangeToken>,
}

impl EchoFilter {
    pub fn new(view: ViewId) -> Self {
        EchoFilter { view, last: None }
    }

    pub fn view(&self) -> ViewId {
        self.view
    }

    /// Whether `notification` should be applied; records its token if so.
    ///
    /// Stale tokens are dropped. Selection changes that originated from this
    /// view are dropped too; the view already shows them. Structural changes
    /// are always applied, whoever caused them.
    pub fn admit(&mut self, notification: &Notification) -> bool {
        let token = notification.token();
        if self.last.is_some_and(|last| token <= last) {
            return false;
        }
        self.last = Some(token);
        !(notification.is_selection() && notification.origin() == Origin::View(self.view))
    }

    pub fn last(&self) -> Option<ChangeToken> {
        self.last
    }
}
