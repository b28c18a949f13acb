//! View synchronizers.
//!
//! Each view subscribes to the engine's [`ChangeBus`](crate::bus::ChangeBus)
//! and keeps its own presentation in step with the graph. Views never call
//! the engine from inside a notification. User input on a view produces
//! [`SelectionRequest`]s in the view's outbox, which the host forwards with
//! [`pump`].

pub mod flowchart;
pub mod guard;
pub mod simulator;
pub mod tree;

use std::cell::RefCell;
use std::rc::Rc;

use crate::bus::{DispatchContext, Notification, SelectionRequest, ViewId};
use crate::engine::EditEngine;

pub use flowchart::{FlowLink, FlowNode, FlowNodeType, FlowchartModel, FlowchartView};
pub use guard::{EchoFilter, ReentrancyGuard};
pub use simulator::{AlwaysPass, ConditionEvaluator, ScriptedConditions, Simulator, SimulatorError};
pub use tree::{TreeOutline, TreeRow};

pub trait View {
    fn id(&self) -> ViewId;

    fn on_notification(&mut self, notification: &Notification, ctx: &DispatchContext<'_>);

    /// Takes the selection requests produced by user input since the last
    /// call.
    fn take_requests(&mut self) -> Vec<SelectionRequest>;
}

/// Registers a view built by `make` and subscribes it to the engine's bus.
///
/// The subscription holds a weak reference; dropping every strong reference
/// to the view silences it.
pub fn attach<V: View + 'static>(
    engine: &mut EditEngine,
    make: impl FnOnce(ViewId, &EditEngine) -> V,
) -> Rc<RefCell<V>> {
    let id = engine.register_view();
    let view = Rc::new(RefCell::new(make(id, engine)));
    let weak = Rc::downgrade(&view);
    engine.subscribe(id, move |notification, ctx| {
        if let Some(view) = weak.upgrade() {
            view.borrow_mut().on_notification(notification, ctx);
        }
    });
    view
}

/// Forwards a view's pending selection requests to the engine. Returns how
/// many were forwarded.
pub fn pump<V: View>(engine: &mut EditEngine, view: &RefCell<V>) -> usize {
    let requests = view.borrow_mut().take_requests();
    let count = requests.len();
    for request in requests {
        engine.request_selection(request);
    }
    count
}
