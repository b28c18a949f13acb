//! Step-through conversation simulator.
//!
//! Plays the dialogue the way the game would: the first root entry whose
//! conditions pass opens the conversation, the player picks among the
//! replies that pass, and each reply leads to its first passing entry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use parley_core::{DialogueGraph, NodeId, NodeKind, ParentRef, Pointer, PointerId, ScriptHook};
use serde::Serialize;
use thiserror::Error;

use crate::bus::{ChangeKind, DispatchContext, Notification, Origin, SelectionRequest, ViewId};
use crate::engine::EditEngine;
use crate::sync::guard::{EchoFilter, ReentrancyGuard};
use crate::sync::View;

pub trait ConditionEvaluator {
    fn passes(&self, condition: &ScriptHook) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPass;

impl ConditionEvaluator for AlwaysPass {
    fn passes(&self, _condition: &ScriptHook) -> bool {
        true
    }
}

/// Fixed results per script name.
#[derive(Debug, Clone)]
pub struct ScriptedConditions {
    results: HashMap<String, bool>,
    default: bool,
}

impl ScriptedConditions {
    pub fn new(default: bool) -> Self {
        ScriptedConditions {
            results: HashMap::new(),
            default,
        }
    }

    pub fn with(mut self, script: impl Into<String>, passes: bool) -> Self {
        self.results.insert(script.into(), passes);
        self
    }
}

impl ConditionEvaluator for ScriptedConditions {
    fn passes(&self, condition: &ScriptHook) -> bool {
        self.results
            .get(&condition.script)
            .copied()
            .unwrap_or(self.default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulatorError {
    #[error("the conversation has not started or has ended")]
    NotRunning,

    #[error("pointer {0} is not an available reply")]
    UnavailableReply(PointerId),

    #[error("node {0} is not part of the current dialogue")]
    UnknownNode(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptLine {
    pub node: NodeId,
    pub kind: NodeKind,
    pub speaker: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyChoice {
    pub pointer: PointerId,
    pub node: NodeId,
    pub text: String,
}

struct Step {
    entry: NodeId,
    transcript_len: usize,
}

pub struct Simulator {
    id: ViewId,
    filter: EchoFilter,
    guard: ReentrancyGuard,
    evaluator: Box<dyn ConditionEvaluator>,
    current: Option<NodeId>,
    back: Vec<Step>,
    transcript: Vec<TranscriptLine>,
    outbox: Vec<SelectionRequest>,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("id", &self.id)
            .field("current", &self.current)
            .field("depth", &self.back.len())
            .field("transcript", &self.transcript.len())
            .finish()
    }
}

impl Simulator {
    pub fn new(id: ViewId, evaluator: Box<dyn ConditionEvaluator>) -> Self {
        Simulator {
            id,
            filter: EchoFilter::new(id),
            guard: ReentrancyGuard::new(),
            evaluator,
            current: None,
            back: Vec::new(),
            transcript: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn attach(engine: &mut EditEngine, evaluator: Box<dyn ConditionEvaluator>) -> Rc<RefCell<Simulator>> {
        crate::sync::attach(engine, |id, _| Simulator::new(id, evaluator))
    }

    /// The entry currently being spoken.
    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn transcript(&self) -> &[TranscriptLine] {
        &self.transcript
    }

    fn passes(&self, graph: &DialogueGraph, pointer: &Pointer) -> bool {
        if pointer.data.condition.is_set() && !self.evaluator.passes(&pointer.data.condition) {
            return false;
        }
        graph.node(pointer.target).is_some_and(|n| {
            !n.content.condition.is_set() || self.evaluator.passes(&n.content.condition)
        })
    }

    fn first_passing(&self, graph: &DialogueGraph, parent: ParentRef) -> Option<NodeId> {
        graph
            .pointers_of(parent)?
            .iter()
            .find(|p| self.passes(graph, p))
            .map(|p| p.target)
    }

    fn say(&mut self, graph: &DialogueGraph, node: NodeId) {
        if let Some(n) = graph.node(node) {
            self.transcript.push(TranscriptLine {
                node,
                kind: n.kind,
                speaker: n.content.speaker.clone(),
                text: n.text().to_string(),
            });
        }
    }

    fn enter(&mut self, graph: &DialogueGraph, entry: Option<NodeId>) {
        self.current = entry;
        if let Some(entry) = entry {
            self.say(graph, entry);
            if !self.guard.is_held() {
                self.outbox.push(SelectionRequest {
                    node: Some(entry),
                    occurrence: None,
                    origin: Origin::View(self.id),
                });
            }
        }
    }

    /// Restarts the conversation. Returns the opening entry, if any passes.
    pub fn start(&mut self, graph: &DialogueGraph) -> Option<NodeId> {
        self.reset();
        let opening = self.first_passing(graph, ParentRef::Root);
        self.enter(graph, opening);
        opening
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.back.clear();
        self.transcript.clear();
    }

    /// Replies the player can pick right now.
    pub fn replies(&self, graph: &DialogueGraph) -> Vec<ReplyChoice> {
        let Some(entry) = self.current else {
            return Vec::new();
        };
        graph
            .pointers_of(ParentRef::Node(entry))
            .unwrap_or_default()
            .iter()
            .filter(|p| self.passes(graph, p))
            .filter_map(|p| {
                Some(ReplyChoice {
                    pointer: p.id,
                    node: p.target,
                    text: graph.node(p.target)?.text().to_string(),
                })
            })
            .collect()
    }

    /// Picks the reply behind `pointer`. Returns the next entry, or `None`
    /// when the conversation ends there.
    pub fn choose(&mut self, graph: &DialogueGraph, pointer: PointerId) -> Result<Option<NodeId>, SimulatorError> {
        let Some(entry) = self.current else {
            return Err(SimulatorError::NotRunning);
        };
        let reply = self
            .replies(graph)
            .into_iter()
            .find(|r| r.pointer == pointer)
            .ok_or(SimulatorError::UnavailableReply(pointer))?;
        self.back.push(Step {
            entry,
            transcript_len: self.transcript.len(),
        });
        self.say(graph, reply.node);
        let next = self.first_passing(graph, ParentRef::Node(reply.node));
        self.enter(graph, next);
        Ok(next)
    }

    /// Steps back to the previous entry. Returns whether there was one.
    pub fn back(&mut self, graph: &DialogueGraph) -> bool {
        while let Some(step) = self.back.pop() {
            if graph.contains(step.entry) {
                self.transcript.truncate(step.transcript_len);
                self.current = Some(step.entry);
                return true;
            }
        }
        false
    }

    /// Continues the conversation from `node`. A reply continues at its
    /// first passing entry.
    pub fn jump_to(&mut self, graph: &DialogueGraph, node: NodeId) -> Result<Option<NodeId>, SimulatorError> {
        let kind = graph
            .node(node)
            .map(|n| n.kind)
            .ok_or(SimulatorError::UnknownNode(node))?;
        if let Some(entry) = self.current {
            self.back.push(Step {
                entry,
                transcript_len: self.transcript.len(),
            });
        }
        let next = match kind {
            NodeKind::Entry => Some(node),
            NodeKind::Reply => {
                self.say(graph, node);
                self.first_passing(graph, ParentRef::Node(node))
            }
        };
        self.enter(graph, next);
        Ok(next)
    }
}

impl View for Simulator {
    fn id(&self) -> ViewId {
        self.id
    }

    fn on_notification(&mut self, notification: &Notification, ctx: &DispatchContext<'_>) {
        if !self.filter.admit(notification) {
            return;
        }
        match notification {
            Notification::Structure {
                kind: ChangeKind::DialogRefreshed,
                ..
            } => {
                // Ids of the old dialogue mean nothing in the new one.
                tracing::debug!("dialogue replaced, resetting");
                self.reset();
            }
            Notification::Structure { .. } => {
                if self.current.is_some_and(|n| !ctx.graph().contains(n)) {
                    tracing::debug!("simulated entry disappeared, resetting");
                    self.reset();
                }
            }
            Notification::Selection { node: Some(node), .. } => {
                if self.current == Some(*node) {
                    return;
                }
                let Some(_held) = self.guard.hold() else {
                    return;
                };
                if let Err(err) = self.jump_to(ctx.graph(), *node) {
                    tracing::debug!("simulator ignored selection: {}", err);
                }
            }
            Notification::Selection { node: None, .. } => {}
        }
    }

    fn take_requests(&mut self) -> Vec<SelectionRequest> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::demo::demo_dialogue;

    #[test]
    fn walks_the_demo() {
        let graph = demo_dialogue().unwrap();
        let mut sim = Simulator::new(ViewId(0), Box::new(AlwaysPass));
        assert_eq!(sim.start(&graph), Some(NodeId(0)));
        let replies: Vec<_> = sim.replies(&graph).into_iter().map(|r| r.text).collect();
        assert_eq!(replies, vec!["Greetings.", "What do you want?", "[Leave]"]);
        assert_eq!(sim.choose(&graph, PointerId(1)), Ok(Some(NodeId(4))));
        assert_eq!(sim.choose(&graph, PointerId(3)), Err(SimulatorError::UnavailableReply(PointerId(3))));
        assert_eq!(sim.choose(&graph, PointerId(8)), Ok(Some(NodeId(5))));
        assert!(sim.replies(&graph).is_empty());
        let spoken: Vec<u32> = sim.transcript().iter().map(|l| l.node.0).collect();
        assert_eq!(spoken, vec![0, 1, 4, 8, 5]);
    }

    #[test]
    fn failing_condition_hides_reply() {
        let graph = demo_dialogue().unwrap();
        let mut sim = Simulator::new(
            ViewId(0),
            Box::new(ScriptedConditions::new(true).with("gc_check_skill", false)),
        );
        sim.start(&graph);
        sim.choose(&graph, PointerId(1)).unwrap();
        let replies: Vec<_> = sim.replies(&graph).into_iter().map(|r| r.node).collect();
        assert_eq!(replies, vec![NodeId(8)]);
    }

    #[test]
    fn back_restores_transcript() {
        let graph = demo_dialogue().unwrap();
        let mut sim = Simulator::new(ViewId(0), Box::new(AlwaysPass));
        sim.start(&graph);
        sim.choose(&graph, PointerId(2)).unwrap();
        assert_eq!(sim.current(), Some(NodeId(5)));
        assert!(sim.back(&graph));
        assert_eq!(sim.current(), Some(NodeId(0)));
        assert_eq!(sim.transcript().len(), 1);
        assert!(!sim.back(&graph));
    }

    #[test]
    fn leave_ends_the_conversation() {
        let graph = demo_dialogue().unwrap();
        let mut sim = Simulator::new(ViewId(0), Box::new(AlwaysPass));
        sim.start(&graph);
        assert_eq!(sim.choose(&graph, PointerId(3)), Ok(None));
        assert_eq!(sim.current(), None);
        assert_eq!(sim.choose(&graph, PointerId(1)), Err(SimulatorError::NotRunning));
    }

    #[test]
    fn jump_to_reply_continues_at_its_entry() {
        let graph = demo_dialogue().unwrap();
        let mut sim = Simulator::new(ViewId(0), Box::new(AlwaysPass));
        assert_eq!(sim.jump_to(&graph, NodeId(6)), Ok(Some(NodeId(7))));
        assert_eq!(sim.jump_to(&graph, NodeId(42)), Err(SimulatorError::UnknownNode(NodeId(42))));
    }
}
