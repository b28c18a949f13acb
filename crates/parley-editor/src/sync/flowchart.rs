//! Node/link model for the flowchart panel.
//!
//! Every node appears once, as `npc_{id}` or `pc_{id}`. A link occurrence
//! becomes its own `link_{pointer}` node pointing back at the original, so
//! the drawn graph stays a tree plus back-references. Layout is the panel's
//! business; this module only decides what is drawn.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use parley_core::hash::structure_fingerprint;
use parley_core::{DialogueGraph, DialogueNode, NodeId, NodeKind, Occurrence, PointerId, Projection};
use serde::{Deserialize, Serialize};

use crate::bus::{ChangeKind, DispatchContext, Notification, Origin, SelectionRequest, ViewId};
use crate::config::EditorConfig;
use crate::engine::EditEngine;
use crate::sync::guard::{EchoFilter, ReentrancyGuard};
use crate::sync::View;

pub const ROOT_ID: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowNodeType {
    Root,
    Npc,
    Pc,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: FlowNodeType,
    pub text: String,
    pub speaker: String,
    pub has_action: bool,
    pub has_condition: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_script: Option<String>,
    #[serde(default)]
    pub is_link: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLink {
    pub source: String,
    pub target: String,
    pub has_condition: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_script: Option<String>,
    pub pointer: PointerId,
    pub is_link: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowchartModel {
    pub nodes: Vec<FlowNode>,
    pub links: Vec<FlowLink>,
}

pub fn node_flow_id(node: NodeId, kind: NodeKind) -> String {
    match kind {
        NodeKind::Entry => format!("npc_{}", node),
        NodeKind::Reply => format!("pc_{}", node),
    }
}

fn occurrence_flow_id(occ: &Occurrence) -> String {
    if occ.is_link {
        format!("link_{}", occ.pointer)
    } else {
        node_flow_id(occ.node, occ.kind)
    }
}

fn script(hook: &parley_core::ScriptHook) -> Option<String> {
    hook.is_set().then(|| hook.script.clone())
}

fn describe(flow: &mut FlowNode, node: &DialogueNode) {
    flow.speaker = node.content.speaker.clone().unwrap_or_default();
    flow.action_script = script(&node.content.action);
    flow.condition_script = script(&node.content.condition);
    flow.has_action = flow.action_script.is_some();
    flow.has_condition = flow.condition_script.is_some();
    flow.text = if flow.is_link {
        format!("-> {}", node.text())
    } else {
        node.text().to_string()
    };
}

impl FlowchartModel {
    pub fn build(graph: &DialogueGraph, projection: &Projection) -> FlowchartModel {
        let mut model = FlowchartModel::default();
        model.nodes.push(FlowNode {
            id: ROOT_ID.to_string(),
            node_type: FlowNodeType::Root,
            text: "Dialog Start".to_string(),
            speaker: String::new(),
            has_action: false,
            has_condition: false,
            action_script: None,
            condition_script: None,
            is_link: false,
            link_target: None,
        });
        for occ in projection.occurrences() {
            let Some(node) = graph.node(occ.node) else {
                continue;
            };
            let id = occurrence_flow_id(occ);
            let mut flow = FlowNode {
                id: id.clone(),
                node_type: match (occ.is_link, occ.kind) {
                    (true, _) => FlowNodeType::Link,
                    (false, NodeKind::Entry) => FlowNodeType::Npc,
                    (false, NodeKind::Reply) => FlowNodeType::Pc,
                },
                text: String::new(),
                speaker: String::new(),
                has_action: false,
                has_condition: false,
                action_script: None,
                condition_script: None,
                is_link: occ.is_link,
                link_target: occ.is_link.then(|| node_flow_id(occ.node, occ.kind)),
            };
            describe(&mut flow, node);
            model.nodes.push(flow);

            let source = match occ.parent_occurrence.and_then(|p| projection.get(p)) {
                Some(parent) => occurrence_flow_id(parent),
                None => ROOT_ID.to_string(),
            };
            let condition = graph
                .pointer_at(occ.location())
                .and_then(|p| script(&p.data.condition));
            model.links.push(FlowLink {
                source,
                target: id,
                has_condition: condition.is_some(),
                condition_script: condition,
                pointer: occ.pointer,
                is_link: occ.is_link,
            });
        }
        model
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Refreshes everything drawn for `node` without rebuilding.
    fn patch(&mut self, graph: &DialogueGraph, projection: &Projection, node: NodeId) {
        let Some(data) = graph.node(node) else {
            return;
        };
        let own = node_flow_id(node, data.kind);
        for flow in &mut self.nodes {
            if flow.id == own || flow.link_target.as_deref() == Some(own.as_str()) {
                describe(flow, data);
            }
        }
        for link in &mut self.links {
            let condition = projection
                .get(link.pointer)
                .and_then(|occ| graph.pointer_at(occ.location()))
                .and_then(|p| script(&p.data.condition));
            link.has_condition = condition.is_some();
            link.condition_script = condition;
        }
    }
}

/// What a flow node id stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Target {
    node: NodeId,
    occurrence: Option<PointerId>,
}

#[derive(Debug)]
pub struct FlowchartView {
    id: ViewId,
    filter: EchoFilter,
    guard: ReentrancyGuard,
    model: FlowchartModel,
    targets: HashMap<String, Target>,
    fingerprint: Option<blake3::Hash>,
    auto_refresh: bool,
    sync_selection: bool,
    stale: bool,
    selected: Option<String>,
    outbox: Vec<SelectionRequest>,
    renders: usize,
    patches: usize,
}

impl FlowchartView {
    pub fn new(id: ViewId, config: &EditorConfig, graph: &DialogueGraph, projection: &Projection) -> Self {
        let mut view = FlowchartView {
            id,
            filter: EchoFilter::new(id),
            guard: ReentrancyGuard::new(),
            model: FlowchartModel::default(),
            targets: HashMap::new(),
            fingerprint: None,
            auto_refresh: config.flowchart_auto_refresh,
            sync_selection: config.sync_selection,
            stale: false,
            selected: None,
            outbox: Vec::new(),
            renders: 0,
            patches: 0,
        };
        view.refresh(graph, projection);
        view
    }

    pub fn attach(engine: &mut EditEngine) -> Rc<RefCell<FlowchartView>> {
        crate::sync::attach(engine, |id, engine| {
            FlowchartView::new(id, engine.config(), engine.graph(), engine.projection())
        })
    }

    pub fn model(&self) -> &FlowchartModel {
        &self.model
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Full re-renders so far.
    pub fn renders(&self) -> usize {
        self.renders
    }

    /// Incremental updates so far.
    pub fn patches(&self) -> usize {
        self.patches
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    pub fn set_auto_refresh(&mut self, enabled: bool) {
        self.auto_refresh = enabled;
    }

    pub fn sync_selection(&self) -> bool {
        self.sync_selection
    }

    pub fn set_sync_selection(&mut self, enabled: bool) {
        self.sync_selection = enabled;
    }

    /// Rebuilds the model unless the graph is structurally identical to the
    /// one last rendered. Returns whether it re-rendered.
    pub fn refresh(&mut self, graph: &DialogueGraph, projection: &Projection) -> bool {
        self.stale = false;
        let fingerprint = structure_fingerprint(graph);
        if self.fingerprint == Some(fingerprint) {
            return false;
        }
        self.model = FlowchartModel::build(graph, projection);
        self.targets = projection
            .occurrences()
            .iter()
            .map(|occ| {
                let target = Target {
                    node: occ.node,
                    occurrence: Some(occ.pointer).filter(|_| occ.is_link),
                };
                (occurrence_flow_id(occ), target)
            })
            .collect();
        if self
            .selected
            .as_ref()
            .is_some_and(|id| id != ROOT_ID && !self.targets.contains_key(id))
        {
            self.selected = None;
        }
        self.fingerprint = Some(fingerprint);
        self.renders += 1;
        true
    }

    fn on_structure(&mut self, kind: ChangeKind, node: Option<NodeId>, ctx: &DispatchContext<'_>) {
        if !self.auto_refresh {
            self.stale = true;
            return;
        }
        match (kind, node) {
            (ChangeKind::NodeModified, Some(node)) if !self.stale => {
                self.model.patch(ctx.graph(), ctx.projection(), node);
                self.fingerprint = Some(structure_fingerprint(ctx.graph()));
                self.patches += 1;
            }
            (ChangeKind::DialogRefreshed, _) => {
                self.fingerprint = None;
                self.selected = None;
                self.refresh(ctx.graph(), ctx.projection());
            }
            _ => {
                self.refresh(ctx.graph(), ctx.projection());
            }
        }
    }

    /// The user clicked a flow node.
    pub fn click(&mut self, id: &str) {
        if id != ROOT_ID && !self.targets.contains_key(id) {
            return;
        }
        self.selected = Some(id.to_string());
        self.on_node_selected(id);
    }

    fn on_node_selected(&mut self, id: &str) {
        if self.guard.is_held() || !self.sync_selection {
            return;
        }
        let Some(target) = self.targets.get(id).copied() else {
            return;
        };
        self.outbox.push(SelectionRequest {
            node: Some(target.node),
            occurrence: target.occurrence,
            origin: Origin::View(self.id),
        });
    }

    fn apply_selection(&mut self, node: Option<NodeId>, occurrence: Option<PointerId>, projection: &Projection) {
        if !self.sync_selection {
            return;
        }
        let Some(_held) = self.guard.hold() else {
            return;
        };
        let id = node.and_then(|n| {
            let occ = occurrence
                .and_then(|p| projection.get(p))
                .filter(|o| o.node == n)
                .or_else(|| projection.canonical(n))?;
            Some(occurrence_flow_id(occ))
        });
        self.selected = id.clone();
        if let Some(id) = id {
            self.on_node_selected(&id);
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.model).unwrap_or(serde_json::Value::Null)
    }

    /// Pretty-printed `{ nodes, links }` document for the panel.
    pub fn export(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.model)
    }
}

impl View for FlowchartView {
    fn id(&self) -> ViewId {
        self.id
    }

    fn on_notification(&mut self, notification: &Notification, ctx: &DispatchContext<'_>) {
        if !self.filter.admit(notification) {
            return;
        }
        match notification {
            Notification::Structure { kind, node, .. } => self.on_structure(*kind, *node, ctx),
            Notification::Selection { node, occurrence, .. } => {
                self.apply_selection(*node, *occurrence, ctx.projection())
            }
        }
    }

    fn take_requests(&mut self) -> Vec<SelectionRequest> {
        std::mem::take(&mut self.outbox)
    }
}
