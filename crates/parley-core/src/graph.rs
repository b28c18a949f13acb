//! DialogueGraph: the node arena and its ordered pointer lists.
//!
//! [`DialogueGraph`] owns every [`DialogueNode`] in an id-keyed arena plus
//! the ordered pointer list of the synthetic root. Nodes never own other
//! nodes; they reference children through [`Pointer`]s, so a node may have
//! many parents (links) without any shared mutable ownership.
//!
//! # Mutation model
//!
//! Structural primitives stage the change on a clone, run
//! [`validate::check`](crate::validate::check) on the staged graph, and only
//! then swap it in. A primitive that would break an invariant returns
//! [`CoreError::InvariantViolation`] and leaves `self` untouched, so callers
//! never observe a half-applied mutation.
//!
//! Nodes that become unreachable when a pointer is removed are collected in
//! the same step and handed back in [`Detached`] so the removal can be
//! reversed exactly with [`DialogueGraph::restore`].

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{CoreError, Invariant};
use crate::id::{NodeId, ParentRef, PointerId};
use crate::node::{DialogueNode, NodeContent, NodeKind};
use crate::pointer::{Pointer, PointerData};
use crate::validate;

/// Where a pointer sits: its owning list and its index in that list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerLocation {
    pub parent: ParentRef,
    pub index: usize,
}

/// Everything removed by [`DialogueGraph::remove_pointer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detached {
    /// Where the pointer was before removal.
    pub location: PointerLocation,
    pub pointer: Pointer,
    /// Nodes that lost their last path from the root, with their own pointers
    /// intact.
    pub collected: Vec<DialogueNode>,
}

/// The dialogue graph container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueGraph {
    root: Vec<Pointer>,
    nodes: IndexMap<NodeId, DialogueNode>,
    next_node_id: u32,
    next_pointer_id: u32,
}

impl Default for DialogueGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogueGraph {
    /// Creates an empty graph: a root with no starting entries.
    pub fn new() -> Self {
        DialogueGraph {
            root: Vec::new(),
            nodes: IndexMap::new(),
            next_node_id: 0,
            next_pointer_id: 0,
        }
    }

    /// Constructs a graph from stored parts, validating every invariant.
    ///
    /// This is the load path: id counters are derived from the largest ids
    /// present so freshly allocated ids never collide with loaded ones.
    pub fn from_parts(root: Vec<Pointer>, nodes: Vec<DialogueNode>) -> Result<Self, CoreError> {
        let mut map = IndexMap::with_capacity(nodes.len());
        for node in nodes {
            let id = node.id;
            if map.insert(id, node).is_some() {
                return Err(CoreError::violation(
                    Invariant::UniqueIdentity,
                    format!("node id {} appears more than once", id),
                ));
            }
        }
        DialogueGraph {
            root,
            nodes: map,
            next_node_id: 0,
            next_pointer_id: 0,
        }
        .validated()
    }

    /// Repairs id counters and validates. Used after deserialization.
    ///
    /// A graph holding an id of `u32::MAX` is rejected, since no counter
    /// value could follow it.
    pub fn validated(mut self) -> Result<Self, CoreError> {
        self.repair_counters()?;
        validate::check(&self)?;
        Ok(self)
    }

    /// Checks every structural invariant without modifying the graph.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate::check(self)
    }

    fn repair_counters(&mut self) -> Result<(), CoreError> {
        let mut next_node = self.next_node_id;
        let mut next_pointer = self.next_pointer_id;
        for node in self.nodes.values() {
            next_node = next_node.max(successor(node.id.0, NODE_SPACE)?);
        }
        for (_, pointers) in self.pointer_lists() {
            for pointer in pointers {
                next_pointer = next_pointer.max(successor(pointer.id.0, POINTER_SPACE)?);
            }
        }
        self.next_node_id = next_node;
        self.next_pointer_id = next_pointer;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    /// The root's ordered starting-entry pointers.
    pub fn root_pointers(&self) -> &[Pointer] {
        &self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&DialogueNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &DialogueNode> {
        self.nodes.values()
    }

    pub(crate) fn node_entries(&self) -> impl Iterator<Item = (&NodeId, &DialogueNode)> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn pointer_count(&self) -> usize {
        self.root.len() + self.nodes.values().map(|n| n.pointers.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The ordered pointer list of `parent`, or `None` if the node is absent.
    pub fn pointers_of(&self, parent: ParentRef) -> Option<&[Pointer]> {
        match parent {
            ParentRef::Root => Some(&self.root),
            ParentRef::Node(id) => self.nodes.get(&id).map(|n| n.pointers.as_slice()),
        }
    }

    /// Every pointer list in the graph, the root's first.
    pub fn pointer_lists(&self) -> impl Iterator<Item = (ParentRef, &[Pointer])> {
        std::iter::once((ParentRef::Root, self.root.as_slice())).chain(
            self.nodes
                .values()
                .map(|n| (ParentRef::Node(n.id), n.pointers.as_slice())),
        )
    }

    /// The kind a child of `parent` must have.
    pub fn child_kind(&self, parent: ParentRef) -> Result<NodeKind, CoreError> {
        match parent {
            ParentRef::Root => Ok(NodeKind::Entry),
            ParentRef::Node(id) => self
                .nodes
                .get(&id)
                .map(|n| n.kind.child_kind())
                .ok_or(CoreError::NodeNotFound { id }),
        }
    }

    /// Finds the list and index holding pointer `id`.
    pub fn locate(&self, id: PointerId) -> Option<PointerLocation> {
        self.pointer_lists().find_map(|(parent, pointers)| {
            pointers
                .iter()
                .position(|p| p.id == id)
                .map(|index| PointerLocation { parent, index })
        })
    }

    /// Finds pointer `id` by scanning every list. Prefer
    /// [`pointer_at`](Self::pointer_at) when the location is already known.
    pub fn pointer(&self, id: PointerId) -> Option<&Pointer> {
        self.pointer_at(self.locate(id)?)
    }

    /// The pointer at `location`, without a scan.
    pub fn pointer_at(&self, location: PointerLocation) -> Option<&Pointer> {
        self.pointers_of(location.parent)?.get(location.index)
    }

    /// Locations of every pointer targeting `node`, root first then in node
    /// insertion order.
    pub fn incoming(&self, node: NodeId) -> Vec<PointerLocation> {
        let mut found = Vec::new();
        for (parent, pointers) in self.pointer_lists() {
            for (index, pointer) in pointers.iter().enumerate() {
                if pointer.target == node {
                    found.push(PointerLocation { parent, index });
                }
            }
        }
        found
    }

    /// Every node from which `node` can be reached, over all parents.
    /// Does not include `node` itself.
    pub fn ancestors(&self, node: NodeId) -> HashSet<NodeId> {
        // Most nodes have one or two parents.
        let mut parents: HashMap<NodeId, SmallVec<[NodeId; 2]>> = HashMap::new();
        for n in self.nodes.values() {
            for pointer in &n.pointers {
                parents.entry(pointer.target).or_default().push(n.id);
            }
        }
        let mut seen = HashSet::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            for &parent in parents.get(&current).into_iter().flatten() {
                if seen.insert(parent) {
                    stack.push(parent);
                }
            }
        }
        seen
    }

    /// Whether `to` is reachable from `from` (a node always reaches itself).
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        self.descendants(from).contains(&to)
    }

    /// `node` and everything reachable from it, in depth-first pre-order with
    /// shared nodes listed once. Empty if `node` is absent.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.contains(node) {
            return order;
        }
        let mut seen = HashSet::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            order.push(current);
            if let Some(n) = self.nodes.get(&current) {
                for pointer in n.pointers.iter().rev() {
                    if !seen.contains(&pointer.target) {
                        stack.push(pointer.target);
                    }
                }
            }
        }
        order
    }

    // -----------------------------------------------------------------------
    // Id allocation
    // -----------------------------------------------------------------------

    /// Reserves a fresh node id. Ids are never reused, even after removal.
    pub fn allocate_node_id(&mut self) -> Result<NodeId, CoreError> {
        let id = NodeId(self.next_node_id);
        self.next_node_id = successor(self.next_node_id, NODE_SPACE)?;
        Ok(id)
    }

    /// Reserves a fresh pointer id.
    pub fn allocate_pointer_id(&mut self) -> Result<PointerId, CoreError> {
        let id = PointerId(self.next_pointer_id);
        self.next_pointer_id = successor(self.next_pointer_id, POINTER_SPACE)?;
        Ok(id)
    }

    fn reserve_ids_of(&mut self, node: &DialogueNode) -> Result<(), CoreError> {
        self.next_node_id = self.next_node_id.max(successor(node.id.0, NODE_SPACE)?);
        for pointer in &node.pointers {
            self.reserve_pointer_id(pointer.id)?;
        }
        Ok(())
    }

    fn reserve_pointer_id(&mut self, id: PointerId) -> Result<(), CoreError> {
        self.next_pointer_id = self.next_pointer_id.max(successor(id.0, POINTER_SPACE)?);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Structural primitives
    // -----------------------------------------------------------------------

    /// Creates a childless node and attaches it under `parent`.
    ///
    /// `index` of `None` appends. Returns the new node id and the id of the
    /// pointer that attaches it.
    pub fn add_node(
        &mut self,
        parent: ParentRef,
        index: Option<usize>,
        kind: NodeKind,
        content: NodeContent,
    ) -> Result<(NodeId, PointerId), CoreError> {
        self.transact(|g| {
            let id = g.allocate_node_id()?;
            let pointer_id = g.allocate_pointer_id()?;
            g.nodes.insert(id, DialogueNode::new(id, kind, content));
            g.attach(parent, index, Pointer::new(pointer_id, id))?;
            Ok((id, pointer_id))
        })
    }

    /// Inserts an existing pointer (typically a link to a node already in the
    /// graph) under `parent` at `index`.
    pub fn insert_pointer(
        &mut self,
        parent: ParentRef,
        index: usize,
        pointer: Pointer,
    ) -> Result<(), CoreError> {
        self.transact(|g| {
            g.reserve_pointer_id(pointer.id)?;
            g.attach(parent, Some(index), pointer)
        })
    }

    /// Adds `nodes` to the arena and attaches `pointer` under `parent` at
    /// `index`. The nodes must carry ids not present in the graph.
    ///
    /// Used to paste a re-identified fragment and to restore a removal.
    pub fn graft(
        &mut self,
        parent: ParentRef,
        index: usize,
        pointer: Pointer,
        nodes: Vec<DialogueNode>,
    ) -> Result<(), CoreError> {
        self.transact(|g| {
            for node in nodes {
                if g.nodes.contains_key(&node.id) {
                    return Err(CoreError::violation(
                        Invariant::UniqueIdentity,
                        format!("node {} is already in the graph", node.id),
                    ));
                }
                g.reserve_ids_of(&node)?;
                g.nodes.insert(node.id, node);
            }
            g.reserve_pointer_id(pointer.id)?;
            g.attach(parent, Some(index), pointer)
        })
    }

    /// Removes pointer `id` and garbage-collects nodes left unreachable.
    pub fn remove_pointer(&mut self, id: PointerId) -> Result<Detached, CoreError> {
        self.transact(|g| {
            let location = g.locate(id).ok_or(CoreError::PointerNotFound { id })?;
            let pointer = g.list_mut(location.parent)?.remove(location.index);
            let collected = g.collect_unreachable();
            Ok(Detached {
                location,
                pointer,
                collected,
            })
        })
    }

    /// Reverses a [`remove_pointer`](Self::remove_pointer).
    pub fn restore(&mut self, detached: Detached) -> Result<(), CoreError> {
        let Detached {
            location,
            pointer,
            collected,
        } = detached;
        self.graft(location.parent, location.index, pointer, collected)
    }

    /// Moves pointer `id` to `new_parent` at `index`.
    ///
    /// `index` is interpreted after the pointer has been removed from its old
    /// list, so moving within one list needs no adjustment by the caller.
    /// Returns the pointer's old location.
    pub fn move_pointer(
        &mut self,
        id: PointerId,
        new_parent: ParentRef,
        index: usize,
    ) -> Result<PointerLocation, CoreError> {
        self.transact(|g| {
            let location = g.locate(id).ok_or(CoreError::PointerNotFound { id })?;
            let pointer = g.list_mut(location.parent)?.remove(location.index);
            g.attach(new_parent, Some(index), pointer)?;
            Ok(location)
        })
    }

    /// Retargets pointer `id` to `target`, returning the previous target.
    pub fn replace_pointer_target(
        &mut self,
        id: PointerId,
        target: NodeId,
    ) -> Result<NodeId, CoreError> {
        self.transact(|g| {
            let pointer = g.pointer_mut(id)?;
            Ok(std::mem::replace(&mut pointer.target, target))
        })
    }

    /// Replaces a node's content, returning the previous content.
    ///
    /// Content never participates in structural invariants, so this does not
    /// stage a copy.
    pub fn replace_content(
        &mut self,
        id: NodeId,
        content: NodeContent,
    ) -> Result<NodeContent, CoreError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(CoreError::NodeNotFound { id })?;
        Ok(std::mem::replace(&mut node.content, content))
    }

    /// Replaces a pointer's edge data, returning the previous data.
    pub fn replace_pointer_data(
        &mut self,
        id: PointerId,
        data: PointerData,
    ) -> Result<PointerData, CoreError> {
        let pointer = self.pointer_mut(id)?;
        Ok(std::mem::replace(&mut pointer.data, data))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn transact<R>(
        &mut self,
        op: impl FnOnce(&mut DialogueGraph) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let mut staged = self.clone();
        let out = op(&mut staged)?;
        validate::check(&staged)?;
        *self = staged;
        Ok(out)
    }

    fn list_mut(&mut self, parent: ParentRef) -> Result<&mut Vec<Pointer>, CoreError> {
        match parent {
            ParentRef::Root => Ok(&mut self.root),
            ParentRef::Node(id) => self
                .nodes
                .get_mut(&id)
                .map(|n| &mut n.pointers)
                .ok_or(CoreError::NodeNotFound { id }),
        }
    }

    fn pointer_mut(&mut self, id: PointerId) -> Result<&mut Pointer, CoreError> {
        let location = self.locate(id).ok_or(CoreError::PointerNotFound { id })?;
        self.list_mut(location.parent)?
            .get_mut(location.index)
            .ok_or(CoreError::PointerNotFound { id })
    }

    fn attach(
        &mut self,
        parent: ParentRef,
        index: Option<usize>,
        pointer: Pointer,
    ) -> Result<(), CoreError> {
        let list = self.list_mut(parent)?;
        let len = list.len();
        let index = index.unwrap_or(len);
        if index > len {
            return Err(CoreError::InvalidIndex { index, len });
        }
        list.insert(index, pointer);
        Ok(())
    }

    /// Removes every node with no path from the root, returning them in
    /// arena order.
    fn collect_unreachable(&mut self) -> Vec<DialogueNode> {
        let mut reached = HashSet::new();
        let mut stack: Vec<NodeId> = self.root.iter().map(|p| p.target).collect();
        while let Some(current) = stack.pop() {
            if !reached.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.pointers.iter().map(|p| p.target));
            }
        }
        let dead: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|id| !reached.contains(*id))
            .copied()
            .collect();
        dead.into_iter()
            .filter_map(|id| self.nodes.shift_remove(&id))
            .collect()
    }
}

const NODE_SPACE: &str = "node";
const POINTER_SPACE: &str = "pointer";

/// The counter value after `id`.
fn successor(id: u32, space: &'static str) -> Result<u32, CoreError> {
    id.checked_add(1).ok_or(CoreError::IdSpaceExhausted { space })
}
