//! Occurrence projection: one depth-first traversal of the graph.
//!
//! Every view that shows the graph as a hierarchy works on a [`Projection`].
//! The traversal is pre-order from the root with a visited set scoped to the
//! single call. The first time a node is reached it is expanded (its
//! *canonical* occurrence); later pointers to it yield link occurrences that
//! are not expanded.
//!
//! Because each node is expanded exactly once, each pointer in the graph
//! produces exactly one occurrence, so a [`PointerId`] is a stable key for an
//! occurrence within a projection and across rebuilds for as long as the
//! pointer lives.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::graph::{DialogueGraph, PointerLocation};
use crate::id::{NodeId, ParentRef, PointerId};
use crate::node::NodeKind;

/// Addresses a presentation position: the synthetic root or the occurrence
/// produced by a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccurrenceRef {
    Root,
    Pointer(PointerId),
}

impl From<PointerId> for OccurrenceRef {
    fn from(id: PointerId) -> Self {
        OccurrenceRef::Pointer(id)
    }
}

/// One appearance of a node in a traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// The pointer that produced this occurrence.
    pub pointer: PointerId,
    pub node: NodeId,
    pub kind: NodeKind,
    /// Owner of the producing pointer's list.
    pub parent: ParentRef,
    /// The occurrence this one is nested under; `None` at the top level.
    pub parent_occurrence: Option<PointerId>,
    /// Position in the parent's pointer list.
    pub index: usize,
    /// Zero for the root's entries.
    pub depth: usize,
    /// The node was already expanded earlier in this traversal.
    pub is_link: bool,
}

impl Occurrence {
    /// Where the producing pointer sits in the graph.
    pub fn location(&self) -> PointerLocation {
        PointerLocation {
            parent: self.parent,
            index: self.index,
        }
    }
}

struct Frame {
    pointer: PointerId,
    node: NodeId,
    parent: ParentRef,
    parent_occurrence: Option<PointerId>,
    index: usize,
    depth: usize,
}

/// All occurrences of one traversal, in display order.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    occurrences: Vec<Occurrence>,
    by_pointer: HashMap<PointerId, usize>,
    canonical: HashMap<NodeId, PointerId>,
}

impl Projection {
    pub fn build(graph: &DialogueGraph) -> Projection {
        let mut projection = Projection::default();
        let mut visited = HashSet::new();
        let mut stack: Vec<Frame> = Vec::new();
        push_children(&mut stack, graph, ParentRef::Root, None, 0);

        while let Some(frame) = stack.pop() {
            let Some(node) = graph.node(frame.node) else {
                continue;
            };
            let is_link = !visited.insert(frame.node);
            if !is_link {
                projection.canonical.insert(frame.node, frame.pointer);
            }
            projection
                .by_pointer
                .insert(frame.pointer, projection.occurrences.len());
            projection.occurrences.push(Occurrence {
                pointer: frame.pointer,
                node: frame.node,
                kind: node.kind,
                parent: frame.parent,
                parent_occurrence: frame.parent_occurrence,
                index: frame.index,
                depth: frame.depth,
                is_link,
            });
            if !is_link {
                push_children(
                    &mut stack,
                    graph,
                    ParentRef::Node(frame.node),
                    Some(frame.pointer),
                    frame.depth + 1,
                );
            }
        }
        projection
    }

    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn get(&self, pointer: PointerId) -> Option<&Occurrence> {
        self.by_pointer
            .get(&pointer)
            .and_then(|&i| self.occurrences.get(i))
    }

    /// The first-discovered occurrence of `node`.
    pub fn canonical(&self, node: NodeId) -> Option<&Occurrence> {
        self.canonical.get(&node).and_then(|&p| self.get(p))
    }

    pub fn occurrences_of(&self, node: NodeId) -> impl Iterator<Item = &Occurrence> {
        self.occurrences.iter().filter(move |o| o.node == node)
    }

    /// Occurrences nested directly under `parent`. Empty for link
    /// occurrences, which are never expanded.
    pub fn children(&self, parent: OccurrenceRef) -> Vec<&Occurrence> {
        let wanted = match parent {
            OccurrenceRef::Root => None,
            OccurrenceRef::Pointer(p) => Some(p),
        };
        self.occurrences
            .iter()
            .filter(|o| o.parent_occurrence == wanted)
            .collect()
    }

    /// Enclosing occurrences of `pointer`, nearest first.
    pub fn ancestors(&self, pointer: PointerId) -> Vec<&Occurrence> {
        let mut chain = Vec::new();
        let mut current = self.get(pointer).and_then(|o| o.parent_occurrence);
        while let Some(p) = current {
            let Some(occ) = self.get(p) else { break };
            chain.push(occ);
            current = occ.parent_occurrence;
        }
        chain
    }

    /// The parent a new child would be attached to when added at `occ`.
    /// `None` if the pointer is not in this projection.
    pub fn parent_ref(&self, occ: OccurrenceRef) -> Option<ParentRef> {
        match occ {
            OccurrenceRef::Root => Some(ParentRef::Root),
            OccurrenceRef::Pointer(p) => self.get(p).map(|o| ParentRef::Node(o.node)),
        }
    }
}

fn push_children(
    stack: &mut Vec<Frame>,
    graph: &DialogueGraph,
    parent: ParentRef,
    parent_occurrence: Option<PointerId>,
    depth: usize,
) {
    let Some(pointers) = graph.pointers_of(parent) else {
        return;
    };
    for (index, pointer) in pointers.iter().enumerate().rev() {
        stack.push(Frame {
            pointer: pointer.id,
            node: pointer.target,
            parent,
            parent_occurrence,
            index,
            depth,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeContent;
    use crate::pointer::Pointer;

    /// E0 -> {R1 -> E3, R2 -> link E3}
    fn diamond() -> (DialogueGraph, PointerId) {
        let mut g = DialogueGraph::new();
        let (e0, _) = g
            .add_node(ParentRef::Root, None, NodeKind::Entry, NodeContent::text("start"))
            .unwrap();
        let (r1, _) = g
            .add_node(e0.into(), None, NodeKind::Reply, NodeContent::text("a"))
            .unwrap();
        let (r2, _) = g
            .add_node(e0.into(), None, NodeKind::Reply, NodeContent::text("b"))
            .unwrap();
        let (e3, _) = g
            .add_node(r1.into(), None, NodeKind::Entry, NodeContent::text("end"))
            .unwrap();
        let link = g.allocate_pointer_id().unwrap();
        g.insert_pointer(r2.into(), 0, Pointer::new(link, e3)).unwrap();
        (g, link)
    }

    #[test]
    fn preorder_with_link_leaf() {
        let (g, link) = diamond();
        let p = Projection::build(&g);
        let order: Vec<_> = p.occurrences().iter().map(|o| (o.node.0, o.depth, o.is_link)).collect();
        assert_eq!(order, vec![(0, 0, false), (1, 1, false), (3, 2, false), (2, 1, false), (3, 2, true)]);
        assert_eq!(p.len(), g.pointer_count());
        assert!(p.get(link).unwrap().is_link);
    }

    #[test]
    fn occurrence_location_resolves_its_pointer() {
        let (g, _) = diamond();
        let p = Projection::build(&g);
        for occ in p.occurrences() {
            let pointer = g.pointer_at(occ.location()).unwrap();
            assert_eq!((pointer.id, pointer.target), (occ.pointer, occ.node));
        }
    }

    #[test]
    fn canonical_is_first_discovered() {
        let (g, link) = diamond();
        let p = Projection::build(&g);
        let canonical = p.canonical(NodeId(3)).unwrap();
        assert!(!canonical.is_link);
        assert_ne!(canonical.pointer, link);
        assert_eq!(p.occurrences_of(NodeId(3)).count(), 2);
    }

    #[test]
    fn children_and_ancestors() {
        let (g, link) = diamond();
        let p = Projection::build(&g);
        let top = p.children(OccurrenceRef::Root);
        assert_eq!(top.len(), 1);
        assert_eq!(p.children(OccurrenceRef::Pointer(top[0].pointer)).len(), 2);
        assert!(p.children(OccurrenceRef::Pointer(link)).is_empty());
        let chain: Vec<_> = p.ancestors(link).iter().map(|o| o.node).collect();
        assert_eq!(chain, vec![NodeId(2), NodeId(0)]);
    }

    #[test]
    fn parent_ref_of_occurrence() {
        let (g, link) = diamond();
        let p = Projection::build(&g);
        assert_eq!(p.parent_ref(OccurrenceRef::Root), Some(ParentRef::Root));
        assert_eq!(p.parent_ref(link.into()), Some(ParentRef::Node(NodeId(3))));
        assert_eq!(p.parent_ref(PointerId(77).into()), None);
    }

    #[test]
    fn empty_graph_projects_nothing() {
        let p = Projection::build(&DialogueGraph::new());
        assert!(p.is_empty());
        assert!(p.children(OccurrenceRef::Root).is_empty());
    }
}
