//! Editing scenarios driven through the public engine API.

use parley_core::demo::demo_dialogue;
use parley_core::hash::structure_fingerprint;
use parley_core::{CoreError, DialogueGraph, NodeContent, NodeId, NodeKind, OccurrenceRef, ParentRef, PointerId};
use parley_editor::{
    ChangeKind, DropPosition, EditEngine, EditError, EditorConfig, NewNodeKind, Notification, Outcome, Refusal,
};
use std::cell::RefCell;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn engine(graph: DialogueGraph) -> EditEngine {
    EditEngine::new(graph, EditorConfig::default()).unwrap()
}

fn refusal<T: std::fmt::Debug>(result: Result<Outcome<T>, EditError>) -> Refusal {
    match result {
        Err(EditError::Refused(r)) => r,
        other => panic!("expected a refusal, got {:?}", other),
    }
}

/// Root -> Entry "Hello".
fn hello() -> (DialogueGraph, NodeId, PointerId) {
    let mut g = DialogueGraph::new();
    let (hello, ptr) = g
        .add_node(ParentRef::Root, None, NodeKind::Entry, NodeContent::text("Hello"))
        .unwrap();
    (g, hello, ptr)
}

/// Records every structural notification the engine publishes.
fn record_structure(engine: &mut EditEngine) -> Rc<RefCell<Vec<ChangeKind>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let id = engine.register_view();
    engine.subscribe(id, move |n, _| {
        if let Notification::Structure { kind, .. } = n {
            sink.borrow_mut().push(*kind);
        }
    });
    seen
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn add_then_delete_restores_the_original() {
    let (g, _, hello_ptr) = hello();
    let original = structure_fingerprint(&g);
    let mut engine = engine(g);
    let seen = record_structure(&mut engine);

    let (reply, reply_ptr) = engine
        .add_node_with(hello_ptr.into(), NewNodeKind::Auto, NodeContent::text("Yes"))
        .unwrap()
        .applied()
        .unwrap();
    assert_eq!(engine.graph().node(reply).unwrap().kind, NodeKind::Reply);

    engine.delete_node(reply_ptr.into()).unwrap();
    assert_eq!(engine.fingerprint(), original);
    assert!(!engine.graph().contains(reply));
    assert_eq!(*seen.borrow(), vec![ChangeKind::NodeAdded, ChangeKind::NodeDeleted]);
}

#[test]
fn link_survives_deleting_the_original_occurrence() {
    let mut g = DialogueGraph::new();
    let (a, _) = g
        .add_node(ParentRef::Root, None, NodeKind::Entry, NodeContent::text("A"))
        .unwrap();
    let (b, b_ptr) = g
        .add_node(a.into(), None, NodeKind::Reply, NodeContent::text("B"))
        .unwrap();
    let (c, c_ptr) = g
        .add_node(ParentRef::Root, None, NodeKind::Entry, NodeContent::text("C"))
        .unwrap();
    let mut engine = engine(g);

    engine.copy_node(b_ptr.into()).unwrap();
    let link = engine.paste_as_link(c_ptr.into()).unwrap().applied().unwrap();
    assert_eq!(engine.graph().pointer(link).unwrap().target, b);
    assert!(engine.projection().get(link).unwrap().is_link);

    engine.delete_node(b_ptr.into()).unwrap();
    assert!(engine.graph().contains(b));
    let occ = engine.projection().get(link).unwrap();
    assert_eq!(occ.parent, ParentRef::Node(c));
    assert!(!occ.is_link);
}

#[test]
fn dragging_an_entry_into_its_own_descendant_is_a_cycle() {
    let mut g = DialogueGraph::new();
    let (a, a_ptr) = g
        .add_node(ParentRef::Root, None, NodeKind::Entry, NodeContent::text("A"))
        .unwrap();
    let (b, _) = g
        .add_node(a.into(), None, NodeKind::Reply, NodeContent::text("B"))
        .unwrap();
    let (_, c_ptr) = g
        .add_node(b.into(), None, NodeKind::Entry, NodeContent::text("C"))
        .unwrap();
    let engine = engine(g);

    let result = engine
        .drop_validator()
        .validate(a_ptr, OccurrenceRef::Pointer(c_ptr), DropPosition::Into);
    assert_eq!(result, Err(Refusal::WouldCreateCycle { node: a }));
}

#[test]
fn move_up_and_down_on_an_only_child_are_noops() {
    let (mut g, hello, _) = hello();
    let (_, only) = g
        .add_node(hello.into(), None, NodeKind::Reply, NodeContent::text("Only"))
        .unwrap();
    let mut engine = engine(g);

    let up = engine.move_node_up(only.into()).unwrap();
    let down = engine.move_node_down(only.into()).unwrap();
    assert_eq!(up.message(), Some("Node is already first"));
    assert_eq!(down.message(), Some("Node is already last"));
    assert!(!engine.can_undo());
}

// ---------------------------------------------------------------------------
// Clipboard
// ---------------------------------------------------------------------------

#[test]
fn duplicate_gets_disjoint_identities() {
    let mut engine = engine(demo_dialogue().unwrap());
    let source = engine.graph().descendants(NodeId(4));
    engine.copy_node(PointerId(4).into()).unwrap();

    let (copy, _) = engine
        .paste_as_duplicate(PointerId(2).into())
        .unwrap()
        .applied()
        .unwrap();
    let copied = engine.graph().descendants(copy);
    // The shared node 5 is copied too.
    assert_eq!(copied.len(), source.len());
    assert!(copied.iter().all(|n| !source.contains(n)));
    assert!(engine.graph().validate().is_ok());
}

#[test]
fn cut_then_link_is_refused_until_recovered() {
    let mut engine = engine(demo_dialogue().unwrap());
    engine.cut_node(PointerId(6).into()).unwrap();
    assert!(!engine.graph().contains(NodeId(6)));

    assert_eq!(refusal(engine.paste_as_link(PointerId(0).into())), Refusal::LinkAfterCut);

    let recovered = engine.recover_cut_as_copy().unwrap().applied().unwrap();
    assert_eq!(recovered, NodeId(6));
    assert!(engine.graph().contains(NodeId(6)));
    // The cut itself was undone, not just the clipboard relabelled.
    assert!(engine.can_redo());
    assert!(!engine.can_undo());
    let link = engine.paste_as_link(PointerId(0).into()).unwrap().applied().unwrap();
    assert_eq!(engine.graph().pointer(link).unwrap().target, NodeId(6));
}

#[test]
fn cut_can_still_be_pasted_as_duplicate() {
    let mut engine = engine(demo_dialogue().unwrap());
    engine.cut_node(PointerId(3).into()).unwrap();
    let (node, pointer) = engine
        .paste_as_duplicate(PointerId(0).into())
        .unwrap()
        .applied()
        .unwrap();
    assert_ne!(node, NodeId(3));
    assert_eq!(engine.graph().node(node).unwrap().text(), "[Leave]");
    assert_eq!(engine.selection().map(|s| s.occurrence), Some(pointer));
}

#[test]
fn recover_is_refused_once_another_edit_follows() {
    let mut engine = engine(demo_dialogue().unwrap());
    engine.cut_node(PointerId(3).into()).unwrap();
    engine.set_text(PointerId(0), "Halt!").unwrap();
    assert_eq!(refusal(engine.recover_cut_as_copy()), Refusal::CutNotRecoverable);
}

#[test]
fn link_under_own_descendant_is_a_cycle() {
    let mut engine = engine(demo_dialogue().unwrap());
    engine.copy_node(PointerId(1).into()).unwrap();
    // Node 5 is reached from node 1 through "Not interested."
    let result = engine.paste_as_link(PointerId(9).into());
    assert_eq!(refusal(result), Refusal::WouldCreateCycle { node: NodeId(1) });
    let result = engine.paste_as_link(PointerId(7).into());
    assert_eq!(refusal(result), Refusal::WouldCreateCycle { node: NodeId(1) });
}

#[test]
fn paste_under_a_link_is_refused() {
    let mut engine = engine(demo_dialogue().unwrap());
    engine.copy_node(PointerId(3).into()).unwrap();
    assert_eq!(refusal(engine.paste_as_duplicate(PointerId(5).into())), Refusal::LinkParent);
    assert_eq!(refusal(engine.paste_as_link(PointerId(5).into())), Refusal::LinkParent);
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

#[test]
fn deleting_last_pointer_collects_the_subtree() {
    let mut engine = engine(demo_dialogue().unwrap());
    engine.delete_node(PointerId(6).into()).unwrap();
    assert!(!engine.graph().contains(NodeId(6)));
    assert!(!engine.graph().contains(NodeId(7)));
}

#[test]
fn deleting_one_of_two_pointers_keeps_the_shared_node() {
    let mut engine = engine(demo_dialogue().unwrap());
    engine.delete_node(PointerId(9).into()).unwrap();
    assert!(engine.graph().contains(NodeId(5)));
    // The former link is now the only and therefore canonical occurrence.
    assert!(!engine.projection().get(PointerId(5)).unwrap().is_link);
}

// ---------------------------------------------------------------------------
// Undo / redo
// ---------------------------------------------------------------------------

#[test]
fn every_kind_of_edit_round_trips() {
    type Edit = fn(&mut EditEngine);
    let edits: Vec<(&str, Edit)> = vec![
        ("add", |e| {
            e.add_node(PointerId(4).into(), NewNodeKind::Auto).unwrap();
        }),
        ("delete", |e| {
            e.delete_node(PointerId(1).into()).unwrap();
        }),
        ("move", |e| {
            e.move_node(PointerId(3), ParentRef::Node(NodeId(0)), 0).unwrap();
        }),
        ("move down", |e| {
            e.move_node_down(PointerId(6).into()).unwrap();
        }),
        ("cut", |e| {
            e.cut_node(PointerId(8).into()).unwrap();
        }),
        ("text", |e| {
            e.set_text(PointerId(0), "Halt!").unwrap();
        }),
        ("speaker", |e| {
            e.set_speaker(PointerId(9), "").unwrap();
        }),
        ("link comment", |e| {
            e.update_pointer(PointerId(5), "Edit Comment", |d| d.comment = "via link".into())
                .unwrap();
        }),
    ];

    for (name, edit) in edits {
        let mut engine = engine(demo_dialogue().unwrap());
        let before = engine.fingerprint();
        edit(&mut engine);
        let after = engine.fingerprint();
        assert_ne!(before, after, "{name} changed nothing");

        assert!(engine.undo().unwrap().is_applied());
        assert_eq!(engine.fingerprint(), before, "{name} undo");
        assert!(engine.redo().unwrap().is_applied());
        assert_eq!(engine.fingerprint(), after, "{name} redo");
    }
}

#[test]
fn new_edit_clears_redo() {
    let mut engine = engine(demo_dialogue().unwrap());
    engine.set_text(PointerId(0), "One").unwrap();
    engine.undo().unwrap();
    assert!(engine.can_redo());
    engine.set_text(PointerId(0), "Two").unwrap();
    assert!(!engine.can_redo());
    assert_eq!(engine.redo().unwrap().message(), Some("Nothing to redo"));
}

#[test]
fn history_lists_descriptions_newest_first() {
    let mut engine = engine(demo_dialogue().unwrap());
    engine.add_node(PointerId(4).into(), NewNodeKind::Auto).unwrap();
    engine.set_text(PointerId(0), "Halt!").unwrap();
    engine.delete_node(PointerId(3).into()).unwrap();
    engine.undo().unwrap();

    let entries: Vec<_> = engine
        .history_entries()
        .into_iter()
        .map(|e| (e.description, e.undone))
        .collect();
    assert_eq!(
        entries,
        vec![
            ("Delete Node".to_string(), true),
            ("Edit Text".to_string(), false),
            ("Add Reply".to_string(), false),
        ]
    );
}

#[test]
fn refused_edits_record_nothing() {
    let mut engine = engine(demo_dialogue().unwrap());
    let before = engine.fingerprint();
    let _ = engine.add_node(PointerId(5).into(), NewNodeKind::Auto);
    let _ = engine.add_node(OccurrenceRef::Root, NewNodeKind::Exactly(NodeKind::Reply));
    let _ = engine.move_node(PointerId(5), ParentRef::Node(NodeId(3)), 0);
    let _ = engine.set_text(PointerId(5), "through a link");
    assert_eq!(engine.delete_node(OccurrenceRef::Root).unwrap().message(), Some("The root cannot be deleted"));
    assert_eq!(engine.fingerprint(), before);
    assert!(!engine.can_undo());
}

#[test]
fn undo_limit_drops_oldest() {
    let config = EditorConfig {
        undo_limit: 2,
        ..EditorConfig::default()
    };
    let mut engine = EditEngine::new(demo_dialogue().unwrap(), config).unwrap();
    for text in ["a", "b", "c"] {
        engine.set_text(PointerId(0), text).unwrap();
    }
    assert_eq!(engine.history().undo_len(), 2);
    engine.undo().unwrap();
    engine.undo().unwrap();
    assert_eq!(engine.graph().node(NodeId(0)).unwrap().text(), "a");
}

/// The demo with its first root pointer renumbered to the last `u32`.
fn demo_with_max_pointer_id() -> DialogueGraph {
    let mut value = serde_json::to_value(demo_dialogue().unwrap()).unwrap();
    value["root"][0]["id"] = u32::MAX.into();
    serde_json::from_value(value).unwrap()
}

#[test]
fn snapshot_with_exhausted_ids_is_refused_on_load() {
    let err = EditEngine::new(demo_with_max_pointer_id(), EditorConfig::default()).unwrap_err();
    assert_eq!(err, CoreError::IdSpaceExhausted { space: "pointer" });

    let (graph, _, _) = hello();
    let mut engine = engine(graph);
    let before = engine.fingerprint();
    assert_eq!(
        engine.load(demo_with_max_pointer_id()).unwrap_err(),
        EditError::Refused(Refusal::InvalidGraph(CoreError::IdSpaceExhausted { space: "pointer" }))
    );
    assert_eq!(engine.fingerprint(), before);
}
