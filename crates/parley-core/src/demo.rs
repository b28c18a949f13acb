//! A small sample conversation.
//!
//! A guard greets the player and offers a quest; one reply links back to an
//! existing entry. Used by the CLI `demo` command and throughout the tests.

use crate::error::CoreError;
use crate::graph::DialogueGraph;
use crate::id::{NodeId, ParentRef, PointerId};
use crate::node::{NodeContent, NodeKind, ScriptHook};
use crate::pointer::{Pointer, PointerData};

/// Builds the demo dialogue:
///
/// ```text
/// E "Hello, traveler!" [Guard]
///   R "Greetings."
///     E "I have a quest for you."
///       R "Tell me more."            (appears when gc_check_skill)
///         E "There's a cave nearby..." [Merchant]
///       R "Not interested."
///         E "No need to be rude!"
///   R "What do you want?"
///     E "No need to be rude!"        (link)
///   R "[Leave]"
/// ```
pub fn demo_dialogue() -> Result<DialogueGraph, CoreError> {
    let mut g = DialogueGraph::new();

    let (hello, _) = g.add_node(
        ParentRef::Root,
        None,
        NodeKind::Entry,
        NodeContent::text("Hello, traveler!").spoken_by("Guard"),
    )?;
    let (greetings, _) = reply(&mut g, hello, NodeContent::text("Greetings."))?;
    let (what, _) = reply(&mut g, hello, NodeContent::text("What do you want?"))?;
    reply(
        &mut g,
        hello,
        NodeContent::text("[Leave]").with_action(ScriptHook::new("nw_walk_wp")),
    )?;

    let (quest, _) = entry(
        &mut g,
        greetings,
        NodeContent::text("I have a quest for you.")
            .spoken_by("Guard")
            .with_action(ScriptHook::new("sc_start_quest").with_param("quest", "cave")),
    )?;
    let (rude, _) = entry(
        &mut g,
        what,
        NodeContent::text("No need to be rude!").spoken_by("Guard"),
    )?;

    let (more, more_ptr) = reply(&mut g, quest, NodeContent::text("Tell me more."))?;
    g.replace_pointer_data(
        more_ptr,
        PointerData::with_condition(ScriptHook::new("gc_check_skill").with_param("skill", "lore")),
    )?;
    entry(
        &mut g,
        more,
        NodeContent::text("There's a cave nearby...").spoken_by("Merchant"),
    )?;

    let (not_interested, _) = reply(&mut g, quest, NodeContent::text("Not interested."))?;
    let link = g.allocate_pointer_id()?;
    g.insert_pointer(not_interested.into(), 0, Pointer::new(link, rude))?;

    Ok(g)
}

fn reply(
    g: &mut DialogueGraph,
    parent: NodeId,
    content: NodeContent,
) -> Result<(NodeId, PointerId), CoreError> {
    g.add_node(parent.into(), None, NodeKind::Reply, content)
}

fn entry(
    g: &mut DialogueGraph,
    parent: NodeId,
    content: NodeContent,
) -> Result<(NodeId, PointerId), CoreError> {
    g.add_node(parent.into(), None, NodeKind::Entry, content)
}
