//! Dialogue node types.
//!
//! A [`DialogueNode`] is one conversation line: an NPC [`NodeKind::Entry`] or
//! a player [`NodeKind::Reply`]. Its editable payload lives in
//! [`NodeContent`]; its children are reached only through the ordered list of
//! outgoing [`Pointer`]s, which the graph owns and mutates.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::NodeId;
use crate::pointer::Pointer;

/// Who speaks a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// NPC speech.
    Entry,
    /// Player speech.
    Reply,
}

impl NodeKind {
    /// The kind every child of a node of this kind must have.
    pub fn child_kind(self) -> NodeKind {
        match self {
            NodeKind::Entry => NodeKind::Reply,
            NodeKind::Reply => NodeKind::Entry,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Entry => f.write_str("Entry"),
            NodeKind::Reply => f.write_str("Reply"),
        }
    }
}

/// A localizable string: language id -> text.
///
/// Language `0` is the default language shown by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocString {
    strings: BTreeMap<u32, String>,
}

impl LocString {
    pub const DEFAULT_LANGUAGE: u32 = 0;

    /// Creates a string with only the default language set.
    pub fn new(text: impl Into<String>) -> Self {
        let mut strings = BTreeMap::new();
        strings.insert(Self::DEFAULT_LANGUAGE, text.into());
        LocString { strings }
    }

    /// Text in the default language, falling back to the lowest language id
    /// present, or `""` when empty.
    pub fn text(&self) -> &str {
        self.strings
            .get(&Self::DEFAULT_LANGUAGE)
            .or_else(|| self.strings.values().next())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn get(&self, language: u32) -> Option<&str> {
        self.strings.get(&language).map(String::as_str)
    }

    /// Sets the text for one language. An empty string removes the entry.
    pub fn set(&mut self, language: u32, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            self.strings.remove(&language);
        } else {
            self.strings.insert(language, text);
        }
    }

    pub fn languages(&self) -> impl Iterator<Item = u32> + '_ {
        self.strings.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// A script reference with ordered parameters.
///
/// An empty `script` means "no script".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptHook {
    pub script: String,
    #[serde(default)]
    pub params: IndexMap<String, String>,
}

impl ScriptHook {
    pub fn new(script: impl Into<String>) -> Self {
        ScriptHook {
            script: script.into(),
            params: IndexMap::new(),
        }
    }

    /// Builder: adds (or replaces) a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn is_set(&self) -> bool {
        !self.script.is_empty()
    }
}

/// Journal quest reference attached to a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestRef {
    pub tag: String,
    pub entry: Option<u32>,
}

/// The editable payload of a dialogue node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeContent {
    pub text: LocString,
    /// Speaker tag. Only meaningful on entries; replies are always spoken by
    /// the player.
    pub speaker: Option<String>,
    /// Appears-when script evaluated on the node itself.
    pub condition: ScriptHook,
    /// Script run when the line is spoken.
    pub action: ScriptHook,
    pub sound: String,
    pub animation: String,
    pub quest: Option<QuestRef>,
    pub comment: String,
    /// Delay before the line is spoken, in milliseconds.
    pub delay: Option<u32>,
}

impl NodeContent {
    /// Content with default-language text and nothing else.
    pub fn text(text: impl Into<String>) -> Self {
        NodeContent {
            text: LocString::new(text),
            ..NodeContent::default()
        }
    }

    /// Builder: sets the speaker tag.
    pub fn spoken_by(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    /// Builder: sets the action script.
    pub fn with_action(mut self, action: ScriptHook) -> Self {
        self.action = action;
        self
    }

    /// Builder: sets the node condition script.
    pub fn with_condition(mut self, condition: ScriptHook) -> Self {
        self.condition = condition;
        self
    }
}

/// One conversation line in the dialogue graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub content: NodeContent,
    /// Ordered outgoing pointers. Mutated only through graph primitives.
    #[serde(default)]
    pub(crate) pointers: Vec<Pointer>,
}

impl DialogueNode {
    /// Creates a childless node.
    pub fn new(id: NodeId, kind: NodeKind, content: NodeContent) -> Self {
        DialogueNode {
            id,
            kind,
            content,
            pointers: Vec::new(),
        }
    }

    /// Creates a node with the given outgoing pointers, e.g. when
    /// reconstructing a graph from stored parts.
    pub fn with_pointers(id: NodeId, kind: NodeKind, content: NodeContent, pointers: Vec<Pointer>) -> Self {
        DialogueNode {
            id,
            kind,
            content,
            pointers,
        }
    }

    pub fn pointers(&self) -> &[Pointer] {
        &self.pointers
    }

    pub fn text(&self) -> &str {
        self.content.text.text()
    }

    pub fn is_leaf(&self) -> bool {
        self.pointers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_kind_alternates() {
        assert_eq!(NodeKind::Entry.child_kind(), NodeKind::Reply);
        assert_eq!(NodeKind::Reply.child_kind(), NodeKind::Entry);
    }

    #[test]
    fn loc_string_default_language() {
        let mut s = LocString::new("Hello");
        assert_eq!(s.text(), "Hello");
        s.set(2, "Bonjour");
        assert_eq!(s.get(2), Some("Bonjour"));
        assert_eq!(s.languages().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn loc_string_falls_back_to_first_language() {
        let mut s = LocString::default();
        assert_eq!(s.text(), "");
        s.set(3, "Hallo");
        assert_eq!(s.text(), "Hallo");
        s.set(3, "");
        assert!(s.is_empty());
    }

    #[test]
    fn script_hook_builder_keeps_parameter_order() {
        let hook = ScriptHook::new("gc_check")
            .with_param("b", "2")
            .with_param("a", "1");
        assert!(hook.is_set());
        let keys: Vec<_> = hook.params.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert!(!ScriptHook::default().is_set());
    }

    #[test]
    fn content_builders() {
        let content = NodeContent::text("Halt!")
            .spoken_by("Guard")
            .with_action(ScriptHook::new("sc_alarm"));
        assert_eq!(content.text.text(), "Halt!");
        assert_eq!(content.speaker.as_deref(), Some("Guard"));
        assert_eq!(content.action.script, "sc_alarm");
    }

    #[test]
    fn content_deserializes_with_missing_fields() {
        let content: NodeContent = serde_json::from_str(r#"{"comment":"todo"}"#).unwrap();
        assert_eq!(content.comment, "todo");
        assert!(content.text.is_empty());
        assert_eq!(content.delay, None);
    }
}
