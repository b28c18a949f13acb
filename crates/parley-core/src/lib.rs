pub mod demo;
pub mod error;
pub mod fragment;
pub mod graph;
pub mod hash;
pub mod id;
pub mod node;
pub mod pointer;
pub mod traverse;
pub mod validate;

// Re-export commonly used types
pub use error::{CoreError, Invariant};
pub use fragment::Fragment;
pub use graph::{Detached, DialogueGraph, PointerLocation};
pub use id::{NodeId, ParentRef, PointerId};
pub use node::{DialogueNode, LocString, NodeContent, NodeKind, QuestRef, ScriptHook};
pub use pointer::{Pointer, PointerData};
pub use traverse::{Occurrence, OccurrenceRef, Projection};
