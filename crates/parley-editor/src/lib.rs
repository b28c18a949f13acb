//! Editing core for branching dialogue files.
//!
//! [`EditEngine`] owns the dialogue graph and is the only thing that mutates
//! it. Every edit is checked against the graph rules first, recorded for
//! undo, and announced on the engine's [`ChangeBus`]. The views in [`sync`]
//! (outline, flowchart, simulator) follow those notifications and route
//! user selections back through the engine.

pub mod bus;
pub mod clipboard;
pub mod command;
pub mod config;
pub mod dragdrop;
pub mod engine;
pub mod error;
pub mod history;
pub mod selection;
pub mod services;
pub mod sync;

// Re-export commonly used types
pub use bus::{ChangeBus, ChangeKind, ChangeToken, DispatchContext, Notification, Origin, SelectionRequest, ViewId};
pub use clipboard::{ClipboardEntry, ClipboardMode};
pub use command::EditCommand;
pub use config::EditorConfig;
pub use dragdrop::{classify_drop, DragSession, DropFeedback, DropPosition, DropValidator, ResolvedDrop};
pub use engine::{EditEngine, NewNodeKind};
pub use error::{EditError, EditResult, IoOperation, Outcome, Refusal};
pub use history::{History, HistoryEntry};
pub use selection::{Selection, SelectionState};
pub use services::{
    JournalSource, QuestInfo, QuestStatus, ScriptMetadataSource, ScriptParameters, ServiceError, StaticJournal,
    StaticScripts,
};
