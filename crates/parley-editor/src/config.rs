//! Editor configuration.
//!
//! Reads configuration from environment variables:
//! - `PARLEY_UNDO_LIMIT`: maximum undo depth (default: 100)
//! - `PARLEY_SYNC_SELECTION`: flowchart selection sync (default: true)
//! - `PARLEY_FLOWCHART_AUTO_REFRESH`: flowchart auto refresh (default: true)
//!
//! Invalid values are logged and the default is kept.

use serde::{Deserialize, Serialize};

pub const UNDO_LIMIT_VAR: &str = "PARLEY_UNDO_LIMIT";
pub const SYNC_SELECTION_VAR: &str = "PARLEY_SYNC_SELECTION";
pub const AUTO_REFRESH_VAR: &str = "PARLEY_FLOWCHART_AUTO_REFRESH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Oldest undo entries are dropped beyond this depth.
    pub undo_limit: usize,
    /// Whether the flowchart exchanges selection with the other views.
    pub sync_selection: bool,
    /// Whether the flowchart re-renders on structural change or only marks
    /// itself stale.
    pub flowchart_auto_refresh: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            undo_limit: 100,
            sync_selection: true,
            flowchart_auto_refresh: true,
        }
    }
}

impl EditorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = EditorConfig::default();
        if let Some(raw) = lookup(UNDO_LIMIT_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => config.undo_limit = limit,
                _ => tracing::warn!("ignoring invalid {}={:?}", UNDO_LIMIT_VAR, raw),
            }
        }
        if let Some(raw) = lookup(SYNC_SELECTION_VAR) {
            match parse_flag(&raw) {
                Some(flag) => config.sync_selection = flag,
                None => tracing::warn!("ignoring invalid {}={:?}", SYNC_SELECTION_VAR, raw),
            }
        }
        if let Some(raw) = lookup(AUTO_REFRESH_VAR) {
            match parse_flag(&raw) {
                Some(flag) => config.flowchart_auto_refresh = flag,
                None => tracing::warn!("ignoring invalid {}={:?}", AUTO_REFRESH_VAR, raw),
            }
        }
        config
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
