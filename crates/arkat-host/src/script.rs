//! Replay scripts: tracking frames and host lifecycle signals, one JSON object per line
//!
//! ```text
//! {"type":"frame","events":[{"index":0,"state":"not_tracking"}]}
//! {"type":"frame","events":[{"index":0,"state":"full_tracking","center_pose":{"translation":[0,0,-0.4]}}]}
//! {"type":"background"}
//! {"type":"destroy"}
//! ```

use arkat_core::TrackingEvent;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Failed to read script: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid script entry on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEntry {
    /// Targets whose tracking status changed in one frame
    Frame {
        #[serde(default)]
        events: Vec<TrackingEvent>,
    },
    /// Host stopped being visible
    Background,
    /// Host is terminating
    Destroy,
}

/// Parse a script; blank lines and `#` comments are skipped
pub fn parse_script(content: &str) -> Result<Vec<ScriptEntry>, ScriptError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| ScriptError::Parse {
                line: i + 1,
                source,
            })
        })
        .collect()
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptEntry>, ScriptError> {
    let content = std::fs::read_to_string(path)?;
    parse_script(&content)
}
