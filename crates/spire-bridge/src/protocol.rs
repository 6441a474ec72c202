//! Wire protocol for Rust <-> game communication
//!
//! Inbound: one JSON object per line. A line only counts as a state report
//! when it carries an `available_commands` array; the game also emits
//! `{"error": ...}` lines for rejected commands, which are not snapshots.
//!
//! Outbound: one plain-text command per line (see [`spire_rl_core::Command`]).

use serde_json::Value;
use spire_rl_core::{Result, Snapshot, SpireError};
use tracing::debug;

/// Parse one inbound line; malformed JSON yields `None`
pub fn decode_line(line: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(line) {
        Ok(value) => Some(value),
        Err(e) => {
            let preview: String = line.chars().take(120).collect();
            debug!("Dropping malformed line ({}): {}", e, preview);
            None
        }
    }
}

/// Turn a parsed line into a snapshot, rejecting anything without a command list
pub fn decode_snapshot(value: Value) -> Result<Snapshot> {
    let has_commands = value
        .get("available_commands")
        .is_some_and(Value::is_array);
    if !has_commands {
        let reason = match value.get("error").and_then(Value::as_str) {
            Some(err) => format!("game reported error: {}", err),
            None => "missing available_commands".to_string(),
        };
        return Err(SpireError::ProtocolError(reason));
    }
    Ok(serde_json::from_value(value)?)
}
