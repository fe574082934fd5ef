//! Projects a step failure into a structured, serializable shape so it can
//! live inside a `State`'s `__error` key instead of as a live exception
//! object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A step failure, serialized. `class` is the error's type name (or a
/// caller-supplied tag), `message` is its display text, `traceback` is
/// whatever backtrace/context chain `anyhow` captured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuredError {
    pub class: String,
    pub message: String,
    pub traceback: String,
}

impl StructuredError {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let traceback = err
            .chain()
            .skip(1)
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("\ncaused by: ");
        StructuredError {
            class: "anyhow::Error".to_string(),
            message: err.to_string(),
            traceback,
        }
    }
}

/// Inserts `err` into `state` under the conventional `__error` key,
/// returning the updated state. Leaves the rest of `state` untouched so a
/// failed step's prior progress is still visible in the log.
pub fn attach_error(mut state: Map<String, Value>, err: &anyhow::Error) -> Map<String, Value> {
    let structured = StructuredError::from_anyhow(err);
    state.insert(
        "__error".to_string(),
        serde_json::to_value(structured).expect("StructuredError always serializes"),
    );
    state
}
