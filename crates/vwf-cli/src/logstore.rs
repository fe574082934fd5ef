//! A JSON-file-backed reference implementation of the durable log contract:
//! an append-only audit trail per process, plus a small cursor file that
//! lets a process be reconstructed across restarts without trying to
//! serialize a `StepList` (which carries Rust closures and can't be).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use vwf_core::state::{keys, strip_control_keys};
use vwf_core::{DurableLogWriter, Process, State, Step, StepStatus};

/// Builds a log writer that appends one JSON object per step result to
/// `<state_dir>/<process_id>.log.jsonl`. The writer is the authority the
/// executor defers to (§6 of the durable log contract): it consumes the
/// three control directives a step may leave on its result state before
/// anything else sees it.
///
/// - `__step_name_override` logs the entry under a different name than the
///   step that actually ran (used by `step_group` so every sub-step shows
///   up under the group's identity).
/// - `__replace_last_state` rewrites the previous JSONL line instead of
///   appending a new one (used by `step_group` so a multi-sub-step group
///   reads as one log entry, not one per sub-step).
/// - `__remove_keys` deletes the named keys from the state that continues
///   forward (used by `callback_step`'s cleanup sub-step to drop a
///   one-time token once it's served its purpose).
///
/// Control keys are stripped from the *recorded* state so the file reads as
/// a history of the order's actual business data, not orchestration
/// bookkeeping; the state returned to the caller keeps whatever reserved
/// keys (`__sub_step`, `__step_group`, ...) the driver still needs to
/// resume correctly.
pub fn file_log_writer(state_dir: PathBuf) -> Arc<DurableLogWriter> {
    Arc::new(move |process_id: &str, workflow_name: &str, step: &Step, result: Process<State>| {
        let logged_name = result
            .state()
            .get(keys::STEP_NAME_OVERRIDE)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| step.name.clone());
        let replace_last = result
            .state()
            .get(keys::REPLACE_LAST_STATE)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let cleaned = result.map(apply_log_directives);

        if let Err(err) = append_entry(&state_dir, process_id, workflow_name, &logged_name, replace_last, &cleaned) {
            tracing::error!(process_id, %err, "failed to write durable log entry");
        }
        cleaned
    })
}

/// Consumes the log-writer-only control keys (`__step_name_override`,
/// `__replace_last_state`, `__remove_keys`) from the carried state, and
/// removes whatever additional keys `__remove_keys` named. Keys the driver
/// still needs to resume correctly (`__sub_step`, `__step_group`, ...) are
/// left alone.
fn apply_log_directives(mut state: State) -> State {
    state.remove(keys::STEP_NAME_OVERRIDE);
    state.remove(keys::REPLACE_LAST_STATE);
    if let Some(Value::Array(names)) = state.remove(keys::REMOVE_KEYS) {
        for name in names {
            if let Some(key) = name.as_str() {
                state.remove(key);
            }
        }
    }
    state
}

fn append_entry(
    state_dir: &Path,
    process_id: &str,
    workflow_name: &str,
    logged_name: &str,
    replace_last: bool,
    result: &Process<State>,
) -> Result<()> {
    fs::create_dir_all(state_dir).context("create state dir")?;
    let path = state_dir.join(format!("{process_id}.log.jsonl"));
    let entry = serde_json::json!({
        "workflow_name": workflow_name,
        "step": logged_name,
        "status": result.status().to_string(),
        "state": strip_control_keys(result.state()),
    });
    let line = serde_json::to_string(&entry)?;

    if replace_last && path.exists() {
        let existing = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let mut lines: Vec<&str> = existing.lines().collect();
        lines.pop();
        let mut rewritten = lines.join("\n");
        if !rewritten.is_empty() {
            rewritten.push('\n');
        }
        rewritten.push_str(&line);
        rewritten.push('\n');
        fs::write(&path, rewritten).with_context(|| format!("rewrite {}", path.display()))?;
    } else {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        writeln!(file, "{line}").context("append log entry")?;
    }
    Ok(())
}

/// The durable cursor for one process: enough to rebuild a `ProcessStat` by
/// re-running the workflow definition and dropping the steps already
/// consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedProcess {
    pub process_id: String,
    pub workflow_name: String,
    pub consumed_steps: usize,
    pub status: StepStatus,
    pub state: State,
}

impl PersistedProcess {
    fn path(state_dir: &Path, process_id: &str) -> PathBuf {
        state_dir.join(format!("{process_id}.cursor.json"))
    }

    pub fn load(state_dir: &Path, process_id: &str) -> Result<Self> {
        let path = Self::path(state_dir, process_id);
        let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
    }

    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir).context("create state dir")?;
        let path = Self::path(state_dir, &self.process_id);
        fs::write(&path, serde_json::to_vec_pretty(self)?)
            .with_context(|| format!("write {}", path.display()))
    }
}
