//! The workflow state: an ordered JSON object threaded through every step.

use serde_json::{Map, Value};

/// Ordered mapping from string keys to arbitrary JSON values. `serde_json`'s
/// `preserve_order` feature keeps insertion order, which matters for the log
/// writer's diffing of `__remove_keys`/`__replace_last_state` against prior
/// entries.
pub type State = Map<String, Value>;

/// Reserved keys a step may set to steer how the driver records its result.
/// A step that sets any of these is expected to leave them out of the
/// user-visible log (the log writer's job, not the executor's).
pub mod keys {
    /// The default key a callback step's public callback URL is published
    /// under. User-visible by design (it is handed to an external system),
    /// so it is deliberately not part of `ALL`/`strip_control_keys`.
    pub const CALLBACK_ROUTE: &str = "callback_route";

    pub const REPLACE_LAST_STATE: &str = "__replace_last_state";
    pub const REMOVE_KEYS: &str = "__remove_keys";
    pub const STEP_NAME_OVERRIDE: &str = "__step_name_override";
    pub const SUB_STEP: &str = "__sub_step";
    pub const STEP_GROUP: &str = "__step_group";
    pub const LAST_STEP_STARTED_AT: &str = "__last_step_started_at";
    pub const CALLBACK_TOKEN: &str = "__callback_token";
    pub const CALLBACK_RESULT_KEY: &str = "__callback_result_key";
    pub const ERROR: &str = "__error";

    /// All reserved keys, for callers that want to strip control state
    /// before presenting a log entry to a user.
    pub const ALL: &[&str] = &[
        REPLACE_LAST_STATE,
        REMOVE_KEYS,
        STEP_NAME_OVERRIDE,
        SUB_STEP,
        STEP_GROUP,
        LAST_STEP_STARTED_AT,
        CALLBACK_TOKEN,
        CALLBACK_RESULT_KEY,
        ERROR,
    ];
}

/// Returns a copy of `state` with every reserved control key removed.
pub fn strip_control_keys(state: &State) -> State {
    let mut out = state.clone();
    for k in keys::ALL {
        out.remove(*k);
    }
    out
}

/// Merges `patch` into `base`, overwriting any overlapping keys. Used by
/// `step_lens`/`focus` to fold a substate's result back into the outer state.
pub fn merge(base: &State, patch: &State) -> State {
    let mut out = base.clone();
    for (k, v) in patch {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// Projects `state` down to the subset of keys named in `fields`, each
/// defaulting to `Value::Null` when absent. Used by `step_lens`/`focus` to
/// build the substate a lensed step actually sees.
pub fn project(state: &State, fields: &[&str]) -> State {
    let mut out = State::new();
    for f in fields {
        out.insert((*f).to_string(), state.get(*f).cloned().unwrap_or(Value::Null));
    }
    out
}
