//! Operators for building bigger steps out of smaller ones: gating a step on
//! a predicate, running it against a projected substate, grouping several
//! steps into one rewindable unit, and suspending a step on an external
//! callback.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::process::Process;
use crate::state::{self, keys, State};
use crate::step::{step, now_unix_timestamp, Step, StepList};

type StepFn = Arc<dyn Fn(State) -> Process<State> + Send + Sync>;

/// Runs `inner` only when `predicate(&state)` is true; otherwise reports
/// `Skipped` without touching the state. Keeps `inner`'s name and auth
/// metadata so a skipped step still shows up under its original identity
/// in logs and authorization checks.
pub fn conditional(
    predicate: impl Fn(&State) -> bool + Send + Sync + 'static,
    inner: Step,
) -> Step {
    let name = inner.name.clone();
    let form = inner.form.clone();
    let assignee = inner.assignee.clone();
    let resume_auth = inner.resume_auth.clone();
    let retry_auth = inner.retry_auth.clone();
    let func: StepFn = Arc::new(move |state: State| {
        if predicate(&state) {
            inner.call(state)
        } else {
            Process::Skipped(state)
        }
    });
    Step {
        name,
        form,
        assignee,
        resume_auth,
        retry_auth,
        func,
    }
}

/// A general lens: runs `inner` against a state computed from the outer
/// state by `get`, then folds the result back into the outer state with
/// `set`. `Failed`/`Waiting` results are passed through unprojected so a
/// failure keeps showing the substate it actually failed on.
pub fn step_lens(
    name: impl Into<String>,
    get: impl Fn(&State) -> State + Send + Sync + 'static,
    set: impl Fn(&State, State) -> State + Send + Sync + 'static,
    inner: Step,
) -> Step {
    let form = inner.form.clone();
    let assignee = inner.assignee.clone();
    let resume_auth = inner.resume_auth.clone();
    let retry_auth = inner.retry_auth.clone();
    let func: StepFn = Arc::new(move |outer: State| {
        let projected = get(&outer);
        let result = inner.call(projected);
        match result {
            Process::Failed(s) => Process::Failed(s),
            Process::Waiting(s) => Process::Waiting(s),
            other => {
                let status = other.status();
                let merged = set(&outer, other.unwrap());
                status.wrap(merged)
            }
        }
    });
    Step {
        name: name.into(),
        form,
        assignee,
        resume_auth,
        retry_auth,
        func,
    }
}

/// Convenience over `step_lens` that projects onto a fixed list of fields
/// and merges the result back by simple key overwrite.
pub fn focus(name: impl Into<String>, fields: Vec<String>, inner: Step) -> Step {
    let get_fields = fields.clone();
    step_lens(
        name,
        move |outer: &State| {
            let refs: Vec<&str> = get_fields.iter().map(String::as_str).collect();
            state::project(outer, &refs)
        },
        |outer: &State, inner_result: State| state::merge(outer, &inner_result),
        inner,
    )
}

/// Wraps `steps` with the Enter/Exit bookends `step_group` needs: Enter
/// writes `__step_name_override`/`__step_group` so every sub-step logs
/// under the group's identity; Exit removes those markers plus `__sub_step`
/// once the group is done.
fn extend_step_group_steps(name: &str, steps: StepList) -> StepList {
    let group_name = name.to_string();
    let enter_name = group_name.clone();
    let enter = step(format!("{name} - Enter"), move |mut st: State| {
        st.insert(
            keys::STEP_NAME_OVERRIDE.to_string(),
            Value::String(enter_name.clone()),
        );
        st.insert(keys::STEP_GROUP.to_string(), Value::String(enter_name.clone()));
        Ok(st)
    });
    let exit = step(format!("{name} - Exit"), |mut st: State| {
        st.insert(
            keys::REMOVE_KEYS.to_string(),
            json!([keys::STEP_GROUP, keys::SUB_STEP]),
        );
        Ok(st)
    });
    StepList::of(enter) + steps + exit
}

/// Drops every step up to and including the one named `sub_step`, leaving
/// only the steps that still need to run. Used to re-enter a group
/// mid-way through on resume instead of restarting it from the top.
fn steps_after(extended: &[Step], sub_step: &str) -> Vec<Step> {
    let mut matched = false;
    extended
        .iter()
        .filter(|s| {
            if matched {
                true
            } else if s.name == sub_step {
                matched = true;
                false
            } else {
                false
            }
        })
        .cloned()
        .collect()
}

/// Runs `steps` in sequence as a single outwardly visible step, while
/// keeping each inner step independently persistable. See `step_group` for
/// the common case where the group's form should be inferred automatically.
pub fn step_group_with_form(
    name: impl Into<String>,
    steps: StepList,
    extract_form: bool,
) -> Step {
    let name = name.into();
    let form = if extract_form {
        steps.iter().find_map(|s| s.form.clone())
    } else {
        None
    };
    let extended: Vec<Step> = extend_step_group_steps(&name, steps).into_vec();
    let group_name = name.clone();
    let func: StepFn = Arc::new(move |initial_state: State| {
        let resume_marker = initial_state
            .get(keys::SUB_STEP)
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let is_resume = resume_marker.is_some();
        let step_list: Vec<Step> = match &resume_marker {
            Some(marker) => steps_after(&extended, marker),
            None => extended.clone(),
        };
        let first_name = step_list.first().map(|s| s.name.clone());
        let group_name = group_name.clone();

        let dblogstep = move |sub_step: &Step, result: Process<State>| -> Process<State> {
            let tagged = result.map(|mut s| {
                s.insert(keys::SUB_STEP.to_string(), Value::String(sub_step.name.clone()));
                s.insert(
                    keys::STEP_NAME_OVERRIDE.to_string(),
                    Value::String(group_name.clone()),
                );
                s
            });
            let not_first = first_name.as_deref() != Some(sub_step.name.as_str());
            let tagged = if is_resume || not_first {
                tagged.map(|mut s| {
                    s.insert(keys::REPLACE_LAST_STATE.to_string(), Value::Bool(true));
                    s
                })
            } else {
                tagged
            };
            crate::scope::notify(sub_step, tagged)
        };

        let start = now_unix_timestamp();
        let (result, _remaining) = crate::executor::exec_steps(
            step_list.into_iter().collect(),
            Process::Success(initial_state),
            &dblogstep,
        );
        result.map(|mut s| {
            s.insert(keys::REPLACE_LAST_STATE.to_string(), Value::Bool(true));
            s.insert(keys::LAST_STEP_STARTED_AT.to_string(), json!(start));
            s
        })
    });
    Step {
        name,
        form,
        assignee: None,
        resume_auth: None,
        retry_auth: None,
        func,
    }
}

/// `step_group` with form inference turned on, the common case.
pub fn step_group(name: impl Into<String>, steps: StepList) -> Step {
    step_group_with_form(name, steps, true)
}

/// The first sub-step of a callback group: mints a fresh callback token and
/// publishes the public URL an external system should call back, under
/// `route_key` (`state["process_id"]` supplies the process identity the
/// route is scoped to).
fn create_endpoint_step(name: String, route_key: String) -> Step {
    step(name, move |mut st: State| {
        let process_id = st
            .get("process_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("callback_step requires a \"process_id\" state key"))?
            .to_string();
        let token = vwf_runtime::callback::generate_token();
        let route = vwf_runtime::callback::callback_route(&process_id, &token);
        st.insert(route_key.clone(), Value::String(route));
        st.insert(keys::CALLBACK_TOKEN.to_string(), Value::String(token));
        Ok(st)
    })
}

/// The third sub-step of a callback group: suspends unconditionally,
/// optionally tagging where the eventual callback payload should land.
fn await_callback_step(name: String, result_key: Option<String>) -> Step {
    let func: StepFn = Arc::new(move |mut st: State| {
        if let Some(key) = &result_key {
            st.insert(keys::CALLBACK_RESULT_KEY.to_string(), Value::String(key.clone()));
        }
        Process::AwaitingCallback(st)
    });
    Step {
        name,
        form: None,
        assignee: None,
        resume_auth: None,
        retry_auth: None,
        func,
    }
}

/// The last sub-step of a callback group: the token has done its job, so
/// it's dropped from the user-visible state via `__remove_keys`.
fn cleanup_callback_step(name: String) -> Step {
    step(name, |mut st: State| {
        st.insert(keys::REMOVE_KEYS.to_string(), json!([keys::CALLBACK_TOKEN]));
        Ok(st)
    })
}

/// Synthesizes a `step_group` of five sub-steps that together implement
/// suspending for an external callback: create a one-time endpoint, fire
/// `action` against it, await the callback, run `validate` against the
/// posted payload, then clean up the token. `route_key` defaults to
/// `"callback_route"`.
pub fn callback_step(
    name: impl Into<String>,
    action: Step,
    validate: Step,
    result_key: Option<String>,
    route_key: Option<String>,
) -> Step {
    let name = name.into();
    let route_key = route_key.unwrap_or_else(|| keys::CALLBACK_ROUTE.to_string());
    let create_endpoint = create_endpoint_step(format!("{name} - Create endpoint"), route_key);
    let await_callback = await_callback_step(format!("{name} - Await callback"), result_key);
    let cleanup = cleanup_callback_step(format!("{name} - Cleanup callback step"));
    let steps = StepList::of(create_endpoint) + action + await_callback + validate + cleanup;
    step_group(name, steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepList;
    use serde_json::json;

    fn obj(v: serde_json::Value) -> State {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn conditional_skips_when_predicate_false() {
        let inner = step("double", |mut st: State| {
            let n = st["n"].as_i64().unwrap();
            st.insert("n".into(), json!(n * 2));
            Ok(st)
        });
        let guarded = conditional(|st: &State| st["enabled"].as_bool().unwrap_or(false), inner);
        let result = guarded.call(obj(json!({"n": 3, "enabled": false})));
        assert_eq!(result, Process::Skipped(obj(json!({"n": 3, "enabled": false}))));
    }

    #[test]
    fn conditional_runs_when_predicate_true() {
        let inner = step("double", |mut st: State| {
            let n = st["n"].as_i64().unwrap();
            st.insert("n".into(), json!(n * 2));
            Ok(st)
        });
        let guarded = conditional(|st: &State| st["enabled"].as_bool().unwrap_or(false), inner);
        let result = guarded.call(obj(json!({"n": 3, "enabled": true})));
        assert_eq!(result, Process::Success(obj(json!({"n": 6, "enabled": true}))));
    }

    #[test]
    fn focus_merges_projected_result_back_into_outer_state() {
        let inner = step("rename", |mut st: State| {
            let name = st["name"].as_str().unwrap().to_uppercase();
            st.insert("name".into(), json!(name));
            Ok(st)
        });
        let lensed = focus("rename_lens", vec!["name".to_string()], inner);
        let result = lensed.call(obj(json!({"name": "ada", "unrelated": 1})));
        assert_eq!(result, Process::Success(obj(json!({"name": "ADA", "unrelated": 1}))));
    }

    #[test]
    fn focus_leaves_failed_substate_unprojected() {
        let inner = step("boom", |_: State| anyhow::bail!("nope"));
        let lensed = focus("boom_lens", vec!["name".to_string()], inner);
        let result = lensed.call(obj(json!({"name": "ada", "unrelated": 1})));
        assert!(result.is_failed());
        let state = result.unwrap();
        assert!(state.get("unrelated").is_none());
    }

    #[test]
    fn step_group_runs_sub_steps_in_order() {
        let a = step("a", |mut st: State| {
            st.insert("log".into(), json!(vec!["a"]));
            Ok(st)
        });
        let b = step("b", |mut st: State| {
            let mut log: Vec<String> = serde_json::from_value(st["log"].clone()).unwrap();
            log.push("b".to_string());
            st.insert("log".into(), json!(log));
            Ok(st)
        });
        let group = step_group("ab", StepList::of(a) + b);
        let result = group.call(obj(json!({})));
        assert!(result.is_success());
        let state = result.unwrap();
        assert_eq!(state["log"], json!(["a", "b"]));
        assert_eq!(state[keys::REPLACE_LAST_STATE], json!(true));
        assert!(state.contains_key(keys::LAST_STEP_STARTED_AT));
        assert!(!state.contains_key(keys::STEP_GROUP));
        assert!(!state.contains_key(keys::SUB_STEP));
    }

    #[test]
    fn step_group_tags_a_halted_sub_step_with_group_identity() {
        let a = step("a", |mut st: State| {
            st.insert("a_ran".into(), json!(true));
            Ok(st)
        });
        let b = step("b", |_: State| anyhow::bail!("boom"));
        let group = step_group("ab", StepList::of(a) + b);
        let result = group.call(obj(json!({"seed": 1})));
        assert!(result.is_failed());
        let state = result.unwrap();
        assert_eq!(state[keys::SUB_STEP], json!("b"));
        assert_eq!(state[keys::STEP_NAME_OVERRIDE], json!("ab"));
        assert_eq!(state[keys::REPLACE_LAST_STATE], json!(true));
    }

    #[test]
    fn step_group_truncates_to_steps_after_the_resumed_sub_step_on_resume() {
        let ran = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let make = |name: &'static str| {
            let ran = ran.clone();
            step(name, move |st: State| {
                ran.lock().unwrap().push(name.to_string());
                Ok(st)
            })
        };
        let group = step_group(
            "abcd",
            StepList::of(make("a")) + make("b") + make("c") + make("d"),
        );
        let mut resumed_state = obj(json!({}));
        resumed_state.insert(keys::SUB_STEP.to_string(), json!("b"));
        let result = group.call(resumed_state);
        assert!(result.is_success());
        assert_eq!(ran.lock().unwrap().as_slice(), &["c".to_string(), "d".to_string()]);
    }

    #[test]
    fn step_group_extracts_the_first_sub_step_form() {
        let a = step("a", |st: State| Ok(st));
        let b = crate::step::input_step("b", "b_form", "answer", |st: State| Ok(st));
        let group = step_group("ab", StepList::of(a) + b);
        assert_eq!(group.form.as_deref(), Some("b_form"));
    }

    #[test]
    fn step_group_without_extract_form_has_no_form() {
        let b = crate::step::input_step("b", "b_form", "answer", |st: State| Ok(st));
        let group = step_group_with_form("ab", StepList::of(b), false);
        assert!(group.form.is_none());
    }

    #[test]
    fn callback_step_publishes_a_route_then_awaits_then_validates() {
        let action = step("charge", |mut st: State| {
            st.insert("charged".into(), json!(true));
            Ok(st)
        });
        let validate = step("check_paid", |mut st: State| {
            let paid = st["payment_result"]["paid"].as_bool().unwrap_or(false);
            if !paid {
                anyhow::bail!("payment was not confirmed");
            }
            st.insert("paid".into(), json!(true));
            Ok(st)
        });
        let handler = callback_step(
            "wait_for_payment",
            action,
            validate,
            Some("payment_result".to_string()),
            None,
        );

        let mut initial = obj(json!({}));
        initial.insert("process_id".into(), json!("p1"));
        let awaiting = handler.call(initial);
        assert!(awaiting.is_awaiting_callback());
        let state = awaiting.state();
        let route = state[keys::CALLBACK_ROUTE].as_str().unwrap();
        assert!(route.starts_with("/api/processes/p1/callback/"));
        let token = route.rsplit('/').next().unwrap();
        assert!(token.len() >= 43);
        assert_eq!(state[keys::CALLBACK_RESULT_KEY], json!("payment_result"));
        assert_eq!(state["charged"], json!(true));

        let mut resumed_input = awaiting.unwrap();
        assert_eq!(
            resumed_input[keys::SUB_STEP],
            json!("wait_for_payment - Await callback")
        );
        resumed_input.insert("payment_result".into(), json!({"paid": true}));
        let resumed = handler.call(resumed_input);
        assert!(resumed.is_success());
        let final_state = resumed.unwrap();
        assert_eq!(final_state["paid"], json!(true));
        assert!(!final_state.contains_key(keys::CALLBACK_TOKEN));
    }
}
