//! The scope-local step log hook: lets `step_group` (and other nested
//! composition operators) append intermediate entries to the run's log as
//! if they were top-level steps, without threading a logger through every
//! combinator's signature.

use std::cell::RefCell;

use crate::process::Process;
use crate::state::State;
use crate::step::Step;

/// Transforms a step's result into the persisted one. The durable log is
/// the source of truth: whatever this hook returns is what execution
/// continues with.
pub type LogHook = std::sync::Arc<dyn Fn(&Step, Process<State>) -> Process<State> + Send + Sync>;

thread_local! {
    static HOOK: RefCell<Option<LogHook>> = const { RefCell::new(None) };
}

/// Installs `hook` for the duration of `f`, restoring whatever hook (if
/// any) was installed before.
pub fn with_log_hook<T>(hook: LogHook, f: impl FnOnce() -> T) -> T {
    let previous = HOOK.with(|h| h.borrow_mut().replace(hook));
    let result = f();
    HOOK.with(|h| *h.borrow_mut() = previous);
    result
}

/// Calls the ambient log hook, if one is installed, and returns its
/// transformation of `result`. A no-op passthrough otherwise, which is what
/// every direct unit test of a composition operator gets by not calling
/// `with_log_hook` at all.
pub fn notify(step: &Step, result: Process<State>) -> Process<State> {
    let hook = HOOK.with(|h| h.borrow().clone());
    match hook {
        Some(hook) => hook(step, result),
        None => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::step;
    use std::sync::{Arc, Mutex};

    #[test]
    fn notify_without_hook_is_a_passthrough() {
        let s = step("noop", |st: State| Ok(st));
        let result = notify(&s, Process::Success(State::new()));
        assert_eq!(result, Process::Success(State::new()));
    }

    #[test]
    fn with_log_hook_receives_notifications_and_can_rewrite_the_result() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let hook: LogHook = Arc::new(move |step, result| {
            seen2.lock().unwrap().push(step.name.clone());
            result.map(|mut s| {
                s.insert("logged".into(), serde_json::Value::Bool(true));
                s
            })
        });
        let s = step("noop", |st: State| Ok(st));
        let result = with_log_hook(hook, || notify(&s, Process::Success(State::new())));
        assert_eq!(seen.lock().unwrap().as_slice(), &["noop".to_string()]);
        assert_eq!(result.unwrap().get("logged"), Some(&serde_json::Value::Bool(true)));
    }
}
