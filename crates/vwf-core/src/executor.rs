//! Runs a step list to completion or to the first halting result.

use crate::process::Process;
use crate::state::State;
use crate::step::{mark_step_started, now_unix_timestamp, Step, StepList};

/// Transforms a step's result into the persisted one. The durable log is
/// the source of truth for what execution continues with: if the log write
/// itself needs to reject or rewrite a result (a `__replace_last_state`
/// correction, a failed write surfaced as `Failed`), it does so through its
/// return value, not a side channel.
pub type LogFn<'a> = dyn Fn(&Step, Process<State>) -> Process<State> + Send + Sync + 'a;

/// Runs `steps` in order starting from `starting_process`, calling `log_fn`
/// after every step and carrying its return value forward as the new
/// process. Stops at the first point `process` is no longer continuable
/// (every result but `Success`/`Skipped`), or when the ambient engine
/// settings report the engine paused; in both cases the current `process`
/// is returned unchanged. A step that halts execution is put back at the
/// front of the returned step list rather than discarded: a driver
/// resuming this process later needs to find it there to log the eventual
/// resume transition. A step list that runs out while `process` is still
/// `Success`/`Skipped` returns that process as-is: `Complete` only ever
/// comes from a step that explicitly returns it, never from exhausting the
/// list. Returns the final `Process` outcome alongside whatever steps
/// never ran to completion.
pub fn exec_steps(
    mut steps: StepList,
    mut process: Process<State>,
    log_fn: &LogFn,
) -> (Process<State>, StepList) {
    loop {
        if !(process.is_success() || process.is_skipped()) {
            return (process, steps);
        }
        if vwf_runtime::settings::is_paused() {
            return (process, steps);
        }
        let Some(next) = steps.pop_front() else {
            return (process, steps);
        };
        let stamped = process.map(|s| mark_step_started(s, now_unix_timestamp()));
        let result = stamped.execute_step(|s| next.call(s));
        process = log_fn(&next, result);
        if process.halts_execution() {
            steps.push_front(next);
        }
    }
}
