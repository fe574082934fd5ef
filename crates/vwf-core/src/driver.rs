//! Resume/abort driver: runs a workflow definition against a durable log,
//! and lets a caller resume a halted process or abort it outright.

use std::sync::Arc;

use crate::executor::exec_steps;
use crate::process::{OverallStatus, Process};
use crate::scope::{self, LogHook};
use crate::state::{keys, State};
use crate::step::{pure_step, Step, StepList};

/// A workflow definition: the full ordered list of steps a fresh process
/// will run. Distinct type alias from `StepList` purely for readability at
/// call sites (`fn my_workflow() -> Workflow`).
pub type Workflow = StepList;

/// Mints a fresh process id. Not required by `ProcessStat::new` (callers
/// are free to supply their own, e.g. an id already assigned by an
/// upstream request), but convenient for callers starting a brand new run.
pub fn new_process_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A durably-recorded run in progress: which workflow it belongs to, which
/// steps have not yet run, and the current `Process` (tag plus state) as of
/// the last completed step. Carrying the whole `Process`, not just its
/// state, is what lets `run_workflow` run the resume algebra uniformly for
/// a brand new process (`Success`, a no-op under `resume`) and a halted one.
#[derive(Debug, Clone)]
pub struct ProcessStat {
    pub process_id: String,
    pub workflow_name: String,
    pub steps: StepList,
    pub process: Process<State>,
}

impl ProcessStat {
    /// Starts a fresh run: `process` begins as `Success(initial_state)`,
    /// with `process_id` also written into the state itself so steps like
    /// `callback_step`'s endpoint creator can address this process without
    /// a separate parameter.
    pub fn new(
        workflow_name: impl Into<String>,
        process_id: impl Into<String>,
        workflow: Workflow,
        mut initial_state: State,
    ) -> Self {
        let process_id = process_id.into();
        initial_state.insert(
            "process_id".to_string(),
            serde_json::Value::String(process_id.clone()),
        );
        ProcessStat {
            process_id,
            workflow_name: workflow_name.into(),
            steps: workflow,
            process: Process::Success(initial_state),
        }
    }
}

/// Persists one step's result and returns the process to continue with.
/// The durable log is the source of truth (§6): its return value is what
/// the driver and executor carry forward, not the raw step result.
/// Identified by `process_id`/`workflow_name` rather than a live
/// `ProcessStat`, since the `ProcessStat` this run belongs to is itself
/// being advanced by the call that is invoking the writer.
pub type DurableLogWriter = dyn Fn(&str, &str, &Step, Process<State>) -> Process<State> + Send + Sync;

fn pop_or_peek_resumed_step(steps: &mut StepList, process: &Process<State>) -> Option<Step> {
    if process.state().contains_key(keys::STEP_GROUP) {
        steps.front().cloned()
    } else {
        steps.pop_front()
    }
}

/// Runs `pstat`'s remaining steps to completion or to the next halting
/// result, recording every step through `log_writer`. This is the single
/// entrypoint for both a brand new process and a resumed one: step 1 always
/// runs `pstat.process.resume(resume_suspend)` first, which is a no-op for
/// a fresh `Success` process (nothing suspended yet to resume) and the real
/// resume algebra for anything halted. Returns the updated `ProcessStat`
/// (steps drained and process advanced up to whatever ran) and the final
/// `Process` outcome. Notifies the ambient status observer once with the
/// run's overall status.
pub fn run_workflow(mut pstat: ProcessStat, log_writer: Arc<DurableLogWriter>) -> (ProcessStat, Process<State>) {
    let process_id = pstat.process_id.clone();
    let workflow_name = pstat.workflow_name.clone();
    let writer = log_writer.clone();
    let log = move |step: &Step, result: Process<State>| -> Process<State> {
        writer(&process_id, &workflow_name, step, result)
    };

    let mut steps = std::mem::take(&mut pstat.steps);
    let starting_process = std::mem::replace(&mut pstat.process, Process::Success(State::new()));

    let next_state = starting_process.resume(|process| match pop_or_peek_resumed_step(&mut steps, &process) {
        Some(resumed_step) => log(&resumed_step, process),
        None => process,
    });

    let hook: LogHook = Arc::new(log);
    let (result, remaining) = scope::with_log_hook(hook.clone(), || exec_steps(steps, next_state, &*hook));

    pstat.steps = remaining;
    pstat.process = result.clone();
    let overall = result.overall_status();
    vwf_runtime::observability::notify(&pstat.process_id, &overall_status_label(overall));
    (pstat, result)
}

fn overall_status_label(status: OverallStatus) -> String {
    match status {
        OverallStatus::Running => "running",
        OverallStatus::Suspended => "suspended",
        OverallStatus::Waiting => "waiting",
        OverallStatus::AwaitingCallback => "awaiting_callback",
        OverallStatus::Aborted => "aborted",
        OverallStatus::Failed => "failed",
        OverallStatus::Completed => "completed",
    }
    .to_string()
}

/// Resumes a halted process by merging `input` into its carried state and
/// re-running. The halted step's own closure decides whether `input` is
/// now sufficient to proceed (e.g. `input_step` checks for its input key,
/// `callback_step`'s await sub-step checks for its result key); merging
/// `input` and handing off to `run_workflow`'s resume algebra is all this
/// driver needs to do.
pub fn resume_workflow(
    mut pstat: ProcessStat,
    input: State,
    log_writer: Arc<DurableLogWriter>,
) -> (ProcessStat, Process<State>) {
    pstat.process = pstat.process.map(|mut s| {
        for (k, v) in input {
            s.insert(k, v);
        }
        s
    });
    run_workflow(pstat, log_writer)
}

/// Terminates a process immediately regardless of what step it is
/// currently on, recording a synthetic "User Aborted" step. A no-op when
/// the process has already reached `Complete`: completion is absolutely
/// terminal and aborting it would be meaningless. Aborting anything else
/// (including an already-aborted process) is idempotent via
/// `Process::abort`'s own fold, not via a check here.
pub fn abort_workflow(mut pstat: ProcessStat, log_writer: Arc<DurableLogWriter>) -> (ProcessStat, Process<State>) {
    if pstat.process.is_complete() {
        let result = pstat.process.clone();
        return (pstat, result);
    }
    let marker = pure_step("User Aborted");
    let aborted = pstat.process.clone().abort();
    let result = log_writer(&pstat.process_id, &pstat.workflow_name, &marker, aborted);
    pstat.process = result.clone();
    pstat.steps = StepList::new();
    (pstat, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::callback_step;
    use crate::state::keys;
    use crate::step::{input_step, retry_step, step};
    use serde_json::json;
    use std::sync::Mutex;

    fn obj(v: serde_json::Value) -> State {
        v.as_object().unwrap().clone()
    }

    fn silent_writer() -> Arc<DurableLogWriter> {
        Arc::new(|_, _, _, result| result)
    }

    #[test]
    fn new_process_id_generates_distinct_ids() {
        assert_ne!(new_process_id(), new_process_id());
    }

    #[test]
    fn new_process_stat_seeds_process_id_into_state() {
        let pstat = ProcessStat::new("greet", "p1", StepList::new(), obj(json!({})));
        assert_eq!(pstat.process.state()["process_id"], json!("p1"));
    }

    #[test]
    fn run_workflow_notifies_the_ambient_observer_of_the_overall_status() {
        struct Recording {
            seen: Mutex<Vec<(String, String)>>,
        }
        impl vwf_runtime::StatusObserver for Recording {
            fn on_status_changed(&self, process_id: &str, status: &str) {
                self.seen.lock().unwrap().push((process_id.to_string(), status.to_string()));
            }
        }
        let observer = std::sync::Arc::new(Recording { seen: Mutex::new(Vec::new()) });
        let workflow = StepList::of(step("a", |st: State| Ok(st))) + crate::step::done_step("Done");
        let pstat = ProcessStat::new("greet", "p1", workflow, obj(json!({})));
        vwf_runtime::observability::with_observer(observer.clone(), || {
            run_workflow(pstat, silent_writer());
        });
        assert_eq!(
            observer.seen.lock().unwrap().as_slice(),
            &[("p1".to_string(), "completed".to_string())]
        );
    }

    #[test]
    fn run_workflow_drains_steps_and_reports_complete_only_with_an_explicit_terminal_step() {
        let workflow = StepList::of(step("a", |st: State| Ok(st)))
            + step("b", |st: State| Ok(st))
            + crate::step::done_step("Done");
        let pstat = ProcessStat::new("greet", "p1", workflow, obj(json!({})));
        let (pstat, result) = run_workflow(pstat, silent_writer());
        assert!(result.is_complete());
        assert_eq!(pstat.steps.len(), 1);
        assert_eq!(pstat.steps.front().unwrap().name, "Done");
    }

    #[test]
    fn run_workflow_without_a_terminal_step_ends_success() {
        let workflow = StepList::of(step("a", |st: State| Ok(st)));
        let pstat = ProcessStat::new("greet", "p1", workflow, obj(json!({})));
        let (_pstat, result) = run_workflow(pstat, silent_writer());
        assert!(result.is_success());
    }

    #[test]
    fn run_workflow_invokes_log_writer_per_step() {
        let workflow = StepList::of(step("a", |st: State| Ok(st))) + step("b", |st: State| Ok(st));
        let pstat = ProcessStat::new("greet", "p1", workflow, obj(json!({})));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let writer: Arc<DurableLogWriter> = Arc::new(move |pid, wf, step, result| {
            seen2.lock().unwrap().push((pid.to_string(), wf.to_string(), step.name.clone()));
            result
        });
        run_workflow(pstat, writer);
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[
                ("p1".to_string(), "greet".to_string(), "a".to_string()),
                ("p1".to_string(), "greet".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn resume_workflow_satisfies_a_suspended_input_step() {
        let workflow = StepList::of(input_step("collect_name", "name_form", "name", |st| Ok(st)))
            + crate::step::done_step("Done");
        let pstat = ProcessStat::new("onboarding", "p1", workflow, obj(json!({})));
        let (pstat, result) = run_workflow(pstat, silent_writer());
        assert!(result.is_suspend());

        let (pstat, result) = resume_workflow(pstat, obj(json!({"name": "Ada"})), silent_writer());
        assert!(result.is_complete());
        assert_eq!(pstat.steps.len(), 1);
        assert_eq!(pstat.steps.front().unwrap().name, "Done");
    }

    #[test]
    fn resume_workflow_satisfies_an_awaiting_callback_step() {
        let action = step("noop", |st: State| Ok(st));
        let validate = step("mark_paid", |mut st: State| {
            let paid = st["payment_result"]["paid"].as_bool().unwrap_or(false);
            st.insert("paid".into(), json!(paid));
            Ok(st)
        });
        let workflow =
            StepList::of(callback_step("wait_for_payment", action, validate, None, None))
                + crate::step::done_step("Done");
        let pstat = ProcessStat::new("checkout", "p1", workflow, obj(json!({})));
        let (pstat, result) = run_workflow(pstat, silent_writer());
        assert!(result.is_awaiting_callback());
        assert!(result.state().contains_key(keys::CALLBACK_TOKEN));

        let (_pstat, result) =
            resume_workflow(pstat, obj(json!({"payment_result": {"paid": true}})), silent_writer());
        assert!(result.is_complete());
    }

    #[test]
    fn abort_workflow_records_a_user_aborted_step_and_is_idempotent() {
        let workflow = StepList::of(retry_step("flaky", |_: State| anyhow::bail!("down")));
        let pstat = ProcessStat::new("sync", "p1", workflow, obj(json!({})));
        let (pstat, result) = run_workflow(pstat, silent_writer());
        assert!(result.is_waiting());

        let seen_names = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen_names.clone();
        let writer: Arc<DurableLogWriter> = Arc::new(move |_, _, step, result| {
            seen2.lock().unwrap().push(step.name.clone());
            result
        });
        let (pstat, result) = abort_workflow(pstat, writer.clone());
        assert!(result.is_abort());
        assert!(pstat.steps.is_empty());

        let (pstat, result) = abort_workflow(pstat, writer.clone());
        assert!(result.is_abort());
        assert!(pstat.steps.is_empty());
        assert_eq!(seen_names.lock().unwrap().as_slice(), &["User Aborted".to_string(), "User Aborted".to_string()]);
    }

    #[test]
    fn abort_workflow_is_a_no_op_once_complete() {
        let workflow = StepList::of(crate::step::done_step("Done"));
        let pstat = ProcessStat::new("sync", "p1", workflow, obj(json!({})));
        let (pstat, result) = run_workflow(pstat, silent_writer());
        assert!(result.is_complete());

        let logged = Arc::new(Mutex::new(false));
        let logged2 = logged.clone();
        let writer: Arc<DurableLogWriter> = Arc::new(move |_, _, _, result| {
            *logged2.lock().unwrap() = true;
            result
        });
        let (_pstat, result) = abort_workflow(pstat, writer);
        assert!(result.is_complete());
        assert!(!*logged.lock().unwrap());
    }
}
