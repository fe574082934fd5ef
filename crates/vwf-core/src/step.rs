//! A single unit of work and the ordered list of them a workflow executes.

use std::collections::VecDeque;
use std::fmt;
use std::ops::Add;
use std::sync::Arc;

use tracing::info_span;

use crate::process::Process;
use crate::state::{keys, State};

/// A minimal identity a step's resume/retry authorization predicate can be
/// evaluated against. Deliberately thin: real deployments carry richer user
/// records, but the core only ever needs to ask "is this person allowed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub roles: Vec<String>,
}

pub type AuthCallback = Arc<dyn Fn(Option<&UserRecord>) -> bool + Send + Sync>;
type StepFn = Arc<dyn Fn(State) -> Process<State> + Send + Sync>;

/// One executable unit in a workflow. Built exclusively through `step()`,
/// `retry_step()`, or `input_step()` so that transaction handling and
/// structured logging are never forgotten.
#[derive(Clone)]
pub struct Step {
    pub name: String,
    pub form: Option<String>,
    pub assignee: Option<String>,
    pub resume_auth: Option<AuthCallback>,
    pub retry_auth: Option<AuthCallback>,
    pub(crate) func: StepFn,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

impl Step {
    pub fn call(&self, state: State) -> Process<State> {
        (self.func)(state)
    }

    pub fn with_form(mut self, form: impl Into<String>) -> Self {
        self.form = Some(form.into());
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn with_resume_auth(mut self, auth: AuthCallback) -> Self {
        self.resume_auth = Some(auth);
        self
    }

    pub fn with_retry_auth(mut self, auth: AuthCallback) -> Self {
        self.retry_auth = Some(auth);
        self
    }
}

/// An ordered, possibly empty sequence of steps. Backed by a `VecDeque` so
/// the resume driver can pop completed steps off the front in O(1).
#[derive(Debug, Clone, Default)]
pub struct StepList(VecDeque<Step>);

impl StepList {
    pub fn new() -> Self {
        Self(VecDeque::new())
    }

    pub fn of(step: Step) -> Self {
        let mut q = VecDeque::new();
        q.push_back(step);
        Self(q)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn front(&self) -> Option<&Step> {
        self.0.front()
    }

    pub fn pop_front(&mut self) -> Option<Step> {
        self.0.pop_front()
    }

    pub fn push_back(&mut self, step: Step) {
        self.0.push_back(step);
    }

    pub fn push_front(&mut self, step: Step) {
        self.0.push_front(step);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Step> {
        self.0.into_iter().collect()
    }

    /// Drops the first `n` steps. Used to reconstruct a `StepList` from a
    /// durable cursor: the workflow definition is re-run (it's just code),
    /// and however many steps already completed are dropped back off.
    pub fn drop_front(mut self, n: usize) -> Self {
        for _ in 0..n {
            self.0.pop_front();
        }
        self
    }
}

impl FromIterator<Step> for StepList {
    fn from_iter<T: IntoIterator<Item = Step>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Add for StepList {
    type Output = StepList;

    /// Concatenation with the empty list as identity on both sides.
    fn add(mut self, rhs: StepList) -> StepList {
        self.0.extend(rhs.0);
        self
    }
}

impl Add<Step> for StepList {
    type Output = StepList;

    fn add(mut self, rhs: Step) -> StepList {
        self.0.push_back(rhs);
        self
    }
}

/// Raised when a step list is assembled dynamically (e.g. from a registry
/// keyed by step name at runtime) and the pieces don't compose. Statically
/// composed step lists can't hit this: `StepList + StepList` only
/// type-checks when both sides already are step lists.
#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("unknown step name: {0}")]
    UnknownStep(String),
    #[error("duplicate step name in composition: {0}")]
    DuplicateStep(String),
}

impl StepList {
    /// Assembles a step list from `names` looked up in `registry`, in
    /// order. The dynamic counterpart to the static `+` operator, for
    /// callers that only know which steps to run at runtime.
    pub fn try_from_dynamic(
        names: &[&str],
        registry: &std::collections::HashMap<String, Step>,
    ) -> Result<StepList, CompositionError> {
        let mut seen = std::collections::HashSet::new();
        let mut out = StepList::new();
        for name in names {
            if !seen.insert(*name) {
                return Err(CompositionError::DuplicateStep((*name).to_string()));
            }
            let step = registry
                .get(*name)
                .ok_or_else(|| CompositionError::UnknownStep((*name).to_string()))?;
            out.push_back(step.clone());
        }
        Ok(out)
    }
}

/// Wraps `name` + `body` as a step whose failures are terminal: any `Err`
/// returned by `body` is projected into the step's output state under
/// `__error` and the step reports `Failed`. Runs `body` inside a
/// transaction that commits only on `Ok`.
pub fn step(
    name: impl Into<String>,
    body: impl Fn(State) -> anyhow::Result<State> + Send + Sync + 'static,
) -> Step {
    let name = name.into();
    let body = Arc::new(body);
    let func_name = name.clone();
    let func: StepFn = Arc::new(move |state: State| {
        let _span = info_span!("workflow_step", step = %func_name).entered();
        let mut guard = vwf_runtime::TransactionGuard::begin(vwf_runtime::transaction::provider().as_ref());
        match body(state.clone()) {
            Ok(next) => {
                guard.mark_committed();
                Process::Success(next)
            }
            Err(err) => {
                tracing::warn!(step = %func_name, error = %err, "step failed");
                Process::Failed(vwf_runtime::attach_error(state, &err))
            }
        }
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

/// Like `step`, but a failure is reported as `Waiting` rather than
/// `Failed`, signaling the driver that the same step should be retried
/// (with operator authorization, via `retry_auth`) instead of the whole
/// process being terminal.
pub fn retry_step(
    name: impl Into<String>,
    body: impl Fn(State) -> anyhow::Result<State> + Send + Sync + 'static,
) -> Step {
    let name = name.into();
    let body = Arc::new(body);
    let func_name = name.clone();
    let func: StepFn = Arc::new(move |state: State| {
        let _span = info_span!("workflow_step", step = %func_name, retryable = true).entered();
        let mut guard = vwf_runtime::TransactionGuard::begin(vwf_runtime::transaction::provider().as_ref());
        match body(state.clone()) {
            Ok(next) => {
                guard.mark_committed();
                Process::Success(next)
            }
            Err(err) => {
                tracing::warn!(step = %func_name, error = %err, "step waiting for retry");
                Process::Waiting(vwf_runtime::attach_error(state, &err))
            }
        }
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

/// A step that suspends until a human has supplied `input_key` in the
/// process state (via a resume call that merges the submitted form into
/// state), then runs `body` against the now-complete state.
pub fn input_step(
    name: impl Into<String>,
    form: impl Into<String>,
    input_key: impl Into<String>,
    body: impl Fn(State) -> anyhow::Result<State> + Send + Sync + 'static,
) -> Step {
    let name = name.into();
    let input_key = input_key.into();
    let body = Arc::new(body);
    let func_name = name.clone();
    let func: StepFn = Arc::new(move |state: State| {
        let _span = info_span!("workflow_step", step = %func_name, awaits_input = true).entered();
        if !state.contains_key(&input_key) {
            return Process::Suspend(state);
        }
        let mut guard = vwf_runtime::TransactionGuard::begin(vwf_runtime::transaction::provider().as_ref());
        match body(state.clone()) {
            Ok(next) => {
                guard.mark_committed();
                Process::Success(next)
            }
            Err(err) => Process::Failed(vwf_runtime::attach_error(state, &err)),
        }
    });
    Step {
        name,
        form: Some(form.into()),
        assignee: None,
        resume_auth: None,
        retry_auth: None,
        func,
    }
}

/// A step that always succeeds, passing its state through unchanged. Used
/// as a marker at the start of a workflow definition, mirroring the `begin`/
/// `init` pure steps of the system this core was modeled on.
pub fn pure_step(name: impl Into<String>) -> Step {
    step(name, |st: State| Ok(st))
}

/// A terminal step that always reports `Complete`. A workflow only ever
/// reaches `Complete` by running one of these; the executor never infers
/// completion just from running out of steps (a step list that ends
/// without one stays `Success`/`Skipped`, not `Complete`).
pub fn done_step(name: impl Into<String>) -> Step {
    let name = name.into();
    let func: StepFn = Arc::new(Process::Complete);
    Step {
        name,
        form: None,
        assignee: None,
        resume_auth: None,
        retry_auth: None,
        func,
    }
}

/// Marks `state` as having just started a step, recording a Unix timestamp
/// (seconds since the epoch) under the reserved `__last_step_started_at`
/// key. Called by the executor before invoking each step.
pub fn mark_step_started(mut state: State, started_at_unix: f64) -> State {
    state.insert(
        keys::LAST_STEP_STARTED_AT.to_string(),
        serde_json::Value::from(started_at_unix),
    );
    state
}

/// Seconds since the Unix epoch, as an `f64` for sub-second resolution.
/// The only clock read anywhere in the executor; kept as a free function so
/// it's the one place a test would need to mock if step durations were
/// ever asserted on directly.
pub fn now_unix_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
