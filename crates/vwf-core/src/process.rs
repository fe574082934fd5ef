//! The process algebra: a single step's outcome as an 8-variant sum type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of running one step against a state `S`. Every variant carries
/// the state it produced so that a step list can be resumed or inspected
/// without losing information, including on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Process<S> {
    Success(S),
    Skipped(S),
    Suspend(S),
    Waiting(S),
    AwaitingCallback(S),
    Abort(S),
    Failed(S),
    Complete(S),
}

/// The status a single step produced, independent of its state payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Skipped,
    Suspend,
    Waiting,
    AwaitingCallback,
    Abort,
    Failed,
    Complete,
}

impl StepStatus {
    /// Rewraps a bare state into the `Process` variant this status names.
    /// Used by combinators (`step_lens`) that need to preserve a result's
    /// tag across a state transformation.
    pub fn wrap<S>(self, state: S) -> Process<S> {
        match self {
            StepStatus::Success => Process::Success(state),
            StepStatus::Skipped => Process::Skipped(state),
            StepStatus::Suspend => Process::Suspend(state),
            StepStatus::Waiting => Process::Waiting(state),
            StepStatus::AwaitingCallback => Process::AwaitingCallback(state),
            StepStatus::Abort => Process::Abort(state),
            StepStatus::Failed => Process::Failed(state),
            StepStatus::Complete => Process::Complete(state),
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Success => "success",
            StepStatus::Skipped => "skipped",
            StepStatus::Suspend => "suspend",
            StepStatus::Waiting => "waiting",
            StepStatus::AwaitingCallback => "awaiting_callback",
            StepStatus::Abort => "abort",
            StepStatus::Failed => "failed",
            StepStatus::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// The status of an entire run, after exhausting or stopping part way
/// through a step list. `Running` covers both `Success` and `Skipped`
/// ("keep going"); `Completed` is its own tag, distinct from `Running`,
/// reached only once an explicit terminal step returns `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverallStatus {
    Running,
    Suspended,
    Waiting,
    AwaitingCallback,
    Aborted,
    Failed,
    Completed,
}

impl<S> Process<S> {
    /// The canonical eliminator: every other combinator on `Process` is
    /// expressible via `fold`, modulo Rust's inability to pass one `FnOnce`
    /// closure to all eight arms as cleanly as the other methods below do
    /// directly (kept here anyway since it's the clearest way to convert a
    /// `Process<S>` into some other type `T` in one expression).
    pub fn fold<T>(
        self,
        on_success: impl FnOnce(S) -> T,
        on_skipped: impl FnOnce(S) -> T,
        on_suspend: impl FnOnce(S) -> T,
        on_waiting: impl FnOnce(S) -> T,
        on_awaiting_callback: impl FnOnce(S) -> T,
        on_abort: impl FnOnce(S) -> T,
        on_failed: impl FnOnce(S) -> T,
        on_complete: impl FnOnce(S) -> T,
    ) -> T {
        match self {
            Process::Success(s) => on_success(s),
            Process::Skipped(s) => on_skipped(s),
            Process::Suspend(s) => on_suspend(s),
            Process::Waiting(s) => on_waiting(s),
            Process::AwaitingCallback(s) => on_awaiting_callback(s),
            Process::Abort(s) => on_abort(s),
            Process::Failed(s) => on_failed(s),
            Process::Complete(s) => on_complete(s),
        }
    }

    /// Applies `f` to the carried state, preserving the variant tag.
    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> Process<T> {
        match self {
            Process::Success(s) => Process::Success(f(s)),
            Process::Skipped(s) => Process::Skipped(f(s)),
            Process::Suspend(s) => Process::Suspend(f(s)),
            Process::Waiting(s) => Process::Waiting(f(s)),
            Process::AwaitingCallback(s) => Process::AwaitingCallback(f(s)),
            Process::Abort(s) => Process::Abort(f(s)),
            Process::Failed(s) => Process::Failed(f(s)),
            Process::Complete(s) => Process::Complete(f(s)),
        }
    }

    /// Extracts the carried state regardless of variant.
    pub fn unwrap(self) -> S {
        match self {
            Process::Success(s)
            | Process::Skipped(s)
            | Process::Suspend(s)
            | Process::Waiting(s)
            | Process::AwaitingCallback(s)
            | Process::Abort(s)
            | Process::Failed(s)
            | Process::Complete(s) => s,
        }
    }

    /// Borrows the carried state regardless of variant.
    pub fn state(&self) -> &S {
        match self {
            Process::Success(s)
            | Process::Skipped(s)
            | Process::Suspend(s)
            | Process::Waiting(s)
            | Process::AwaitingCallback(s)
            | Process::Abort(s)
            | Process::Failed(s)
            | Process::Complete(s) => s,
        }
    }

    pub fn status(&self) -> StepStatus {
        match self {
            Process::Success(_) => StepStatus::Success,
            Process::Skipped(_) => StepStatus::Skipped,
            Process::Suspend(_) => StepStatus::Suspend,
            Process::Waiting(_) => StepStatus::Waiting,
            Process::AwaitingCallback(_) => StepStatus::AwaitingCallback,
            Process::Abort(_) => StepStatus::Abort,
            Process::Failed(_) => StepStatus::Failed,
            Process::Complete(_) => StepStatus::Complete,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Process::Success(_))
    }
    pub fn is_skipped(&self) -> bool {
        matches!(self, Process::Skipped(_))
    }
    pub fn is_suspend(&self) -> bool {
        matches!(self, Process::Suspend(_))
    }
    pub fn is_waiting(&self) -> bool {
        matches!(self, Process::Waiting(_))
    }
    pub fn is_awaiting_callback(&self) -> bool {
        matches!(self, Process::AwaitingCallback(_))
    }
    pub fn is_abort(&self) -> bool {
        matches!(self, Process::Abort(_))
    }
    pub fn is_failed(&self) -> bool {
        matches!(self, Process::Failed(_))
    }
    pub fn is_complete(&self) -> bool {
        matches!(self, Process::Complete(_))
    }

    /// True for any variant that should stop the executor's current pass
    /// (everything except `Success`/`Skipped`).
    pub fn halts_execution(&self) -> bool {
        !matches!(self, Process::Success(_) | Process::Skipped(_))
    }

    pub fn on_success(self, f: impl FnOnce(S) -> S) -> Self {
        match self {
            Process::Success(s) => Process::Success(f(s)),
            other => other,
        }
    }
    pub fn on_skipped(self, f: impl FnOnce(S) -> S) -> Self {
        match self {
            Process::Skipped(s) => Process::Skipped(f(s)),
            other => other,
        }
    }
    pub fn on_suspend(self, f: impl FnOnce(S) -> S) -> Self {
        match self {
            Process::Suspend(s) => Process::Suspend(f(s)),
            other => other,
        }
    }
    pub fn on_waiting(self, f: impl FnOnce(S) -> S) -> Self {
        match self {
            Process::Waiting(s) => Process::Waiting(f(s)),
            other => other,
        }
    }
    pub fn on_awaiting_callback(self, f: impl FnOnce(S) -> S) -> Self {
        match self {
            Process::AwaitingCallback(s) => Process::AwaitingCallback(f(s)),
            other => other,
        }
    }
    pub fn on_abort(self, f: impl FnOnce(S) -> S) -> Self {
        match self {
            Process::Abort(s) => Process::Abort(f(s)),
            other => other,
        }
    }
    pub fn on_failed(self, f: impl FnOnce(S) -> S) -> Self {
        match self {
            Process::Failed(s) => Process::Failed(f(s)),
            other => other,
        }
    }
    pub fn on_complete(self, f: impl FnOnce(S) -> S) -> Self {
        match self {
            Process::Complete(s) => Process::Complete(f(s)),
            other => other,
        }
    }

    /// Executes a step transition. Only `Success`/`Skipped` actually invoke
    /// `step`; every other variant is returned unchanged (re-wrapped through
    /// its own constructor, which is a no-op but keeps the match total).
    pub fn execute_step(self, step: impl FnOnce(S) -> Process<S>) -> Process<S> {
        match self {
            Process::Success(s) | Process::Skipped(s) => step(s),
            Process::Suspend(s) => Process::Suspend(s),
            Process::Waiting(s) => Process::Waiting(s),
            Process::AwaitingCallback(s) => Process::AwaitingCallback(s),
            Process::Abort(s) => Process::Abort(s),
            Process::Failed(s) => Process::Failed(s),
            Process::Complete(s) => Process::Complete(s),
        }
    }

    /// Aborts the process. Every variant becomes `Abort`, except `Complete`,
    /// which is absolutely terminal and is preserved.
    pub fn abort(self) -> Process<S> {
        self.fold(
            Process::Abort,
            Process::Abort,
            Process::Abort,
            Process::Abort,
            Process::Abort,
            Process::Abort,
            Process::Abort,
            Process::Complete,
        )
    }

    /// Resumes a halted process. `Suspend` and `AwaitingCallback` are the
    /// only variants that actually hand control to `resume_suspend` (the
    /// caller-supplied step that satisfies the suspension); every other
    /// continuable-after-resume variant (`Success`, `Skipped`, `Waiting`,
    /// `Failed`) is silently promoted to `Success` so the executor picks up
    /// from there. `Abort` and `Complete` are no-ops.
    pub fn resume(self, resume_suspend: impl FnOnce(Process<S>) -> Process<S>) -> Process<S> {
        let should_resume = self.is_suspend() || self.is_awaiting_callback();
        let next = self.fold(
            Process::Success,
            Process::Success,
            Process::Success,
            Process::Success,
            Process::Success,
            Process::Abort,
            Process::Success,
            Process::Complete,
        );
        if should_resume {
            resume_suspend(next)
        } else {
            next
        }
    }

    /// Projects this process's tag onto the status of the run it belongs
    /// to. See [`OverallStatus::from_step_status`].
    pub fn overall_status(&self) -> OverallStatus {
        OverallStatus::from_step_status(self.status())
    }

    /// Builds a `Process` directly from a status and a state, the inverse
    /// of `status()`. Equivalent to `status.wrap(state)`.
    pub fn from_status(status: StepStatus, state: S) -> Process<S> {
        status.wrap(state)
    }
}

impl OverallStatus {
    /// Projects a step's terminal status onto the status of the run it
    /// belongs to. `Success` and `Skipped` both mean "keep going" (`Running`);
    /// `Complete` is its own distinct terminal status, not folded into
    /// `Running`; everything else carries its halting reason through
    /// directly.
    pub fn from_step_status(status: StepStatus) -> Self {
        match status {
            StepStatus::Success | StepStatus::Skipped => OverallStatus::Running,
            StepStatus::Suspend => OverallStatus::Suspended,
            StepStatus::Waiting => OverallStatus::Waiting,
            StepStatus::AwaitingCallback => OverallStatus::AwaitingCallback,
            StepStatus::Abort => OverallStatus::Aborted,
            StepStatus::Failed => OverallStatus::Failed,
            StepStatus::Complete => OverallStatus::Completed,
        }
    }
}

impl From<OverallStatus> for vwf_runtime::status::ProcessStatus {
    fn from(status: OverallStatus) -> Self {
        use vwf_runtime::status::ProcessStatus;
        match status {
            OverallStatus::Running => ProcessStatus::Running,
            OverallStatus::Suspended => ProcessStatus::Suspended,
            OverallStatus::Waiting => ProcessStatus::Waiting,
            OverallStatus::AwaitingCallback => ProcessStatus::AwaitingCallback,
            OverallStatus::Aborted => ProcessStatus::Aborted,
            OverallStatus::Failed => ProcessStatus::Failed,
            OverallStatus::Completed => ProcessStatus::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_preserves_variant() {
        let p = Process::Suspend(3);
        let mapped = p.map(|n| n + 1);
        assert_eq!(mapped, Process::Suspend(4));
    }

    #[test]
    fn fold_dispatches_to_matching_arm() {
        let p = Process::Failed("boom".to_string());
        let out = p.fold(
            |_| "success",
            |_| "skipped",
            |_| "suspend",
            |_| "waiting",
            |_| "awaiting_callback",
            |_| "abort",
            |_| "failed",
            |_| "complete",
        );
        assert_eq!(out, "failed");
    }

    #[test]
    fn on_variant_only_touches_matching_arm() {
        let success = Process::Success(1).on_failed(|n| n + 100);
        assert_eq!(success, Process::Success(1));
        let failed = Process::Failed(1).on_failed(|n| n + 100);
        assert_eq!(failed, Process::Failed(101));
    }

    #[test]
    fn halts_execution_only_for_non_success_non_skipped() {
        assert!(!Process::Success(()).halts_execution());
        assert!(!Process::Skipped(()).halts_execution());
        assert!(Process::Suspend(()).halts_execution());
        assert!(Process::Failed(()).halts_execution());
    }

    #[test]
    fn overall_status_projects_terminal_variants() {
        assert_eq!(
            OverallStatus::from_step_status(StepStatus::Skipped),
            OverallStatus::Running
        );
        assert_eq!(
            OverallStatus::from_step_status(StepStatus::Success),
            OverallStatus::Running
        );
        assert_eq!(
            OverallStatus::from_step_status(StepStatus::Complete),
            OverallStatus::Completed
        );
        assert_eq!(
            OverallStatus::from_step_status(StepStatus::Waiting),
            OverallStatus::Waiting
        );
    }

    #[test]
    fn execute_step_only_invokes_on_continuable_variants() {
        assert_eq!(
            Process::Success(1).execute_step(|s| Process::Success(s + 1)),
            Process::Success(2)
        );
        assert_eq!(
            Process::Skipped(1).execute_step(|s| Process::Failed(s + 1)),
            Process::Failed(2)
        );
        assert_eq!(
            Process::Waiting(1).execute_step(|s| Process::Failed(s + 1)),
            Process::Waiting(1)
        );
        assert_eq!(
            Process::Complete(1).execute_step(|s| Process::Failed(s + 1)),
            Process::Complete(1)
        );
    }

    #[test]
    fn abort_is_absorbed_by_complete_and_idempotent() {
        assert_eq!(Process::Complete(1).abort(), Process::Complete(1));
        assert_eq!(Process::Success(1).abort(), Process::Abort(1));
        assert_eq!(Process::Suspend(1).abort().abort(), Process::Suspend(1).abort());
    }

    #[test]
    fn resume_promotes_waiting_and_failed_without_calling_resume_suspend() {
        let called = std::cell::Cell::new(false);
        let mark = |p: Process<i32>| {
            called.set(true);
            p
        };
        assert_eq!(Process::Waiting(1).resume(mark), Process::Success(1));
        assert!(!called.get());
        assert_eq!(Process::Failed(1).resume(mark), Process::Success(1));
        assert!(!called.get());
    }

    #[test]
    fn resume_hands_suspend_and_awaiting_callback_to_the_callback() {
        let resumed = Process::Suspend(1).resume(|p| p.map(|s| s + 1));
        assert_eq!(resumed, Process::Success(2));
        let resumed = Process::AwaitingCallback(1).resume(|p| p.map(|s| s + 1));
        assert_eq!(resumed, Process::Success(2));
    }

    #[test]
    fn resume_is_a_no_op_on_abort_and_complete() {
        assert_eq!(Process::Abort(1).resume(|p| p), Process::Abort(1));
        assert_eq!(Process::Complete(1).resume(|p| p), Process::Complete(1));
    }

    #[test]
    fn from_status_inverts_status() {
        assert_eq!(Process::from_status(StepStatus::Suspend, 1), Process::Suspend(1));
        assert_eq!(Process::Complete(1).status(), StepStatus::Complete);
    }
}
