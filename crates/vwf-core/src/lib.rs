//! Workflow execution core: an algebraic model of a single step's outcome
//! (`Process`), composition operators for building step lists out of
//! smaller steps, a sequential executor, and a resume/abort driver that
//! runs a process against a durable log.
//!
//! Side effects a step implicitly relies on (transactions, engine pause
//! state, structured error reporting, callback tokens) are mediated by
//! `vwf_runtime` so the algebra here stays pure data plus plain functions.

pub mod compose;
pub mod driver;
pub mod executor;
pub mod process;
pub mod scope;
pub mod state;
pub mod step;

pub use compose::{callback_step, conditional, focus, step_group, step_lens};
pub use driver::{
    abort_workflow, new_process_id, resume_workflow, run_workflow, DurableLogWriter, ProcessStat,
    Workflow,
};
pub use executor::{exec_steps, LogFn};
pub use process::{OverallStatus, Process, StepStatus};
pub use state::State;
pub use step::{
    done_step, input_step, mark_step_started, now_unix_timestamp, pure_step, retry_step, step,
    AuthCallback, CompositionError, Step, StepList, UserRecord,
};
