//! The wire-facing process status enum: a superset of the core's
//! `OverallStatus` with states that only exist once a process is tracked
//! durably (queued before its first run, or garbage-collected after abort).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Pending,
    Running,
    Suspended,
    Waiting,
    AwaitingCallback,
    Aborted,
    Failed,
    Completed,
    Cancelled,
    Expired,
    Unknown,
}
