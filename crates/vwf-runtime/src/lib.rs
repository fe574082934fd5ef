//! Ambient collaborator services for the workflow execution core.
//!
//! These are the "outside world" concerns a step implicitly relies on:
//! whether the engine is paused, who to tell when a process's status
//! changes, how to wrap a step body in a transaction, how to serialize a
//! failure, and how to mint a callback token. `vwf-core` depends on the
//! traits here rather than any concrete backing store.

pub mod callback;
pub mod error;
pub mod observability;
pub mod settings;
pub mod status;
pub mod transaction;

pub use error::{attach_error, StructuredError};
pub use observability::{NoopObserver, StatusObserver};
pub use settings::{EngineSettings, InMemoryEngineSettings};
pub use status::ProcessStatus;
pub use transaction::{NullTransactionProvider, Transaction, TransactionGuard, TransactionProvider};
