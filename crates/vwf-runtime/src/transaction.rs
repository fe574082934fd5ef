//! Per-step transactional scope, the Rust substitute for wrapping each step
//! body in `with transactional(db, logger): ...`.

use std::sync::Arc;

/// Begins and ends a transactional scope around a single step's execution.
/// A real implementation opens a database transaction on `begin` and
/// commits/rolls back on the matching call; the `NullTransactionProvider`
/// default is for callers with no transactional backing store.
pub trait TransactionProvider: Send + Sync {
    fn begin(&self) -> Box<dyn Transaction>;
}

/// A single open transaction. Exactly one of `commit`/`rollback` is called
/// by `TransactionGuard` before it is dropped.
pub trait Transaction {
    fn commit(&mut self);
    fn rollback(&mut self);
}

#[derive(Debug, Default)]
pub struct NullTransactionProvider;

struct NullTransaction;

impl Transaction for NullTransaction {
    fn commit(&mut self) {}
    fn rollback(&mut self) {}
}

impl TransactionProvider for NullTransactionProvider {
    fn begin(&self) -> Box<dyn Transaction> {
        Box::new(NullTransaction)
    }
}

/// RAII guard around a single step's transaction. Call `mark_committed`
/// once the step body has produced a successful result; if the guard is
/// dropped without that call (the early-return/panic path), it rolls the
/// transaction back instead.
pub struct TransactionGuard {
    txn: Box<dyn Transaction>,
    committed: bool,
}

impl TransactionGuard {
    pub fn begin(provider: &dyn TransactionProvider) -> Self {
        Self {
            txn: provider.begin(),
            committed: false,
        }
    }

    pub fn mark_committed(&mut self) {
        self.txn.commit();
        self.committed = true;
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if !self.committed {
            self.txn.rollback();
        }
    }
}

/// Returns the ambient transaction provider, defaulting to
/// `NullTransactionProvider` when none has been installed.
pub fn provider() -> Arc<dyn TransactionProvider> {
    CURRENT.with(|c| {
        c.borrow()
            .clone()
            .unwrap_or_else(|| Arc::new(NullTransactionProvider))
    })
}

use std::cell::RefCell;

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn TransactionProvider>>> = const { RefCell::new(None) };
}

pub fn with_provider<T>(provider: Arc<dyn TransactionProvider>, f: impl FnOnce() -> T) -> T {
    let previous = CURRENT.with(|c| c.borrow_mut().replace(provider));
    let result = f();
    CURRENT.with(|c| *c.borrow_mut() = previous);
    result
}
