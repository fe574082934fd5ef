//! Ambient status observer: notified when a running process's status
//! changes, so surrounding services can invalidate caches or re-render a
//! dashboard without the core knowing anything about them.

use std::cell::RefCell;
use std::sync::Arc;

/// Receives a notification every time a step produces a terminal status for
/// its run (suspend, failure, abort, completion, ...). The default
/// (`NoopObserver`) drops every notification; a real deployment swaps in an
/// implementation that invalidates whatever downstream views care about
/// process status.
pub trait StatusObserver: Send + Sync {
    fn on_status_changed(&self, process_id: &str, status: &str);
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl StatusObserver for NoopObserver {
    fn on_status_changed(&self, _process_id: &str, _status: &str) {}
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn StatusObserver>>> = const { RefCell::new(None) };
}

pub fn with_observer<T>(observer: Arc<dyn StatusObserver>, f: impl FnOnce() -> T) -> T {
    let previous = CURRENT.with(|c| c.borrow_mut().replace(observer));
    let result = f();
    CURRENT.with(|c| *c.borrow_mut() = previous);
    result
}

/// Notifies the ambient observer, if one is installed. A no-op when none is.
pub fn notify(process_id: &str, status: &str) {
    CURRENT.with(|c| {
        if let Some(observer) = c.borrow().as_ref() {
            observer.on_status_changed(process_id, status);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<(String, String)>>,
    }

    impl StatusObserver for RecordingObserver {
        fn on_status_changed(&self, process_id: &str, status: &str) {
            self.seen
                .lock()
                .unwrap()
                .push((process_id.to_string(), status.to_string()));
        }
    }

    #[test]
    fn notify_without_installed_observer_is_a_noop() {
        notify("p1", "failed");
    }

    #[test]
    fn with_observer_receives_notifications() {
        let observer = Arc::new(RecordingObserver::default());
        with_observer(observer.clone(), || {
            notify("p1", "failed");
        });
        assert_eq!(observer.seen.lock().unwrap().as_slice(), &[("p1".into(), "failed".into())]);
    }
}
