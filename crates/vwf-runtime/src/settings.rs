//! Ambient engine settings: a global pause flag the executor consults
//! between steps, mirroring the original system's module-level
//! `get_engine_settings()` singleton.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A source of truth for whether the engine is allowed to keep running
/// steps. Implementations can back this with a feature flag service, an
/// incident-response kill switch, or (the default) a plain in-process flag.
pub trait EngineSettings: Send + Sync {
    fn is_paused(&self) -> bool;
}

/// In-process implementation: an atomic flag flippable from any thread.
#[derive(Debug, Default)]
pub struct InMemoryEngineSettings {
    paused: AtomicBool,
}

impl InMemoryEngineSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}

impl EngineSettings for InMemoryEngineSettings {
    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn EngineSettings>>> = const { RefCell::new(None) };
}

/// Installs `settings` as the ambient engine settings for this thread for
/// the duration of the call to `f`, restoring whatever was installed before
/// (if anything) once `f` returns.
pub fn with_settings<T>(settings: Arc<dyn EngineSettings>, f: impl FnOnce() -> T) -> T {
    let previous = CURRENT.with(|c| c.borrow_mut().replace(settings));
    let result = f();
    CURRENT.with(|c| *c.borrow_mut() = previous);
    result
}

/// Returns whether the ambient engine is paused. Defaults to `false` when
/// no settings have been installed, so code that never calls
/// `with_settings` (most unit tests) behaves as an always-running engine.
pub fn is_paused() -> bool {
    CURRENT.with(|c| c.borrow().as_ref().map(|s| s.is_paused()).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_not_paused_with_nothing_installed() {
        assert!(!is_paused());
    }

    #[test]
    fn with_settings_scopes_the_flag() {
        let settings = Arc::new(InMemoryEngineSettings::new());
        settings.pause();
        let observed = with_settings(settings.clone(), is_paused);
        assert!(observed);
        assert!(!is_paused());
    }
}
