//! Request lifecycle
//!
//! Cleanup hooks that run at the end of every unit of work (typically an
//! inbound request). The default cache connects its `close` here once, at
//! startup; request handlers open a [`RequestGuard`] and the hooks run when
//! the guard is dropped, on early return or panic as well.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

/// A cleanup hook; errors are logged and never stop the other hooks
pub type CleanupHook = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Registry of end-of-request hooks
///
/// Cloning is cheap and clones share the same hook list.
#[derive(Clone, Default)]
pub struct RequestLifecycle {
    hooks: Arc<RwLock<Vec<(String, CleanupHook)>>>,
}

impl RequestLifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` at the end of every request from now on
    pub fn connect<F>(&self, label: impl Into<String>, hook: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let label = label.into();
        debug!(hook = %label, "Connected request_finished hook");
        self.hooks.write().push((label, Arc::new(hook)));
    }

    /// Number of connected hooks
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hooks.read().len()
    }

    /// Labels of connected hooks, in connection order
    #[must_use]
    pub fn hook_labels(&self) -> Vec<String> {
        self.hooks.read().iter().map(|(label, _)| label.clone()).collect()
    }

    /// Start a unit of work; hooks run when the guard is dropped
    #[must_use = "hooks run when the guard is dropped"]
    pub fn begin_request(&self) -> RequestGuard {
        RequestGuard {
            lifecycle: self.clone(),
        }
    }

    /// Run every hook now
    ///
    /// Returns the number of hooks that failed.
    pub fn request_finished(&self) -> usize {
        // Snapshot so a hook may connect further hooks without deadlocking
        let hooks: Vec<(String, CleanupHook)> = self.hooks.read().clone();
        let mut failures = 0;
        for (label, hook) in hooks {
            if let Err(e) = hook() {
                failures += 1;
                warn!(hook = %label, error = %e, "request_finished hook failed");
            }
        }
        failures
    }
}

/// RAII guard for one unit of work
pub struct RequestGuard {
    lifecycle: RequestLifecycle,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.lifecycle.request_finished();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_hooks_run_once_per_request() {
        let lifecycle = RequestLifecycle::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        lifecycle.connect("count", move || {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });

        for _ in 0..3 {
            let _request = lifecycle.begin_request();
        }
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_failing_hook_does_not_stop_others() {
        let lifecycle = RequestLifecycle::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        lifecycle.connect("broken", || Err(anyhow::anyhow!("already gone")));
        lifecycle.connect("count", move || {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });

        assert_eq!(lifecycle.request_finished(), 1);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(lifecycle.hook_labels(), vec!["broken", "count"]);
    }
}
