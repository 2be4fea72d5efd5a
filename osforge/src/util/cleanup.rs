//! Compensating cleanup actions for multi-step host operations.

use crate::errors::OsforgeResult;

type CleanupFn = Box<dyn FnOnce() -> OsforgeResult<()>>;

/// A stack of labeled compensating actions.
///
/// Provisioning acquires host resources in sequence (mounts, partition
/// device maps, staging directories). Each successful forward step
/// defers its undo here; [`run`](Self::run) releases them in reverse
/// order. Anything still deferred when the stack drops is released
/// then, so early returns and `?` unwind correctly too.
///
/// A failing action is logged as a warning and the rest still run;
/// teardown never masks the error that triggered it.
pub struct CleanupStack {
    actions: Vec<(String, CleanupFn)>,
}

impl CleanupStack {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Defer a compensating action. `label` names it in logs.
    pub fn defer<F>(&mut self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> OsforgeResult<()> + 'static,
    {
        let label = label.into();
        tracing::debug!(action = %label, "deferring cleanup action");
        self.actions.push((label, Box::new(action)));
    }

    /// Number of actions still pending.
    pub fn pending(&self) -> usize {
        self.actions.len()
    }

    /// Run all deferred actions, most recent first.
    ///
    /// Each action runs at most once; a second `run` is a no-op.
    pub fn run(&mut self) {
        while let Some((label, action)) = self.actions.pop() {
            tracing::debug!(action = %label, "running cleanup action");
            if let Err(err) = action() {
                tracing::warn!(action = %label, error = %err, "cleanup action failed, continuing");
            }
        }
    }
}

impl Default for CleanupStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CleanupStack {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            tracing::debug!(pending = self.actions.len(), "running cleanup actions left at scope exit");
            self.run();
        }
    }
}
