//! Guard against leaving a form with unsaved changes.
//!
//! The guard follows the form's dirty flag and is armed exactly while it is
//! set, whatever the reason (never saved, failed auto-save, edit during a
//! flush). Holding the guard is the registration; dropping it unregisters.

use std::future::Future;

use tokio::sync::watch;

use super::form::FormState;

/// Environment hook asked to confirm leaving while changes are unsaved.
pub trait UnloadPrompt: Send + Sync {
    /// Return `true` to leave anyway.
    fn confirm_leave(&self) -> impl Future<Output = bool> + Send;
}

/// Outcome of an intercepted "about to leave" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadDecision {
    Leave,
    Stay,
}

pub struct UnsavedChangesGuard {
    dirty: watch::Receiver<bool>,
}

impl UnsavedChangesGuard {
    /// Register a guard for `form`.
    pub fn register(form: &FormState) -> Self {
        tracing::debug!("unsaved-changes guard registered");
        Self {
            dirty: form.subscribe_dirty(),
        }
    }

    pub fn is_armed(&self) -> bool {
        *self.dirty.borrow()
    }

    /// Wait for the next arm/disarm transition and return the new state.
    ///
    /// Returns `None` once the form is gone.
    pub async fn armed_changed(&mut self) -> Option<bool> {
        self.dirty.changed().await.ok()?;
        Some(*self.dirty.borrow_and_update())
    }

    /// Handle an "about to leave" signal.
    ///
    /// Leaves immediately when nothing is unsaved; otherwise defers to the
    /// prompt.
    pub async fn intercept<P: UnloadPrompt>(&self, prompt: &P) -> UnloadDecision {
        if !self.is_armed() {
            return UnloadDecision::Leave;
        }

        tracing::debug!("leave requested with unsaved changes, asking for confirmation");
        if prompt.confirm_leave().await {
            tracing::info!("leaving with unsaved changes");
            UnloadDecision::Leave
        } else {
            UnloadDecision::Stay
        }
    }
}

impl Drop for UnsavedChangesGuard {
    fn drop(&mut self) {
        tracing::debug!("unsaved-changes guard unregistered");
    }
}
