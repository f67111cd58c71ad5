//! Timer-driven auto-save.
//!
//! `AutoSaveScheduler` owns one tokio task per started form. On every tick
//! it flushes the form if it is dirty and its content differs from the last
//! successful save. A failed flush is logged and leaves the form dirty, so
//! the next tick retries; the scheduler never retries on its own.
//!
//! `stop()` cancels the timer only. A flush already in flight runs to
//! completion and may land after `stop()` returns.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use pillars_types::config::DEFAULT_AUTOSAVE_INTERVAL_SECS;
use pillars_types::error::DraftError;

use super::form::{FormSnapshot, FormState};

/// Callback persisting a form snapshot.
pub type FlushFn =
    Arc<dyn Fn(FormSnapshot) -> BoxFuture<'static, Result<(), DraftError>> + Send + Sync>;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No unsaved changes; flush not invoked.
    Clean,
    /// Dirty, but the content equals the last save; flush not invoked.
    Unchanged,
    /// Flush succeeded and the form was marked saved.
    Flushed,
    /// Flush failed; the form stays dirty for the next tick.
    Failed,
}

/// Run one auto-save tick against `form`.
pub async fn run_tick(form: &FormState, flush: &FlushFn) -> TickOutcome {
    if !form.has_unsaved_changes() {
        return TickOutcome::Clean;
    }

    let snapshot = form.snapshot();
    if form.matches_saved(&snapshot) {
        form.mark_saved(&snapshot);
        tracing::trace!(revision = snapshot.revision, "form unchanged since last save");
        return TickOutcome::Unchanged;
    }

    match flush(snapshot.clone()).await {
        Ok(()) => {
            form.mark_saved(&snapshot);
            tracing::debug!(revision = snapshot.revision, "auto-save flushed");
            TickOutcome::Flushed
        }
        Err(e) => {
            tracing::warn!(error = %e, "auto-save failed, will retry on next tick");
            TickOutcome::Failed
        }
    }
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Recurring auto-save timer owned by one form.
pub struct AutoSaveScheduler {
    interval: Duration,
    flush: FlushFn,
    running: Option<Running>,
}

impl AutoSaveScheduler {
    /// Create a stopped scheduler.
    pub fn new(interval: Duration, flush: FlushFn) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            flush,
            running: None,
        }
    }

    /// Create a stopped scheduler ticking every 30 seconds.
    pub fn with_default_interval(flush: FlushFn) -> Self {
        Self::new(Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS), flush)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Start ticking for `form`. The first tick fires one interval from now.
    ///
    /// Restarting a running scheduler stops the previous timer first.
    pub fn start(&mut self, form: FormState) {
        self.stop();

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let flush = self.flush.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        run_tick(&form, &flush).await;
                    }
                }
            }
            tracing::debug!("auto-save timer stopped");
        });

        tracing::debug!(interval_ms = interval.as_millis() as u64, "auto-save timer started");
        self.running = Some(Running { cancel, handle });
    }

    /// Cancel the timer. Returns `true` if a timer was running.
    pub fn stop(&mut self) -> bool {
        match self.running.take() {
            Some(running) => {
                running.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Run a tick immediately, outside the timer.
    ///
    /// Same rules as a timer tick: a clean or unchanged form is not flushed.
    pub async fn flush_now(&self, form: &FormState) -> TickOutcome {
        run_tick(form, &self.flush).await
    }
}

impl Drop for AutoSaveScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
