//! Timeout scheduler: one-shot deferred actions.
//!
//! For every request created with a timeout, the engine arms exactly one
//! deferred task that fires at `created_at + timeout_seconds` and invokes
//! the lifecycle timeout-fire trigger. The scheduler never needs to cancel
//! a timer when a request resolves early: the CAS guard in the engine makes
//! a late fire a harmless no-op. Explicit cancellation exists anyway via
//! [`TimerHandle`], for callers that want to reclaim the bookkeeping.
//!
//! Armed timers live in process memory only. A process restart loses all
//! pending timeouts; that is a documented operational limitation of the
//! single-process engine, not a correctness bug.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use tokio::task::AbortHandle;

/// Boxed task executed when a timer fires.
pub type TimerTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Handle to an armed timer.
///
/// Dropping the handle does **not** cancel the timer; call
/// [`cancel`](Self::cancel) to abort it before it fires.
#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    /// Wrap a Tokio abort handle.
    #[must_use]
    pub const fn new(abort: AbortHandle) -> Self {
        Self { abort }
    }

    /// Cancel the timer if it has not fired yet.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// Whether the timer task has finished (fired or been cancelled).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Arms one-shot deferred actions at an absolute time.
///
/// Dyn-compatible so the engine can hold `Arc<dyn Scheduler>` and tests can
/// substitute implementations.
pub trait Scheduler: Send + Sync {
    /// Schedule `task` to run at `at`. Past deadlines fire immediately.
    fn schedule(&self, at: DateTime<Utc>, task: TimerTask) -> TimerHandle;
}

/// Scheduler backed by `tokio::time` on spawned tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    /// Create a scheduler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, at: DateTime<Utc>, task: TimerTask) -> TimerHandle {
        let handle = tokio::spawn(async move {
            // A negative remaining duration means the deadline already
            // passed; fire without sleeping.
            if let Ok(delay) = (at - Utc::now()).to_std() {
                tokio::time::sleep(delay).await;
            }
            task.await;
        });
        TimerHandle::new(handle.abort_handle())
    }
}
