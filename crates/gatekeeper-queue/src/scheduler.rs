//! Scheduler - the host facility that fires a callback at an instant.
//!
//! The delay queue never sleeps on its own. It asks a [`Scheduler`] for a
//! one-shot timer and keeps the returned [`TimerHandle`] so it can cancel the
//! timer or notice that it already terminated.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::GatekeeperResult;

/// Callback invoked when a timer fires.
///
/// The result is handed to the scheduler's own error path.
pub type TimerCallback = Box<dyn FnOnce() -> GatekeeperResult<()> + Send + 'static>;

/// Handle to a single scheduled timer.
pub trait TimerHandle: Send + Sync {
    /// Cancel the timer. Best effort: a callback that already started runs
    /// to completion.
    fn cancel(&self);

    /// Whether the timer has fired or been cancelled.
    fn has_terminated(&self) -> bool;
}

/// Host timer facility.
pub trait Scheduler: Send + Sync {
    /// Schedule `callback` to run at `at`.
    ///
    /// Instants in the past fire as soon as possible. Implementations must
    /// not invoke `callback` on the calling thread before returning; the
    /// queue arms timers while holding its state lock.
    fn create_timer(
        &self,
        at: DateTime<Utc>,
        callback: TimerCallback,
        label: &str,
        category: &str,
    ) -> Arc<dyn TimerHandle>;
}
