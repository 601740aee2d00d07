//! Scheduler backed by the tokio runtime.
//!
//! Each timer is a spawned task that sleeps until its instant, racing a
//! cancellation token. Callbacks run on the blocking pool because queued
//! commands are synchronous and may block.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{GatekeeperError, GatekeeperResult};
use crate::scheduler::{Scheduler, TimerCallback, TimerHandle};

/// A timer callback that returned an error or panicked.
#[derive(Debug)]
pub struct TimerFailure {
    /// Label of the timer (the queue name).
    pub label: String,
    /// Category tag of the timer.
    pub category: String,
    /// The error raised by the callback.
    pub error: GatekeeperError,
}

/// Tokio-backed [`Scheduler`].
pub struct TokioScheduler {
    handle: Handle,
    clock: Arc<dyn Clock>,
    failures: Option<mpsc::UnboundedSender<TimerFailure>>,
}

impl TokioScheduler {
    /// Create a scheduler that spawns timers on `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            clock: Arc::new(SystemClock),
            failures: None,
        }
    }

    /// Create a scheduler on the current runtime.
    pub fn current() -> GatekeeperResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| GatekeeperError::NoRuntime(e.to_string()))
    }

    /// Use `clock` to convert target instants into sleep durations.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Forward callback failures to the returned receiver in addition to
    /// logging them.
    pub fn with_error_channel(mut self) -> (Self, mpsc::UnboundedReceiver<TimerFailure>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.failures = Some(tx);
        (self, rx)
    }
}

impl Scheduler for TokioScheduler {
    fn create_timer(
        &self,
        at: DateTime<Utc>,
        callback: TimerCallback,
        label: &str,
        category: &str,
    ) -> Arc<dyn TimerHandle> {
        let delay = (at - self.clock.now()).to_std().unwrap_or(Duration::ZERO);
        let timer = Arc::new(TokioTimer {
            label: label.to_string(),
            token: CancellationToken::new(),
            terminated: Arc::new(AtomicBool::new(false)),
        });

        debug!(
            "Timer {} ({}) scheduled for {} (in {:?})",
            label,
            category,
            at.to_rfc3339(),
            delay
        );

        let token = timer.token.clone();
        let terminated = timer.terminated.clone();
        let failures = self.failures.clone();
        let label = label.to_string();
        let category = category.to_string();

        self.handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            terminated.store(true, Ordering::SeqCst);

            let outcome = match tokio::task::spawn_blocking(callback).await {
                Ok(result) => result,
                Err(e) => Err(GatekeeperError::Internal(format!(
                    "timer callback did not complete: {}",
                    e
                ))),
            };

            if let Err(error) = outcome {
                warn!("Timer {} ({}) callback failed: {}", label, category, error);
                if let Some(tx) = failures {
                    let _ = tx.send(TimerFailure {
                        label,
                        category,
                        error,
                    });
                }
            }
        });

        timer
    }
}

/// Handle to a timer spawned by [`TokioScheduler`].
pub struct TokioTimer {
    label: String,
    token: CancellationToken,
    terminated: Arc<AtomicBool>,
}

impl TimerHandle for TokioTimer {
    fn cancel(&self) {
        self.token.cancel();
        self.terminated.store(true, Ordering::SeqCst);
        debug!("Timer {} cancelled", self.label);
    }

    fn has_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}
