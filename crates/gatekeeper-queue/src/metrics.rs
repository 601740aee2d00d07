//! Delay queue metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Delay queue metrics.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Total commands enqueued.
    pub enqueued: AtomicU64,

    /// Total commands whose action ran (successfully or not).
    pub executed: AtomicU64,

    /// Total commands whose action or pause failed, including panics.
    pub failed: AtomicU64,

    /// Total pending commands dropped by `cancel_all`.
    pub cancelled: AtomicU64,

    /// Total timers armed.
    pub timers_armed: AtomicU64,

    /// Timer firings ignored because the timer was cancelled or superseded.
    pub stale_firings: AtomicU64,

    /// Commands that ran at least as long as a non-zero pause.
    pub overruns: AtomicU64,

    /// Total time spent executing actions (microseconds).
    pub execution_time_us: AtomicU64,
}

impl QueueMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an enqueued command.
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an executed command and its duration.
    pub fn record_executed(&self, duration_us: u64) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        self.execution_time_us.fetch_add(duration_us, Ordering::Relaxed);
    }

    /// Record a failed command.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record commands dropped by a cancellation.
    pub fn record_cancelled(&self, count: u64) {
        self.cancelled.fetch_add(count, Ordering::Relaxed);
    }

    /// Record an armed timer.
    pub fn record_timer_armed(&self) {
        self.timers_armed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ignored timer firing.
    pub fn record_stale_firing(&self) {
        self.stale_firings.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a command that outran its pause.
    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the metrics.
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            timestamp: Utc::now(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            timers_armed: self.timers_armed.load(Ordering::Relaxed),
            stale_firings: self.stale_firings.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            execution_time_us: self.execution_time_us.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct QueueMetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub enqueued: u64,
    pub executed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub timers_armed: u64,
    pub stale_firings: u64,
    pub overruns: u64,
    pub execution_time_us: u64,
}

impl QueueMetricsSnapshot {
    /// Average action execution time in milliseconds.
    pub fn avg_execution_time_ms(&self) -> f64 {
        if self.executed == 0 {
            return 0.0;
        }
        (self.execution_time_us as f64 / self.executed as f64) / 1000.0
    }

    /// Fraction of executed commands that failed.
    pub fn failure_rate(&self) -> f64 {
        if self.executed == 0 {
            return 0.0;
        }
        self.failed as f64 / self.executed as f64
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
