//! DelayQueue - strictly serialized, pause-paced command execution.
//!
//! Commands run one at a time in enqueue order. After each command the queue
//! arms a single timer for the command's pause, shortened by however long the
//! command itself took. Enqueueing into an idle queue runs the command right
//! away on the caller's stack.
//!
//! ```text
//!   Idle ──enqueue──▶ Draining ──arm──▶ Armed ──fire──▶ Draining ─ ...
//!                        │                └──fire, nothing pending──▶ Idle
//!                        └──failure, stall policy──▶ Stalled ──enqueue──▶ Draining
//!
//!   cancel_all: Armed | Stalled ──▶ Idle
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{FailurePolicy, QueueConfig};
use crate::error::{CommandResult, GatekeeperError, GatekeeperResult};
use crate::metrics::{QueueMetrics, QueueMetricsSnapshot};
use crate::pause::Pause;
use crate::scheduler::{Scheduler, TimerCallback, TimerHandle};

type Action = Box<dyn FnOnce() -> CommandResult + Send + 'static>;

/// Observable state of a [`DelayQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    /// No timer armed and nothing pending.
    Idle,
    /// A command is executing.
    Draining,
    /// A timer is armed for the next drain step.
    Armed,
    /// Commands are pending but nothing will run them until the next enqueue.
    Stalled,
}

impl QueueStatus {
    /// Whether the queue will make no progress without outside input.
    pub fn is_settled(&self) -> bool {
        matches!(self, QueueStatus::Idle | QueueStatus::Stalled)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueueStatus::Idle => "idle",
            QueueStatus::Draining => "draining",
            QueueStatus::Armed => "armed",
            QueueStatus::Stalled => "stalled",
        };
        f.write_str(name)
    }
}

struct Command {
    seq: u64,
    pause: Pause,
    action: Action,
}

struct ArmedTimer {
    id: u64,
    handle: Arc<dyn TimerHandle>,
}

#[derive(Default)]
struct State {
    commands: VecDeque<Command>,
    timer: Option<ArmedTimer>,
    draining: bool,
    next_seq: u64,
    next_timer_id: u64,
}

impl State {
    fn status(&self) -> QueueStatus {
        if self.draining {
            QueueStatus::Draining
        } else if self.timer.is_some() {
            QueueStatus::Armed
        } else if self.commands.is_empty() {
            QueueStatus::Idle
        } else {
            QueueStatus::Stalled
        }
    }

    /// No drainer is active and no live timer will start one.
    fn is_ready_to_drain(&self) -> bool {
        !self.draining
            && self
                .timer
                .as_ref()
                .is_none_or(|timer| timer.handle.has_terminated())
    }
}

struct Inner {
    name: String,
    category: String,
    failure_policy: FailurePolicy,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    status: watch::Sender<QueueStatus>,
    metrics: QueueMetrics,
}

/// Single-consumer, delay-paced command queue.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct DelayQueue {
    inner: Arc<Inner>,
}

impl DelayQueue {
    /// Create a queue with default configuration and the system clock.
    pub fn new(name: impl Into<String>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_config(QueueConfig::named(name), scheduler, Arc::new(SystemClock))
    }

    /// Create a queue from explicit configuration and collaborators.
    pub fn with_config(
        config: QueueConfig,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (status, _) = watch::channel(QueueStatus::Idle);
        Self {
            inner: Arc::new(Inner {
                name: config.name,
                category: config.category,
                failure_policy: config.failure_policy,
                scheduler,
                clock,
                state: Mutex::new(State::default()),
                status,
                metrics: QueueMetrics::new(),
            }),
        }
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Category tag attached to timers.
    pub fn category(&self) -> &str {
        &self.inner.category
    }

    /// Failure policy in effect.
    pub fn failure_policy(&self) -> FailurePolicy {
        self.inner.failure_policy
    }

    /// Append a command.
    ///
    /// If the queue is idle the command runs before this returns, and any
    /// error from that drain step is returned here. Otherwise the command
    /// waits for the armed timer and errors go to the scheduler.
    pub fn enqueue<P, F>(&self, pause: P, action: F) -> GatekeeperResult<()>
    where
        P: Into<Pause>,
        F: FnOnce() -> CommandResult + Send + 'static,
    {
        let pause = pause.into();
        let should_drain = {
            let mut state = self.inner.state.lock();
            state.next_seq += 1;
            let seq = state.next_seq;
            debug!(
                "Queue {} enqueued command #{} (pause: {})",
                self.inner.name, seq, pause
            );
            state.commands.push_back(Command {
                seq,
                pause,
                action: Box::new(action),
            });
            self.inner.metrics.record_enqueued();

            let ready = state.is_ready_to_drain();
            if ready {
                state.timer = None;
                state.draining = true;
            }
            self.inner.publish(&state);
            ready
        };

        if should_drain {
            self.inner.drain()
        } else {
            Ok(())
        }
    }

    /// Cancel the armed timer and drop every pending command.
    ///
    /// A command that is already executing runs to completion.
    pub fn cancel_all(&self) {
        let dropped = {
            let mut state = self.inner.state.lock();
            if let Some(timer) = state.timer.take() {
                timer.handle.cancel();
            }
            let dropped = std::mem::take(&mut state.commands);
            self.inner.publish(&state);
            dropped
        };

        self.inner.metrics.record_cancelled(dropped.len() as u64);
        debug!(
            "Queue {} cancelled, dropped {} pending commands",
            self.inner.name,
            dropped.len()
        );
    }

    /// Current status.
    pub fn status(&self) -> QueueStatus {
        self.inner.state.lock().status()
    }

    /// Subscribe to status transitions.
    pub fn subscribe(&self) -> watch::Receiver<QueueStatus> {
        self.inner.status.subscribe()
    }

    /// Wait until the queue is idle or stalled.
    pub async fn wait_until_settled(&self) -> QueueStatus {
        let mut rx = self.subscribe();
        match rx.wait_for(QueueStatus::is_settled).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }

    /// Number of pending commands, excluding one that is executing.
    pub fn len(&self) -> usize {
        self.inner.state.lock().commands.len()
    }

    /// Whether no commands are pending.
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().commands.is_empty()
    }

    /// Snapshot of the queue's metrics.
    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl fmt::Debug for DelayQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("DelayQueue")
            .field("name", &self.inner.name)
            .field("status", &state.status())
            .field("pending", &state.commands.len())
            .finish()
    }
}

impl Inner {
    fn publish(&self, state: &State) {
        self.status.send_replace(state.status());
    }

    /// Run the head command and arm the timer for the next one.
    ///
    /// The caller must have claimed `draining` under the state lock.
    fn drain(self: &Arc<Self>) -> GatekeeperResult<()> {
        let mut guard = DrainGuard {
            inner: self,
            active: true,
            started: None,
        };

        let command = {
            let mut state = self.state.lock();
            match state.commands.pop_front() {
                Some(command) => command,
                None => {
                    state.draining = false;
                    self.publish(&state);
                    guard.active = false;
                    debug!("Queue {} is idle", self.name);
                    return Ok(());
                }
            }
        };

        debug!("Queue {} running command #{}", self.name, command.seq);
        let before = self.clock.now();
        guard.started = Some(before);
        let outcome = (command.action)();
        let after = self.clock.now();

        let elapsed = (after - before).max(chrono::Duration::zero());
        self.metrics.record_executed(micros(elapsed));

        let target = command.pause.resolve(after);
        let (next_fire_at, error) = match (outcome, target) {
            (Ok(()), Ok(target)) => {
                let next = compensate(target, elapsed);
                // A zero pause never counts; only a pause the command outlasted does.
                if target > after && next <= after {
                    self.metrics.record_overrun();
                    debug!(
                        "Queue {} command #{} outran its pause, next fires immediately",
                        self.name, command.seq
                    );
                }
                (Some(next), None)
            }
            (Err(source), target) => {
                let next = match self.failure_policy {
                    FailurePolicy::Stall => None,
                    FailurePolicy::Continue => Some(
                        target
                            .map(|target| compensate(target, elapsed))
                            .unwrap_or(after),
                    ),
                };
                let error = GatekeeperError::Command {
                    queue: self.name.clone(),
                    source,
                };
                (next, Some(error))
            }
            (Ok(()), Err(source)) => {
                let next = match self.failure_policy {
                    FailurePolicy::Stall => None,
                    FailurePolicy::Continue => Some(after),
                };
                let error = GatekeeperError::Pause {
                    queue: self.name.clone(),
                    source,
                };
                (next, Some(error))
            }
        };

        if let Some(ref error) = error {
            self.metrics.record_failed();
            debug!(
                "Queue {} command #{} failed ({:?} policy): {}",
                self.name, command.seq, self.failure_policy, error
            );
        }

        guard.finish(next_fire_at);

        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Arm a timer that re-enters the drain step at `at`.
    fn arm(self: &Arc<Self>, state: &mut State, at: DateTime<Utc>) {
        state.next_timer_id += 1;
        let id = state.next_timer_id;
        let queue = Arc::downgrade(self);
        let callback: TimerCallback = Box::new(move || Inner::fire(&queue, id));

        let handle = self
            .scheduler
            .create_timer(at, callback, &self.name, &self.category);
        state.timer = Some(ArmedTimer { id, handle });
        self.metrics.record_timer_armed();
    }

    /// Timer callback: drain only if this timer still owns the slot.
    fn fire(queue: &Weak<Inner>, id: u64) -> GatekeeperResult<()> {
        let Some(inner) = queue.upgrade() else {
            return Ok(());
        };

        {
            let mut state = inner.state.lock();
            let current = state.timer.as_ref().is_some_and(|timer| timer.id == id);
            if !current || state.draining {
                inner.metrics.record_stale_firing();
                debug!("Queue {} ignored stale timer {}", inner.name, id);
                return Ok(());
            }
            state.timer = None;
            state.draining = true;
            inner.publish(&state);
        }

        inner.drain()
    }
}

/// Releases the draining claim, arming the next timer on the normal path.
///
/// If the command panics the guard still releases the claim so the queue
/// is left stalled rather than wedged.
struct DrainGuard<'a> {
    inner: &'a Arc<Inner>,
    active: bool,
    /// When the popped command's action started.
    started: Option<DateTime<Utc>>,
}

impl DrainGuard<'_> {
    fn finish(mut self, next_fire_at: Option<DateTime<Utc>>) {
        let mut state = self.inner.state.lock();
        if let Some(at) = next_fire_at {
            self.inner.arm(&mut state, at);
        }
        state.draining = false;
        self.inner.publish(&state);
        self.active = false;
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.active {
            if let Some(before) = self.started {
                let elapsed = (self.inner.clock.now() - before).max(chrono::Duration::zero());
                self.inner.metrics.record_executed(micros(elapsed));
                self.inner.metrics.record_failed();
            }
            let mut state = self.inner.state.lock();
            state.draining = false;
            self.inner.publish(&state);
            warn!("Queue {} released after a command panicked", self.inner.name);
        }
    }
}

fn micros(elapsed: chrono::Duration) -> u64 {
    elapsed.num_microseconds().unwrap_or(i64::MAX) as u64
}

fn compensate(target: DateTime<Utc>, elapsed: chrono::Duration) -> DateTime<Utc> {
    target.checked_sub_signed(elapsed).unwrap_or(target)
}

#[cfg(test)]
#[path = "delay_queue_tests.rs"]
mod tests;
