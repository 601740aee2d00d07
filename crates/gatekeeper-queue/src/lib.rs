//! # Gatekeeper Queue
//!
//! A single-consumer, delay-paced command queue. Commands execute strictly
//! one at a time, in enqueue order, and each is followed by a pause that
//! accounts for how long the command itself took.
//!
//! ## Key Components
//!
//! - [`DelayQueue`]: the queue and its self-rearming drain loop
//! - [`Pause`]: relative, absolute, or textual pause specifications
//! - [`Scheduler`] / [`TimerHandle`]: the host timer facility
//! - [`TokioScheduler`]: a [`Scheduler`] backed by the tokio runtime
//! - [`Clock`]: the time source used to measure command latency
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gatekeeper_queue::{DelayQueue, TokioScheduler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scheduler = Arc::new(TokioScheduler::current()?);
//!     let queue = DelayQueue::new("tv", scheduler);
//!
//!     // Runs immediately; the next command waits two seconds.
//!     queue.enqueue("2s", || {
//!         println!("power on");
//!         Ok(())
//!     })?;
//!     queue.enqueue("500ms", || {
//!         println!("switch input");
//!         Ok(())
//!     })?;
//!
//!     queue.wait_until_settled().await;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod delay_queue;
pub mod error;
pub mod metrics;
pub mod pause;
pub mod scheduler;
pub mod tokio_scheduler;

// Re-exports
pub use clock::{Clock, SystemClock};
pub use config::{FailurePolicy, QueueConfig, DEFAULT_CATEGORY};
pub use delay_queue::{DelayQueue, QueueStatus};
pub use error::{BoxError, CommandResult, GatekeeperError, GatekeeperResult, PauseError};
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use pause::Pause;
pub use scheduler::{Scheduler, TimerCallback, TimerHandle};
pub use tokio_scheduler::{TimerFailure, TokioScheduler};
