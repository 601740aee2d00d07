//! `run` subcommand handler.

use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{error, info, warn};
use uuid::Uuid;

use gatekeeper_config::{Config, ConfigValidator, StepConfig};
use gatekeeper_queue::{
    CommandResult, DelayQueue, FailurePolicy, QueueConfig, QueueStatus, SystemClock,
    TokioScheduler,
};

/// Run every configured step through a delay queue and wait for it to settle.
pub(crate) async fn run_steps(
    config: Config,
    name: Option<String>,
    keep_going: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let validation = ConfigValidator::validate(&config)?;
    if !validation.is_valid() {
        for e in &validation.errors {
            error!(path = %e.path, "{}", e.message);
        }
        return Err("configuration is invalid, run `gatekeeper check` for details".into());
    }

    let queue_config = resolve_queue_config(config.queue, name, keep_going);
    let scheduler = TokioScheduler::current()?;
    let queue = DelayQueue::with_config(queue_config, Arc::new(scheduler), Arc::new(SystemClock));
    let failed = Arc::new(AtomicUsize::new(0));

    info!(
        queue = %queue.name(),
        steps = config.steps.len(),
        policy = ?queue.failure_policy(),
        "Starting run"
    );

    // The first step executes inside enqueue, so keep it off the async workers.
    let enqueuer = queue.clone();
    let counter = failed.clone();
    let steps = config.steps;
    tokio::task::spawn_blocking(move || enqueue_steps(&enqueuer, steps, &counter)).await?;

    let (status, interrupted) = tokio::select! {
        status = queue.wait_until_settled() => (status, false),
        _ = tokio::signal::ctrl_c() => {
            warn!(
                queue = %queue.name(),
                pending = queue.len(),
                "Interrupted, cancelling pending steps"
            );
            let status = tokio::select! {
                status = cancel_after_running_step(&queue) => status,
                _ = tokio::signal::ctrl_c() => {
                    warn!(
                        queue = %queue.name(),
                        "Interrupted again, not waiting for the running step"
                    );
                    queue.cancel_all();
                    queue.status()
                }
            };
            (status, true)
        }
    };

    let metrics = queue.metrics();
    info!(
        queue = %queue.name(),
        executed = metrics.executed,
        failed = metrics.failed,
        overruns = metrics.overruns,
        "Run finished"
    );

    if interrupted {
        return Err("run interrupted".into());
    }
    if status == QueueStatus::Stalled {
        let skipped = queue.len();
        queue.cancel_all();
        return Err(
            format!("run stalled after a failed step, {} step(s) not run", skipped).into(),
        );
    }
    match failed.load(Ordering::SeqCst) {
        0 => Ok(()),
        n => Err(format!("{} step(s) failed", n).into()),
    }
}

/// Cancel pending steps, wait out a step that is still executing, then cancel
/// the follow-up timer it armed on completion.
async fn cancel_after_running_step(queue: &DelayQueue) -> QueueStatus {
    queue.cancel_all();
    let mut rx = queue.subscribe();
    let _ = rx.wait_for(|status| *status != QueueStatus::Draining).await;
    queue.cancel_all();
    queue.status()
}

/// Queue settings from the config file with command-line overrides applied.
fn resolve_queue_config(
    configured: Option<QueueConfig>,
    name: Option<String>,
    keep_going: bool,
) -> QueueConfig {
    let mut config = configured.unwrap_or_else(|| {
        let id = Uuid::new_v4().simple().to_string();
        QueueConfig::named(format!("gatekeeper-{}", &id[..8]))
    });
    if let Some(name) = name {
        config.name = name;
    }
    if keep_going {
        config.failure_policy = FailurePolicy::Continue;
    }
    config
}

fn enqueue_steps(queue: &DelayQueue, steps: Vec<StepConfig>, failed: &Arc<AtomicUsize>) {
    let total = steps.len();
    let policy = queue.failure_policy();

    for (index, step) in steps.into_iter().enumerate() {
        // A new enqueue would wake a stalled queue.
        let halted =
            failed.load(Ordering::SeqCst) > 0 || queue.status() == QueueStatus::Stalled;
        if policy == FailurePolicy::Stall && halted {
            warn!(
                queue = %queue.name(),
                skipped = total - index,
                "Not queueing remaining steps after a failure"
            );
            break;
        }

        let label = format!("{}#{}", queue.name(), index + 1);
        let StepConfig { pause, command } = step;
        let action = step_action(label, command, policy, failed.clone());

        if let Err(e) = queue.enqueue(pause, action) {
            error!(queue = %queue.name(), "{}", e);
        }
    }
}

/// Build the queued action for one step.
///
/// Under the stall policy the action re-checks the failure count when it
/// runs, so a step woken after an earlier failure is skipped.
fn step_action(
    label: String,
    command: String,
    policy: FailurePolicy,
    failed: Arc<AtomicUsize>,
) -> impl FnOnce() -> CommandResult + Send + 'static {
    move || {
        if policy == FailurePolicy::Stall && failed.load(Ordering::SeqCst) > 0 {
            warn!(step = %label, "Skipping step after an earlier failure");
            return Ok(());
        }
        let result = run_shell(&label, &command);
        if result.is_err() {
            failed.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

fn run_shell(label: &str, command: &str) -> CommandResult {
    info!(step = %label, command, "Running step");
    let status = shell(command).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("step {} exited with {}", label, status).into())
    }
}

fn shell(command: &str) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C");
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c");
        cmd
    };
    cmd.arg(command);
    cmd
}
