//! Integration tests driving a DelayQueue with the tokio scheduler.
//!
//! Timings use generous bounds; the assertions are about ordering and
//! approximate pacing, not scheduler precision.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use gatekeeper_queue::{
    CommandResult, DelayQueue, FailurePolicy, GatekeeperError, QueueConfig, QueueStatus,
    SystemClock, TokioScheduler,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn queue(name: &str) -> DelayQueue {
    let scheduler = Arc::new(TokioScheduler::current().unwrap());
    DelayQueue::new(name, scheduler)
}

type Stamps = Arc<Mutex<Vec<(&'static str, Instant)>>>;

fn stamp(stamps: &Stamps, marker: &'static str) -> impl FnOnce() -> CommandResult + Send + 'static {
    let stamps = stamps.clone();
    move || {
        stamps.lock().unwrap().push((marker, Instant::now()));
        Ok(())
    }
}

fn at(stamps: &Stamps, marker: &str) -> Instant {
    stamps
        .lock()
        .unwrap()
        .iter()
        .find(|(m, _)| *m == marker)
        .map(|(_, t)| *t)
        .unwrap_or_else(|| panic!("{marker} never ran"))
}

// ============================================================================
// Pacing
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_first_command_runs_before_enqueue_returns() {
    let queue = queue("immediate");
    let ran = Arc::new(AtomicBool::new(false));

    let flag = ran.clone();
    queue
        .enqueue("1s", move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    assert!(ran.load(Ordering::SeqCst));
    queue.cancel_all();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_next_command_waits_for_compensated_pause() {
    let queue = queue("paced");
    let stamps: Stamps = Arc::new(Mutex::new(Vec::new()));

    let start = Instant::now();
    let a = stamp(&stamps, "a");
    queue
        .enqueue("300ms", move || {
            thread::sleep(Duration::from_millis(100));
            a()
        })
        .unwrap();
    queue.enqueue("0ms", stamp(&stamps, "b")).unwrap();

    assert_eq!(queue.wait_until_settled().await, QueueStatus::Idle);

    // B is due 300ms after A started, i.e. 200ms after A finished.
    let gap = at(&stamps, "b").duration_since(start);
    assert!(gap >= Duration::from_millis(280), "fired too early: {gap:?}");
    assert!(gap < Duration::from_millis(900), "fired too late: {gap:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overrunning_command_fires_next_immediately() {
    let queue = queue("overrun");
    let stamps: Stamps = Arc::new(Mutex::new(Vec::new()));

    let a = stamp(&stamps, "a");
    queue
        .enqueue("50ms", move || {
            thread::sleep(Duration::from_millis(200));
            a()
        })
        .unwrap();
    let finished = Instant::now();
    queue.enqueue("0ms", stamp(&stamps, "b")).unwrap();

    queue.wait_until_settled().await;

    let gap = at(&stamps, "b").duration_since(finished);
    assert!(gap < Duration::from_millis(150), "overrun was not compensated: {gap:?}");
    assert_eq!(queue.metrics().overruns, 1);
}

// ============================================================================
// Serialization under concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enqueues_never_overlap() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 25;

    let queue = queue("concurrent");
    let running = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let order: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let queue = queue.clone();
            let running = running.clone();
            let overlaps = overlaps.clone();
            let order = order.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let running = running.clone();
                    let overlaps = overlaps.clone();
                    let order = order.clone();
                    queue
                        .enqueue("1ms", move || {
                            if running.swap(true, Ordering::SeqCst) {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            order.lock().unwrap().push((t, i));
                            thread::sleep(Duration::from_micros(200));
                            running.store(false, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(queue.wait_until_settled().await, QueueStatus::Idle);

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    let order = order.lock().unwrap();
    assert_eq!(order.len(), THREADS * PER_THREAD);
    for t in 0..THREADS {
        let seen: Vec<usize> = order.iter().filter(|(w, _)| *w == t).map(|(_, i)| *i).collect();
        assert_eq!(seen, (0..PER_THREAD).collect::<Vec<_>>());
    }
}

// ============================================================================
// Cancellation and failures
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_all_prevents_pending_commands() {
    let queue = queue("cancel");
    let stamps: Stamps = Arc::new(Mutex::new(Vec::new()));

    queue.enqueue("300ms", stamp(&stamps, "a")).unwrap();
    queue.enqueue("0ms", stamp(&stamps, "b")).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    queue.cancel_all();
    tokio::time::sleep(Duration::from_millis(450)).await;

    let ran: Vec<_> = stamps.lock().unwrap().iter().map(|(m, _)| *m).collect();
    assert_eq!(ran, vec!["a"]);
    assert_eq!(queue.status(), QueueStatus::Idle);

    // Idle again: the next command is immediate.
    queue.enqueue("0ms", stamp(&stamps, "c")).unwrap();
    assert_eq!(stamps.lock().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timer_failures_reach_error_channel() {
    let (scheduler, mut failures) = TokioScheduler::current().unwrap().with_error_channel();
    let queue = DelayQueue::with_config(
        QueueConfig::named("porch").with_failure_policy(FailurePolicy::Stall),
        Arc::new(scheduler),
        Arc::new(SystemClock),
    );
    let stamps: Stamps = Arc::new(Mutex::new(Vec::new()));

    queue.enqueue("20ms", stamp(&stamps, "a")).unwrap();
    queue.enqueue("20ms", || Err("bulb offline".into())).unwrap();
    queue.enqueue("20ms", stamp(&stamps, "c")).unwrap();

    let failure = tokio::time::timeout(Duration::from_secs(2), failures.recv())
        .await
        .expect("no failure reported")
        .expect("channel closed");
    assert_eq!(failure.label, "porch");
    assert_eq!(failure.category, "gatekeeper");
    assert!(matches!(failure.error, GatekeeperError::Command { .. }));

    assert_eq!(queue.wait_until_settled().await, QueueStatus::Stalled);
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_scheduler_requires_runtime() {
    let err = TokioScheduler::current().err().expect("no runtime should be found");
    assert!(matches!(err, GatekeeperError::NoRuntime(_)));
}
