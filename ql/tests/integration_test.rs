//! Integration tests for QuantLoop
//!
//! These tests drive iterators end to end through each executor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quantloop::{LoopState, Quantize, QuantizedIterator, RunQueue, SerialQueue, TokioExecutor};
use serial_test::serial;

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Routine that appends `"{item}_"` to the shared log
fn append(log: &Log) -> impl FnMut(&&'static str) + Send + 'static {
    let log = Arc::clone(log);
    move |item: &&'static str| log.lock().unwrap().push(format!("{}_", item))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    (count, move || {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

// =============================================================================
// Fixed-count pacing on a host-drained queue
// =============================================================================

#[test]
fn test_one_big_step_runs_synchronously() {
    let log = new_log();
    let it = vec!["a", "b", "c"].quantize_by_count(10, append(&log)).unwrap();

    it.run();

    assert_eq!(entries(&log), vec!["a_", "b_", "c_"]);
    assert!(it.is_done());
    assert_eq!(it.quanta(), 1);
}

#[test]
fn test_multiple_steps() {
    let queue = Arc::new(RunQueue::new("test"));
    let log = new_log();
    let it = vec!["a", "b", "c"]
        .quantize_by_count(1, append(&log))
        .unwrap()
        .with_executor(queue.clone())
        .unwrap();
    let (done, on_done) = counter();
    it.on_done(on_done);

    it.run();
    assert_eq!(entries(&log), vec!["a_"]);
    assert!(!it.is_done());

    assert_eq!(queue.run_until_idle(), 2);
    assert_eq!(entries(&log), vec!["a_", "b_", "c_"]);
    assert!(it.is_done());
    assert_eq!(it.quanta(), 3);
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[test]
fn test_multiple_steps_and_cancel() {
    let queue = Arc::new(RunQueue::new("test"));
    let log = new_log();
    let it = vec!["a", "b", "c"]
        .quantize_by_count(2, append(&log))
        .unwrap()
        .with_executor(queue.clone())
        .unwrap();
    let (canceled, on_cancel) = counter();
    it.on_cancel(on_cancel);
    it.on_done(|| panic!("done must not fire"));

    // Queued ahead of the first continuation
    let canceler = it.clone();
    queue.dispatch(move || {
        canceler.cancel();
    });

    it.run();
    queue.run_until_idle();

    assert_eq!(entries(&log), vec!["a_", "b_"]);
    assert!(it.is_canceled());
    assert_eq!(it.cursor(), 2);
    assert_eq!(canceled.load(Ordering::SeqCst), 1);

    // Terminal is absorbing
    it.run();
    assert!(!it.cancel());
    assert_eq!(entries(&log), vec!["a_", "b_"]);
    assert_eq!(canceled.load(Ordering::SeqCst), 1);
}

#[test]
fn test_multiple_iterators_interleave_fifo() {
    let queue = Arc::new(RunQueue::new("shared"));
    let log = new_log();
    let r1 = vec!["a", "b", "c"]
        .quantize_by_count(2, append(&log))
        .unwrap()
        .with_executor(queue.clone())
        .unwrap();
    let r2 = vec!["1", "2", "3"]
        .quantize_by_count(1, append(&log))
        .unwrap()
        .with_executor(queue.clone())
        .unwrap();

    r1.run();
    r2.run();
    queue.run_until_idle();

    assert_eq!(entries(&log), vec!["a_", "b_", "1_", "c_", "2_", "3_"]);
    assert!(r1.is_done());
    assert!(r2.is_done());
}

#[test]
#[serial]
fn test_default_executor_is_main_queue() {
    let log = new_log();
    let it = vec!["a", "b", "c"].quantize_by_count(1, append(&log)).unwrap();

    it.run();
    RunQueue::main().run_until_idle();

    assert_eq!(entries(&log), vec!["a_", "b_", "c_"]);
    assert!(it.is_done());
}

// =============================================================================
// Time-budget pacing
// =============================================================================

#[test]
fn test_one_big_budget_runs_synchronously() {
    let log = new_log();
    let it = vec!["a", "b", "c"].quantize_by_time(Duration::from_secs(1), append(&log));

    it.run();

    assert_eq!(entries(&log), vec!["a_", "b_", "c_"]);
    assert!(it.is_done());
}

#[test]
fn test_short_budget() {
    let queue = Arc::new(RunQueue::new("test"));
    let log = new_log();
    let it = vec!["a", "b", "c"]
        .quantize_by_time(Duration::ZERO, append(&log))
        .with_executor(queue.clone())
        .unwrap();
    let (done, on_done) = counter();
    it.on_done(on_done);

    it.run();
    queue.run_until_idle();

    assert_eq!(entries(&log), vec!["a_", "b_", "c_"]);
    assert_eq!(it.quanta(), 3);
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[test]
fn test_short_budget_and_cancel() {
    let queue = Arc::new(RunQueue::new("test"));
    let log = new_log();
    let it = vec!["a", "b", "c"]
        .quantize_by_time(Duration::ZERO, append(&log))
        .with_executor(queue.clone())
        .unwrap();
    let (canceled, on_cancel) = counter();
    it.on_cancel(on_cancel);

    let canceler = it.clone();
    queue.dispatch(move || {
        canceler.cancel();
    });

    it.run();
    queue.run_until_idle();

    assert_eq!(entries(&log), vec!["a_"]);
    assert_eq!(it.state(), LoopState::Canceled);
    assert_eq!(canceled.load(Ordering::SeqCst), 1);
}

#[test]
fn test_mixed_budget_and_step() {
    let queue = Arc::new(RunQueue::new("shared"));
    let log = new_log();
    let r1 = vec!["a", "b", "c"]
        .quantize_by_time(Duration::ZERO, append(&log))
        .with_executor(queue.clone())
        .unwrap();
    let r2 = vec!["1", "2", "3"]
        .quantize_by_count(2, append(&log))
        .unwrap()
        .with_executor(queue.clone())
        .unwrap();

    r1.run();
    r2.run();
    queue.run_until_idle();

    assert_eq!(entries(&log), vec!["a_", "1_", "2_", "b_", "3_", "c_"]);
}

#[test]
fn test_budget_expires_mid_sequence() {
    let queue = Arc::new(RunQueue::new("test"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let items: Vec<usize> = (0..20).collect();
    let it = items
        .quantize_by_time(Duration::from_millis(20), move |n: &usize| {
            std::thread::sleep(Duration::from_millis(2));
            s.lock().unwrap().push(*n);
        })
        .with_executor(queue.clone())
        .unwrap();

    // Record how many elements each quantum handled
    it.run();
    let mut sizes = vec![it.cursor()];
    loop {
        let before = it.cursor();
        if !queue.run_next() {
            break;
        }
        sizes.push(it.cursor() - before);
    }

    assert!(it.is_done());
    assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
    assert_eq!(sizes.iter().sum::<usize>(), 20);
    assert_eq!(it.quanta() as usize, sizes.len());
    assert!(sizes.iter().all(|&size| size >= 1), "sizes: {:?}", sizes);
    // Each sleep lasts at least 2ms, so no quantum can exceed 10 elements
    assert!(sizes.iter().all(|&size| size <= 10), "sizes: {:?}", sizes);
    assert!(it.quanta() > 1);
    assert!(it.quanta() < 20, "sizes: {:?}", sizes);
}

// =============================================================================
// Dedicated worker thread
// =============================================================================

#[test]
fn test_multiple_steps_on_serial_queue() {
    let queue = Arc::new(SerialQueue::new("test").unwrap());
    let log = new_log();
    let it = vec!["a", "b", "c"]
        .quantize_by_count(1, append(&log))
        .unwrap()
        .with_executor(queue.clone())
        .unwrap();
    let (tx, rx) = mpsc::channel();
    it.on_done(move || {
        let name = std::thread::current().name().map(str::to_string);
        tx.send(name).unwrap();
    });

    it.run();

    // The last quantum runs on the worker, so on_done does too
    let thread = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(thread.as_deref(), Some("test"));
    assert_eq!(entries(&log), vec!["a_", "b_", "c_"]);
}

#[test]
fn test_multiple_iterators_on_serial_queue() {
    let queue = Arc::new(SerialQueue::new("shared").unwrap());
    let log = new_log();
    let r1 = vec!["a", "b", "c"]
        .quantize_by_count(2, append(&log))
        .unwrap()
        .with_executor(queue.clone())
        .unwrap();
    let r2 = vec!["1", "2", "3"]
        .quantize_by_count(1, append(&log))
        .unwrap()
        .with_executor(queue.clone())
        .unwrap();
    let (tx, rx) = mpsc::channel();
    r2.on_done(move || tx.send(()).unwrap());

    // Start both on the worker so the interleaving is deterministic
    let (s1, s2) = (r1.clone(), r2.clone());
    queue
        .dispatch(move || {
            s1.run();
            s2.run();
        })
        .unwrap();

    rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(entries(&log), vec!["a_", "b_", "1_", "c_", "2_", "3_"]);
}

#[test]
fn test_cancel_race_resolves_to_exactly_one_terminal_state() {
    for _ in 0..50 {
        let queue = Arc::new(SerialQueue::new("race").unwrap());
        let it = (0..200u32)
            .collect::<Vec<_>>()
            .quantize_by_count(7, |_| {})
            .unwrap()
            .with_executor(queue.clone())
            .unwrap();
        let (tx, rx) = mpsc::channel();
        let done_tx = tx.clone();
        it.on_done(move || done_tx.send(LoopState::Done).unwrap());
        it.on_cancel(move || tx.send(LoopState::Canceled).unwrap());

        let first = it.clone();
        queue.dispatch(move || first.run()).unwrap();
        let canceled = it.cancel();

        let state = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(canceled, state == LoopState::Canceled);
        assert_eq!(it.state(), state);
        drop(queue);
        // No second terminal callback
        assert!(rx.recv_timeout(Duration::from_millis(10)).is_err());
    }
}

// =============================================================================
// Tokio executor
// =============================================================================

#[tokio::test]
async fn test_tokio_executor_completes_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let l = Arc::clone(&log);
    let it = (0..100u32)
        .collect::<Vec<_>>()
        .quantize_by_count(8, move |n| l.lock().unwrap().push(*n))
        .unwrap()
        .with_executor(Arc::new(TokioExecutor::current().unwrap()))
        .unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();
    it.on_done(move || {
        let _ = tx.send(());
    });

    it.run();
    tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("iterator should finish")
        .unwrap();

    assert_eq!(*log.lock().unwrap(), (0..100).collect::<Vec<_>>());
    assert_eq!(it.quanta(), 13);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_cancel_from_another_task() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (reached_tx, reached_rx) = tokio::sync::oneshot::channel();
    let (proceed_tx, proceed_rx) = mpsc::channel::<()>();
    let mut reached_tx = Some(reached_tx);

    let l = Arc::clone(&log);
    let it = (0..10_000u32)
        .collect::<Vec<_>>()
        .quantize_by_count(1, move |n| {
            l.lock().unwrap().push(*n);
            // Park the quantum holding element 5 until the test has canceled
            if *n == 5
                && let Some(tx) = reached_tx.take()
            {
                let _ = tx.send(());
                let _ = proceed_rx.recv_timeout(Duration::from_secs(5));
            }
        })
        .unwrap()
        .with_executor(Arc::new(TokioExecutor::current().unwrap()))
        .unwrap();
    it.on_done(|| panic!("done must not fire"));
    let (canceled, on_cancel) = counter();
    it.on_cancel(on_cancel);

    it.run();
    reached_rx.await.unwrap();

    let canceler = it.clone();
    assert!(tokio::spawn(async move { canceler.cancel() }).await.unwrap());
    assert_eq!(canceled.load(Ordering::SeqCst), 1);
    proceed_tx.send(()).unwrap();

    // The in-flight quantum finishes element 5 and stops
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*log.lock().unwrap(), (0..=5).collect::<Vec<_>>());
    assert_eq!(it.cursor(), 6);

    it.run();
    assert_eq!(log.lock().unwrap().len(), 6);
    assert!(it.is_canceled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tokio_independent_iterators_keep_their_order() {
    let executor = Arc::new(TokioExecutor::current().unwrap());
    let mut waits = Vec::new();
    let mut logs = Vec::new();
    let mut iterators: Vec<QuantizedIterator<Vec<u32>>> = Vec::new();

    for _ in 0..4 {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let it = (0..500u32)
            .collect::<Vec<_>>()
            .quantize_by_count(3, move |n| l.lock().unwrap().push(*n))
            .unwrap()
            .with_executor(executor.clone())
            .unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        it.on_done(move || {
            let _ = tx.send(());
        });
        waits.push(rx);
        logs.push(log);
        iterators.push(it);
    }

    for it in &iterators {
        it.run();
    }
    for rx in waits {
        tokio::time::timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
    }

    for log in logs {
        assert_eq!(*log.lock().unwrap(), (0..500).collect::<Vec<_>>());
    }
}
