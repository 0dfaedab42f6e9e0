//! Integration tests for the turn countdown.
//!
//! All tests run on a paused Tokio clock, so a ten second countdown
//! completes as soon as the runtime is otherwise idle.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quik_timer::{CountdownTimer, TimerConfig, TimerError, TimerState};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

/// Shared log of every tick value the sink saw.
#[derive(Clone, Default)]
struct TickLog(Arc<Mutex<Vec<u32>>>);

impl TickLog {
    fn sink(&self) -> impl FnMut(u32) + Send + 'static {
        let log = Arc::clone(&self.0);
        move |remaining| log.lock().unwrap().push(remaining)
    }

    fn values(&self) -> Vec<u32> {
        self.0.lock().unwrap().clone()
    }
}

fn short_config() -> TimerConfig {
    TimerConfig {
        time_limit: 3,
        tick_interval: Duration::from_millis(100),
    }
}

// =========================================================================
// Expiry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ticks_count_down_to_zero_then_expire() {
    let mut timer = CountdownTimer::default();
    let log = TickLog::default();
    let (tx, mut rx) = mpsc::unbounded_channel();

    timer
        .start(log.sink(), move || {
            let _ = tx.send(());
        })
        .unwrap();
    assert_eq!(timer.state(), TimerState::Running);

    rx.recv().await.expect("expiry should fire");
    assert_eq!(log.values(), vec![10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
    assert_eq!(timer.state(), TimerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_fires_exactly_once() {
    let mut timer = CountdownTimer::new(short_config());
    let fired = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&fired);

    timer
        .start(|_: u32| {}, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!timer.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_start_returns_immediately() {
    let mut timer = CountdownTimer::default();
    let before = tokio::time::Instant::now();
    timer.start(|_: u32| {}, || {}).unwrap();
    assert_eq!(tokio::time::Instant::now(), before);
    timer.reset();
}

// =========================================================================
// Reset / cancellation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reset_running_timer_prevents_expiry() {
    let mut timer = CountdownTimer::default();
    let log = TickLog::default();
    let fired = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&fired);

    timer
        .start(log.sink(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert!(timer.reset(), "reset should cancel a running countdown");
    assert_eq!(timer.state(), TimerState::Idle);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(log.values(), vec![10, 9, 8, 7]);
}

#[tokio::test(start_paused = true)]
async fn test_reset_after_expiry_reports_false() {
    let mut timer = CountdownTimer::new(short_config());
    let (tx, mut rx) = mpsc::unbounded_channel();

    timer
        .start(|_: u32| {}, move || {
            let _ = tx.send(());
        })
        .unwrap();
    rx.recv().await.unwrap();

    assert!(!timer.reset());
}

#[tokio::test(start_paused = true)]
async fn test_drop_cancels_running_countdown() {
    let fired = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&fired);
    {
        let mut timer = CountdownTimer::new(short_config());
        timer
            .start(|_: u32| {}, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

// =========================================================================
// Restart semantics
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_while_running_is_rejected() {
    let mut timer = CountdownTimer::new(short_config());
    let first = timer.start(|_: u32| {}, || {}).unwrap();
    assert_eq!(first, 1);

    let err = timer.start(|_: u32| {}, || {}).unwrap_err();
    assert_eq!(err, TimerError::AlreadyRunning);
    assert_eq!(timer.runs_started(), 1);
    timer.reset();
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_reset_begins_fresh_run() {
    let mut timer = CountdownTimer::new(short_config());
    let stale = TickLog::default();
    timer.start(stale.sink(), || {}).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(timer.reset());

    let fresh = TickLog::default();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let run = timer
        .start(fresh.sink(), move || {
            let _ = tx.send(());
        })
        .unwrap();
    assert_eq!(run, 2);

    rx.recv().await.unwrap();
    assert_eq!(stale.values(), vec![3, 2]);
    assert_eq!(fresh.values(), vec![3, 2, 1, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_expiry() {
    let mut timer = CountdownTimer::new(short_config());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let first_tx = tx.clone();
    timer
        .start(|_: u32| {}, move || {
            let _ = first_tx.send(1u64);
        })
        .unwrap();
    assert_eq!(rx.recv().await, Some(1));

    timer
        .start(|_: u32| {}, move || {
            let _ = tx.send(2u64);
        })
        .unwrap();
    assert_eq!(rx.recv().await, Some(2));
}

// =========================================================================
// Worker threads
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_tick_reaches_sink_after_reset_returns() {
    for _ in 0..20 {
        let mut timer = CountdownTimer::new(TimerConfig {
            time_limit: 50,
            tick_interval: Duration::from_millis(1),
        });
        let cancelled = Arc::new(AtomicBool::new(false));
        let late_tick = Arc::new(AtomicBool::new(false));

        let (seen_cancel, seen_late) = (Arc::clone(&cancelled), Arc::clone(&late_tick));
        timer
            .start(
                move |_: u32| {
                    if seen_cancel.load(Ordering::SeqCst) {
                        seen_late.store(true, Ordering::SeqCst);
                    }
                },
                || {},
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        if timer.reset() {
            cancelled.store(true, Ordering::SeqCst);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!late_tick.load(Ordering::SeqCst), "tick delivered after reset");
    }
}
