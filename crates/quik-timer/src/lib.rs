//! Turn countdown for Quik rooms.
//!
//! A [`CountdownTimer`] counts down from a fixed limit, reporting every
//! elapsed unit to a [`TickSink`], and fires a single expiry callback when
//! it reaches zero. One timer lives inside each room and is reused across
//! turns: the room resets it when a turn ends early and starts it again for
//! the next turn.
//!
//! # State machine
//!
//! ```text
//! Idle ──start()──→ Running ──reaches 0──→ Expired ──on_expiry()──→ Idle
//!                      │
//!                      └──reset()──→ Cancelled ──→ Idle
//! ```
//!
//! Expiry and cancellation race on a single locked transition out of
//! `Running`, so for every run exactly one of them wins: either
//! `on_expiry` runs once, or [`CountdownTimer::reset`] returns `true`.
//! Ticks are delivered under the same lock, so once `reset` has returned
//! the sink sees nothing more from that run.
//!
//! # Integration
//!
//! The countdown runs as its own Tokio task and never blocks the caller.
//! Room actors usually forward ticks and expiry into their own command
//! loop:
//!
//! ```ignore
//! let (ticks, expired) = (signals.clone(), signals.clone());
//! timer.start(
//!     move |remaining: u32| { let _ = ticks.send(Signal::Tick(remaining)); },
//!     move || { let _ = expired.send(Signal::Expired); },
//! )?;
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time;
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Countdown settings shared by every run of a timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    /// Number of units counted down per run. The first tick reports this
    /// value, the last one reports 0.
    pub time_limit: u32,
    /// Wall-clock length of one unit.
    pub tick_interval: Duration,
}

impl TimerConfig {
    /// Units per turn in a standard game.
    pub const DEFAULT_TIME_LIMIT: u32 = 10;

    /// Total wall-clock time from `start` to expiry.
    pub fn total_duration(&self) -> Duration {
        self.tick_interval * self.time_limit
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            time_limit: Self::DEFAULT_TIME_LIMIT,
            tick_interval: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors and observable state
// ---------------------------------------------------------------------------

/// Errors returned by [`CountdownTimer`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    /// `start` was called while a countdown was still running.
    #[error("countdown already running")]
    AlreadyRunning,
}

/// Externally visible timer state. `Expired` and `Cancelled` are transient
/// and report as `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
}

impl std::fmt::Display for TimerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
        }
    }
}

/// Receives one notification per elapsed unit of a countdown.
///
/// Values arrive in strictly decreasing order without gaps, ending at 0 or
/// at the point the run was cancelled. Any `FnMut(u32)` closure is a sink.
pub trait TickSink: Send + 'static {
    fn tick(&mut self, remaining: u32);
}

impl<F> TickSink for F
where
    F: FnMut(u32) + Send + 'static,
{
    fn tick(&mut self, remaining: u32) {
        self(remaining)
    }
}

/// Phase of a single run, shared between the timer and its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Expired,
    Cancelled,
}

type SharedPhase = Arc<Mutex<Phase>>;

fn lock_phase(phase: &Mutex<Phase>) -> MutexGuard<'_, Phase> {
    phase.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Moves `phase` from `Running` to `to`. Returns `false` if the run had
/// already left `Running`.
fn leave_running(phase: &Mutex<Phase>, to: Phase) -> bool {
    let mut current = lock_phase(phase);
    if *current != Phase::Running {
        return false;
    }
    *current = to;
    true
}

/// Bookkeeping for the most recent run.
struct Run {
    id: u64,
    phase: SharedPhase,
    cancel: oneshot::Sender<()>,
}

// ---------------------------------------------------------------------------
// CountdownTimer
// ---------------------------------------------------------------------------

/// Cancellable single-shot countdown. One per room.
pub struct CountdownTimer {
    config: TimerConfig,
    run: Option<Run>,
    runs_started: u64,
}

impl CountdownTimer {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            run: None,
            runs_started: 0,
        }
    }

    /// Starts a countdown on the current Tokio runtime and returns its run
    /// number (starting at 1).
    ///
    /// Returns as soon as the background task is spawned. `sink` receives
    /// `time_limit, time_limit - 1, ..., 0`, one value per
    /// `tick_interval`; after the 0 tick `on_expiry` is invoked unless the
    /// run was reset first.
    ///
    /// # Errors
    /// [`TimerError::AlreadyRunning`] if the previous run has neither
    /// expired nor been reset.
    pub fn start<S, F>(&mut self, sink: S, on_expiry: F) -> Result<u64, TimerError>
    where
        S: TickSink,
        F: FnOnce() + Send + 'static,
    {
        if self.is_running() {
            return Err(TimerError::AlreadyRunning);
        }

        self.runs_started += 1;
        let id = self.runs_started;
        let phase = Arc::new(Mutex::new(Phase::Running));
        let (cancel, cancelled) = oneshot::channel();

        tokio::spawn(count_down(
            id,
            self.config.clone(),
            Arc::clone(&phase),
            cancelled,
            sink,
            on_expiry,
        ));

        debug!(
            run = id,
            limit = self.config.time_limit,
            interval_ms = self.config.tick_interval.as_millis() as u64,
            "countdown started"
        );
        self.run = Some(Run { id, phase, cancel });
        Ok(id)
    }

    /// Cancels the running countdown, if any.
    ///
    /// Returns `true` if a running countdown was stopped before it expired;
    /// its `on_expiry` will never fire. Returns `false` when idle or when the
    /// run already expired. Safe to call any number of times.
    pub fn reset(&mut self) -> bool {
        let Some(run) = self.run.take() else {
            return false;
        };

        let won = leave_running(&run.phase, Phase::Cancelled);
        if won {
            // The task may already be past its last sleep; the phase is what
            // it checks before touching the sink or the callback.
            let _ = run.cancel.send(());
            debug!(run = run.id, "countdown cancelled");
        }
        won
    }

    pub fn state(&self) -> TimerState {
        match &self.run {
            Some(run) if *lock_phase(&run.phase) == Phase::Running => TimerState::Running,
            _ => TimerState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == TimerState::Running
    }

    /// Number of runs started over the timer's lifetime.
    pub fn runs_started(&self) -> u64 {
        self.runs_started
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        // A room torn down mid-turn must not eliminate anyone afterwards.
        self.reset();
    }
}

impl std::fmt::Debug for CountdownTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownTimer")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("runs_started", &self.runs_started)
            .finish()
    }
}

/// Body of the countdown task for one run.
async fn count_down<S, F>(
    run: u64,
    config: TimerConfig,
    phase: SharedPhase,
    mut cancelled: oneshot::Receiver<()>,
    mut sink: S,
    on_expiry: F,
) where
    S: TickSink,
    F: FnOnce(),
{
    let mut remaining = config.time_limit;
    loop {
        {
            let current = lock_phase(&phase);
            if *current != Phase::Running {
                return;
            }
            sink.tick(remaining);
        }
        trace!(run, remaining, "countdown tick");
        if remaining == 0 {
            break;
        }

        tokio::select! {
            // Either an explicit cancel or the timer being dropped.
            _ = &mut cancelled => return,
            _ = time::sleep(config.tick_interval) => {}
        }
        remaining -= 1;
    }

    if leave_running(&phase, Phase::Expired) {
        debug!(run, "countdown expired");
        on_expiry();
    }
}
