//! Per-step rate limiting.
//!
//! Every hardware step the polling loop may repeat (enumeration, status
//! checks, arming, cancelling) is gated by a named tick. A tick fires when
//! at least its interval has elapsed since it last fired; a tick that has
//! never fired fires immediately. Each tick also remembers the outcome of
//! the last attempt of its step, so an already-performed step can report
//! success without touching the hardware again.

use std::time::Duration;

use fingerlink_core::EngineConfig;
use tokio::time::Instant;

/// Named rate-limited steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tick {
    /// Reader enumeration.
    Reader,
    /// Open device status check.
    Status,
    /// Enrollment session start.
    Enroll,
    /// Asynchronous capture arming.
    Capture,
    /// Capture cancellation.
    Cancel,
}

impl Tick {
    pub const ALL: [Tick; 5] = [
        Tick::Reader,
        Tick::Status,
        Tick::Enroll,
        Tick::Capture,
        Tick::Cancel,
    ];

    fn index(self) -> usize {
        match self {
            Tick::Reader => 0,
            Tick::Status => 1,
            Tick::Enroll => 2,
            Tick::Capture => 3,
            Tick::Cancel => 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TickState {
    last_fired: Option<Instant>,
    interval: Duration,
    last_result: bool,
}

/// Rate limiter keyed by [`Tick`].
///
/// # Examples
///
/// ```
/// use fingerlink_acquire::tick::{Tick, TickScheduler};
/// use std::time::Duration;
///
/// let mut ticks = TickScheduler::new(Duration::from_secs(1), Duration::from_secs(5));
/// assert!(ticks.should_run(Tick::Reader));
/// assert!(!ticks.should_run(Tick::Reader));
///
/// // Independent per tick
/// assert!(ticks.should_run(Tick::Status));
/// ```
#[derive(Debug, Clone)]
pub struct TickScheduler {
    ticks: [TickState; 5],
}

impl TickScheduler {
    /// Create a scheduler where enumeration uses `reader_interval` and every
    /// other tick uses `default_interval`.
    pub fn new(reader_interval: Duration, default_interval: Duration) -> Self {
        let mut ticks = [TickState {
            last_fired: None,
            interval: default_interval,
            last_result: false,
        }; 5];
        ticks[Tick::Reader.index()].interval = reader_interval;
        Self { ticks }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.reader_poll_interval(), config.tick_interval())
    }

    /// Fire `tick` if its interval has elapsed, recording now as its last
    /// firing. Returns `false` without side effects otherwise.
    pub fn should_run(&mut self, tick: Tick) -> bool {
        self.should_run_at(tick, Instant::now())
    }

    /// [`should_run`](Self::should_run) against an explicit clock reading.
    pub fn should_run_at(&mut self, tick: Tick, now: Instant) -> bool {
        let state = &mut self.ticks[tick.index()];
        let due = match state.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= state.interval,
        };
        if due {
            state.last_fired = Some(now);
        }
        due
    }

    /// Record that the step behind `tick` just ran, restarting its interval.
    pub fn touch(&mut self, tick: Tick) {
        self.ticks[tick.index()].last_fired = Some(Instant::now());
    }

    /// Outcome of the last attempt of the step behind `tick`.
    pub fn result(&self, tick: Tick) -> bool {
        self.ticks[tick.index()].last_result
    }

    pub fn set_result(&mut self, tick: Tick, ok: bool) {
        self.ticks[tick.index()].last_result = ok;
    }

    pub fn interval(&self, tick: Tick) -> Duration {
        self.ticks[tick.index()].interval
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
