//! Media time and wall-clock abstractions.
//!
//! Media time is counted in [`Timestamp`] ticks of 100 ns. The pacing loop
//! owns a [`VirtualClock`] that it advances by measured wall-clock deltas,
//! and measures and sleeps through a [`Clock`] so tests and offline
//! rendering can replace real time with [`ManualClock`].

use crate::constants::TICKS_PER_SECOND;
use std::{
    fmt,
    ops::{Add, Sub},
    sync::Mutex,
    time::{Duration, Instant},
};

const NANOS_PER_TICK: u128 = 100;

/// A point in media time, in 100 ns ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_ticks(ticks: i64) -> Self {
        Timestamp(ticks)
    }

    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Whole ticks contained in `duration`, truncating the sub-tick part.
    pub fn from_duration(duration: Duration) -> Self {
        Timestamp((duration.as_nanos() / NANOS_PER_TICK) as i64)
    }

    /// Media time of `frames` samples played at `sample_rate`.
    pub fn from_frames(frames: u64, sample_rate: u32) -> Self {
        if sample_rate == 0 {
            return Timestamp::ZERO;
        }
        Timestamp((frames as i128 * TICKS_PER_SECOND as i128 / sample_rate as i128) as i64)
    }

    /// Negative timestamps map to a zero duration.
    pub fn to_duration(self) -> Duration {
        if self.0 <= 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.0 as u64 * NANOS_PER_TICK as u64)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / TICKS_PER_SECOND as f64
    }

    pub fn saturating_sub(self, other: Timestamp) -> Timestamp {
        Timestamp(self.0.saturating_sub(other.0).max(0))
    }
}

impl Add for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

/// Elapsed media time of one pacing loop.
///
/// Advancing by wall-clock deltas keeps the nanoseconds that do not fill a
/// whole tick, so after any sequence of deltas the clock reads exactly
/// `floor(sum_of_deltas / 100ns)`.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Timestamp,
    residual_nanos: u128,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn advance(&mut self, elapsed: Duration) -> Timestamp {
        let nanos = self.residual_nanos + elapsed.as_nanos();
        self.residual_nanos = nanos % NANOS_PER_TICK;
        self.now = self.now + Timestamp((nanos / NANOS_PER_TICK) as i64);
        self.now
    }
}

/// Source of wall-clock time for the pacing loop.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Block the calling thread until `deadline`. Returns immediately if the
    /// deadline already passed.
    fn sleep_until(&self, deadline: Instant);

    /// Wait with nothing left to play. Always takes `duration` of real time.
    fn idle(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Real time, sleeping the session thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Clock that does not block on media deadlines: sleeping jumps straight to
/// the deadline, and every reading advances time by a fixed step. Idle waits
/// still sleep the thread, then advance the clock by the same amount.
///
/// Used for offline rendering and for deterministic tests of the loop.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
    step: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::with_step(Duration::ZERO)
    }

    pub fn with_step(step: Duration) -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            step,
        }
    }

    /// Wall time that has passed on this clock.
    pub fn elapsed(&self) -> Duration {
        *self.offset.plock()
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.plock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut offset = self.offset.plock();
        let now = self.origin + *offset;
        *offset += self.step;
        now
    }

    fn sleep_until(&self, deadline: Instant) {
        let target = deadline.saturating_duration_since(self.origin);
        let mut offset = self.offset.plock();
        if target > *offset {
            *offset = target;
        }
    }

    fn idle(&self, duration: Duration) {
        std::thread::sleep(duration);
        self.advance(duration);
    }
}

/// Lock that recovers the guard from a poisoned mutex.
pub(crate) trait PoisonlessLock<T> {
    fn plock(&self) -> std::sync::MutexGuard<'_, T>;
}

impl<T> PoisonlessLock<T> for Mutex<T> {
    fn plock(&self) -> std::sync::MutexGuard<'_, T> {
        match self.lock() {
            Ok(l) => l,
            Err(e) => e.into_inner(),
        }
    }
}
