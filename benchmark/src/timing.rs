//! Timestamps around the read loop.

use std::time::{Duration, Instant};

/// A monotonic time source. Readings are offsets from an arbitrary origin
/// fixed for the lifetime of the clock.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// [`Instant`]-backed clock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Runs `f` between two clock readings and returns its output together with
/// the elapsed time. Nothing but `f` runs inside the bracket.
pub fn timed<C, T, F>(clock: &C, f: F) -> (T, Duration)
where
    C: Clock + ?Sized,
    F: FnOnce() -> T,
{
    let start = clock.now();
    let output = f();
    let end = clock.now();
    (output, end.saturating_sub(start))
}

/// Milliseconds with the sub-millisecond part kept.
pub fn as_millis_f64(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}
