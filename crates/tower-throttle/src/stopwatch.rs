//! Time source and sleeping primitive for the rate limiter.
//!
//! The limiter never reads the system clock directly. Everything it knows
//! about time comes through [`SleepingStopwatch`], which makes the permit
//! accounting fully deterministic under an injected clock.

use std::time::{Duration, Instant};

/// A monotonic microsecond clock paired with an uninterruptible sleep.
///
/// `read_micros` must be non-decreasing for the lifetime of the process.
/// `sleep_micros_uninterruptibly` must block the calling thread for at least
/// the requested duration; signal delivery or spurious wakeups must not
/// shorten it.
pub trait SleepingStopwatch: Send + Sync {
    /// Returns the elapsed time since the stopwatch origin, in microseconds.
    fn read_micros(&self) -> i64;

    /// Blocks the calling thread for at least `micros` microseconds.
    ///
    /// Non-positive values return immediately.
    fn sleep_micros_uninterruptibly(&self, micros: i64);
}

/// The default stopwatch: measures from an [`Instant`] origin and sleeps on
/// the OS clock.
#[derive(Debug)]
pub struct SystemStopwatch {
    origin: Instant,
}

impl SystemStopwatch {
    /// Creates a stopwatch whose origin is the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemStopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepingStopwatch for SystemStopwatch {
    fn read_micros(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_micros()).unwrap_or(i64::MAX)
    }

    fn sleep_micros_uninterruptibly(&self, micros: i64) {
        if micros <= 0 {
            return;
        }
        let start = Instant::now();
        let total = Duration::from_micros(micros as u64);
        // Re-wait whenever the underlying sleep wakes early.
        loop {
            let elapsed = start.elapsed();
            if elapsed >= total {
                return;
            }
            std::thread::sleep(total - elapsed);
        }
    }
}
