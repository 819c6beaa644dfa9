//! Shared test support: a manually driven stopwatch that records sleeps.
#![allow(dead_code)]

use std::sync::Mutex;
use tower_throttle::SleepingStopwatch;

/// A stopwatch whose time only advances when something sleeps on it.
///
/// Sleeps initiated by the limiter are recorded as `R<seconds>` events;
/// sleeps initiated by the test itself (via [`FakeStopwatch::sleep_millis`])
/// are recorded as `U<seconds>`. Durations are formatted to two decimal
/// places, rounding halves up.
pub struct FakeStopwatch {
    inner: Mutex<Inner>,
}

struct Inner {
    instant_micros: i64,
    events: Vec<String>,
}

impl FakeStopwatch {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                instant_micros: 0,
                events: Vec::new(),
            }),
        }
    }

    /// Advances the clock as the caller, recording a `U` event.
    pub fn sleep_millis(&self, millis: i64) {
        self.record("U", millis * 1_000);
    }

    /// Drains and returns the events recorded so far.
    pub fn take_events(&self) -> Vec<String> {
        let mut inner = self.inner.lock().unwrap();
        std::mem::take(&mut inner.events)
    }

    fn record(&self, caption: &str, micros: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.instant_micros += micros;
        // hundredths of a second, halves rounded up
        let centis = (micros + 5_000) / 10_000;
        inner
            .events
            .push(format!("{}{}.{:02}", caption, centis / 100, centis % 100));
    }
}

impl SleepingStopwatch for FakeStopwatch {
    fn read_micros(&self) -> i64 {
        self.inner.lock().unwrap().instant_micros
    }

    fn sleep_micros_uninterruptibly(&self, micros: i64) {
        self.record("R", micros);
    }
}

/// Asserts the events recorded since the last drain, in order.
pub fn assert_events(stopwatch: &FakeStopwatch, expected: &[&str]) {
    assert_eq!(stopwatch.take_events(), expected);
}
