//! Pacing behavior of the bursty limiter under a deterministic clock.

mod support;

use std::sync::Arc;
use std::time::Duration;
use support::{assert_events, FakeStopwatch};
use tower_throttle::RateLimiter;

fn limiter(rate: f64) -> (Arc<FakeStopwatch>, RateLimiter) {
    let stopwatch = Arc::new(FakeStopwatch::new());
    let limiter = RateLimiter::bursty_with_stopwatch(stopwatch.clone(), rate).unwrap();
    (stopwatch, limiter)
}

#[test]
fn paces_at_the_stable_interval() {
    let (stopwatch, limiter) = limiter(5.0);
    limiter.acquire();
    limiter.acquire();
    limiter.acquire();
    assert_events(&stopwatch, &["R0.00", "R0.20", "R0.20"]);
}

#[test]
fn elapsed_time_pays_off_committed_debt() {
    let (stopwatch, limiter) = limiter(5.0);
    limiter.acquire();
    stopwatch.sleep_millis(200);
    limiter.acquire();
    limiter.acquire();
    assert_events(&stopwatch, &["R0.00", "U0.20", "R0.00", "R0.20"]);
}

#[test]
fn storage_caps_at_one_second_of_rate() {
    let (stopwatch, limiter) = limiter(5.0);
    stopwatch.sleep_millis(1000);
    stopwatch.sleep_millis(1000); // storage is already full, this earns nothing
    for _ in 0..5 {
        limiter.acquire();
    }
    limiter.acquire();
    assert_events(
        &stopwatch,
        &[
            "U1.00", "U1.00", "R0.00", "R0.00", "R0.00", "R0.00", "R0.00", "R0.20",
        ],
    );
}

#[test]
fn oversized_request_commits_and_defers_its_cost() {
    let (stopwatch, limiter) = limiter(1.0);
    limiter.acquire_many(5).unwrap();
    limiter.acquire();
    assert_events(&stopwatch, &["R0.00", "R5.00"]);
}

#[test]
fn acquire_reports_time_slept() {
    let (_stopwatch, limiter) = limiter(5.0);
    assert_eq!(limiter.acquire(), Duration::ZERO);
    assert_eq!(limiter.acquire(), Duration::from_millis(200));
}

#[test]
fn unbounded_rate_issues_immediately_then_grants_a_finite_rate_one_burst() {
    let (stopwatch, limiter) = limiter(f64::INFINITY);
    limiter.acquire_many((i32::MAX / 4) as usize).unwrap();
    limiter.acquire_many((i32::MAX / 2) as usize).unwrap();
    limiter.acquire_many(i32::MAX as usize).unwrap();
    assert_events(&stopwatch, &["R0.00", "R0.00", "R0.00"]);

    limiter.set_rate(2.0).unwrap();
    for _ in 0..5 {
        limiter.acquire();
    }
    assert_events(
        &stopwatch,
        &["R0.00", "R0.00", "R0.00", "R0.50", "R0.50"],
    );
}

#[test]
fn returning_to_an_unbounded_rate_lifts_pacing() {
    let (stopwatch, limiter) = limiter(2.0);
    limiter.acquire();
    limiter.acquire();
    limiter.set_rate(f64::INFINITY).unwrap();
    limiter.acquire();
    limiter.acquire();
    assert_events(&stopwatch, &["R0.00", "R0.50", "R0.50", "R0.00"]);
}
