//! Rate changes on a live limiter.

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
fn committed_debt_is_paid_at_the_old_price() {
    let (stopwatch, limiter) = limiter(5.0);
    limiter.acquire();
    limiter.acquire();
    limiter.set_rate(10.0).unwrap();
    limiter.acquire();
    limiter.acquire();
    assert_events(&stopwatch, &["R0.00", "R0.20", "R0.20", "R0.10"]);
}

#[test]
fn a_full_pool_stays_full_across_a_rate_change() {
    let (stopwatch, limiter) = limiter(5.0);
    stopwatch.sleep_millis(1000);
    limiter.set_rate(10.0).unwrap();
    for _ in 0..11 {
        limiter.acquire();
    }
    limiter.acquire();

    let mut expected = vec!["U1.00".to_string()];
    expected.extend(std::iter::repeat("R0.00".to_string()).take(11));
    expected.push("R0.10".to_string());
    assert_eq!(stopwatch.take_events(), expected);
}

#[test]
fn warming_limiter_keeps_its_warmth_fraction_across_a_rate_change() {
    let stopwatch = Arc::new(FakeStopwatch::new());
    let limiter = RateLimiter::warming_up_with_stopwatch(
        stopwatch.clone(),
        2.0,
        Duration::from_millis(4000),
        3.0,
    )
    .unwrap();

    // Drain the ramp half of the pool while fully cold.
    for _ in 0..4 {
        limiter.acquire();
    }
    stopwatch.take_events();

    limiter.set_rate(4.0).unwrap();
    assert_eq!(limiter.rate(), 4.0);

    // The first acquire still pays off debt committed at the old rate; the
    // pool then sits exactly at the (rescaled) threshold, so subsequent
    // permits cost the new stable interval.
    limiter.acquire();
    limiter.acquire();
    limiter.acquire();
    assert_events(&stopwatch, &["R0.63", "R0.25", "R0.25"]);
}

#[test]
fn rejects_non_positive_and_nan_rates() {
    let (_stopwatch, limiter) = limiter(5.0);
    assert!(limiter.set_rate(-5.0).is_err());
    assert!(limiter.set_rate(0.0).is_err());
    assert!(limiter.set_rate(f64::NAN).is_err());
    assert_eq!(limiter.rate(), 5.0);
    assert!(limiter.set_rate(f64::INFINITY).is_ok());
    assert_eq!(limiter.rate(), f64::INFINITY);
}
