//! Events emitted by the throttle layer.

use std::time::{Duration, Instant};
use tower_throttle_core::ThrottleEvent;

/// Events emitted by the rate limiter for observability.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// Permits were acquired, possibly after waiting.
    PermitsAcquired {
        /// Name of the limiter instance.
        limiter_name: String,
        /// When the permits were granted.
        timestamp: Instant,
        /// How many permits the request asked for.
        permits: usize,
        /// How long the request waited for them.
        wait: Duration,
    },
    /// A permit request was rejected because its wait would exceed the
    /// configured timeout.
    PermitsRejected {
        /// Name of the limiter instance.
        limiter_name: String,
        /// When the request was declined.
        timestamp: Instant,
        /// How many permits the request asked for.
        permits: usize,
        /// The timeout the wait would have exceeded.
        timeout: Duration,
    },
    /// The stable rate was changed.
    RateChanged {
        /// Name of the limiter instance.
        limiter_name: String,
        /// When the rate changed.
        timestamp: Instant,
        /// The new stable rate.
        permits_per_second: f64,
    },
}

impl ThrottleEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::PermitsAcquired { .. } => "permits_acquired",
            RateLimiterEvent::PermitsRejected { .. } => "permits_rejected",
            RateLimiterEvent::RateChanged { .. } => "rate_changed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::PermitsAcquired { timestamp, .. }
            | RateLimiterEvent::PermitsRejected { timestamp, .. }
            | RateLimiterEvent::RateChanged { timestamp, .. } => *timestamp,
        }
    }

    fn limiter_name(&self) -> &str {
        match self {
            RateLimiterEvent::PermitsAcquired { limiter_name, .. }
            | RateLimiterEvent::PermitsRejected { limiter_name, .. }
            | RateLimiterEvent::RateChanged { limiter_name, .. } => limiter_name,
        }
    }
}
