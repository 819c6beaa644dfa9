//! Smooth and warming-up rate limiting middleware for Tower services.
//!
//! This crate provides a permit-based rate limiter in two flavors, sharing
//! one accounting engine:
//!
//! - **Bursty**: unused capacity accumulates (up to one second of rate) and
//!   may be spent in a burst, after which calls settle back to steady
//!   pacing.
//! - **Warming-up**: after idle time the limiter starts *slower* than its
//!   stable rate and ramps up as permits are consumed, giving cold caches
//!   and connection pools time to fill before full load arrives.
//!
//! # Features
//!
//! - **Precise pacing**: microsecond accounting, fractional permit storage
//! - **Deadline-checked acquisition**: callers unwilling to wait are
//!   rejected without consuming capacity
//! - **Pluggable time source**: inject a [`SleepingStopwatch`] for
//!   deterministic tests
//! - **Event system**: observability through rate limiter events
//!
//! # Examples
//!
//! ```
//! use tower_throttle::ThrottleConfig;
//! use tower::ServiceBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Allow 100 requests per second, wait up to 500ms for a permit
//! let throttle = ThrottleConfig::builder()
//!     .permits_per_second(100.0)
//!     .timeout(Duration::from_millis(500))
//!     .on_permits_acquired(|wait| {
//!         println!("permit acquired after {:?}", wait);
//!     })
//!     .on_permits_rejected(|timeout| {
//!         println!("rate limited! timeout: {:?}", timeout);
//!     })
//!     .build();
//!
//! // Apply to a service
//! let service = ServiceBuilder::new()
//!     .layer(throttle)
//!     .service(tower::service_fn(|req: String| async move {
//!         Ok::<_, std::io::Error>(format!("response: {}", req))
//!     }));
//! # Ok(())
//! # }
//! ```
//!
//! The engine itself is usable without Tower: [`RateLimiter`] exposes
//! blocking [`acquire`](RateLimiter::acquire) and non-blocking
//! [`try_acquire`](RateLimiter::try_acquire) families for pacing arbitrary
//! work.

mod config;
mod error;
mod events;
mod layer;
mod limiter;
mod stopwatch;

pub use config::{ThrottleConfig, ThrottleConfigBuilder, ThrottleMode};
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;
pub use layer::ThrottleLayer;
pub use limiter::RateLimiter;
pub use stopwatch::{SleepingStopwatch, SystemStopwatch};

use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;
use tower_throttle_core::ThrottleError;

/// A Tower [`Service`] that paces requests through a [`RateLimiter`].
///
/// Each call reserves the configured number of permits before the inner
/// service runs. With a timeout configured, calls whose wait would exceed
/// it are rejected with [`ThrottleError::RateLimited`]; without one, calls
/// wait out whatever their reservation requires. Waiting happens on the
/// tokio timer, never by blocking the runtime thread.
pub struct Throttle<S> {
    inner: S,
    config: Arc<ThrottleConfig>,
    limiter: Arc<RateLimiter>,
}

impl<S> Throttle<S> {
    /// Creates a new `Throttle` wrapping the given service.
    pub fn new(inner: S, config: Arc<ThrottleConfig>) -> Self {
        let limiter = match &config.mode {
            ThrottleMode::Bursty => RateLimiter::bursty(config.permits_per_second),
            ThrottleMode::WarmingUp {
                warmup_period,
                cold_factor,
            } => RateLimiter::warming_up_with_cold_factor(
                config.permits_per_second,
                *warmup_period,
                *cold_factor,
            ),
        }
        .expect("throttle configuration was validated by the builder");

        Self {
            inner,
            config,
            limiter: Arc::new(limiter),
        }
    }

    /// Returns the limiter backing this service.
    ///
    /// Cloned services share the same limiter, so pacing applied through
    /// this handle is observed by all of them.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Updates the stable rate and notifies event listeners.
    pub fn set_rate(&self, permits_per_second: f64) -> Result<(), RateLimiterError> {
        self.limiter.set_rate(permits_per_second)?;
        let event = RateLimiterEvent::RateChanged {
            limiter_name: self.config.name.clone(),
            timestamp: Instant::now(),
            permits_per_second,
        };
        self.config.event_listeners.emit(&event);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            limiter = %self.config.name,
            permits_per_second,
            "rate changed"
        );
        Ok(())
    }
}

impl<S> Clone for Throttle<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<S, Req> Service<Req> for Throttle<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = ThrottleError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(ThrottleError::Application)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let limiter = Arc::clone(&self.limiter);
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let permits = config.permits_per_call;
            let reserved = match config.timeout {
                None => limiter.reserve(permits).map(Some),
                Some(timeout) => limiter.try_reserve(permits, timeout),
            };

            match reserved {
                Ok(Some(wait)) => {
                    if !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }

                    let event = RateLimiterEvent::PermitsAcquired {
                        limiter_name: config.name.clone(),
                        timestamp: Instant::now(),
                        permits,
                        wait,
                    };
                    config.event_listeners.emit(&event);

                    #[cfg(feature = "metrics")]
                    {
                        metrics::counter!(
                            "throttle_permits_acquired_total",
                            "limiter" => config.name.clone()
                        )
                        .increment(permits as u64);
                        metrics::histogram!(
                            "throttle_permit_wait_seconds",
                            "limiter" => config.name.clone()
                        )
                        .record(wait.as_secs_f64());
                    }

                    inner.call(req).await.map_err(ThrottleError::Application)
                }
                Ok(None) => {
                    let timeout = config.timeout.unwrap_or_default();
                    let event = RateLimiterEvent::PermitsRejected {
                        limiter_name: config.name.clone(),
                        timestamp: Instant::now(),
                        permits,
                        timeout,
                    };
                    config.event_listeners.emit(&event);

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        limiter = %config.name,
                        permits,
                        timeout_micros = timeout.as_micros() as u64,
                        "permit request rejected"
                    );

                    #[cfg(feature = "metrics")]
                    metrics::counter!(
                        "throttle_permits_rejected_total",
                        "limiter" => config.name.clone()
                    )
                    .increment(1);

                    Err(ThrottleError::RateLimited { retry_after: None })
                }
                Err(err) => Err(err.into()),
            }
        })
    }
}
