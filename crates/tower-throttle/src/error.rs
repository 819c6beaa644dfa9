//! Error types for the rate limiter.

use tower_throttle_core::ThrottleError;

/// Errors that can occur when configuring or using the rate limiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimiterError {
    /// A request asked for zero permits.
    #[error("permit requests must ask for at least one permit")]
    ZeroPermits,
    /// The requested rate was zero, negative, or NaN.
    #[error("rate must be a positive number of permits per second, got {rate}")]
    InvalidRate {
        /// The rejected rate.
        rate: f64,
    },
    /// The cold factor was below one, or NaN.
    #[error("cold factor must be at least 1.0, got {cold_factor}")]
    InvalidColdFactor {
        /// The rejected cold factor.
        cold_factor: f64,
    },
    /// No permit became available within the configured timeout.
    #[error("rate limit exceeded")]
    RateLimitExceeded,
}

/// Result type for rate limiter operations.
pub type Result<T> = std::result::Result<T, RateLimiterError>;

impl<E> From<RateLimiterError> for ThrottleError<E> {
    fn from(err: RateLimiterError) -> Self {
        match err {
            RateLimiterError::RateLimitExceeded => ThrottleError::RateLimited { retry_after: None },
            other => ThrottleError::InvalidConfig {
                message: other.to_string(),
            },
        }
    }
}
