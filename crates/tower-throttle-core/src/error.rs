//! Common error type for tower-throttle layers.
//!
//! [`ThrottleError<E>`] wraps the errors a throttled service stack can
//! produce, so callers composing the rate limiter with their own services
//! do not need to write `From` conversions by hand. The limiter layer
//! converts its rejections into [`ThrottleError::RateLimited`]; everything
//! the inner service returns is preserved in [`ThrottleError::Application`].
//!
//! ```rust
//! use tower_throttle_core::ThrottleError;
//! use std::time::Duration;
//!
//! # #[derive(Debug)]
//! # struct AppError;
//! # impl std::fmt::Display for AppError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { Ok(()) }
//! # }
//! # impl std::error::Error for AppError {}
//! fn handle_error(error: ThrottleError<AppError>) {
//!     match error {
//!         ThrottleError::RateLimited { retry_after } => {
//!             eprintln!("rate limited, retry after {:?}", retry_after);
//!         }
//!         ThrottleError::InvalidConfig { message } => {
//!             eprintln!("bad limiter configuration: {}", message);
//!         }
//!         ThrottleError::Application(app_err) => {
//!             eprintln!("application error: {}", app_err);
//!         }
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// A common error type that wraps throttle layer errors.
///
/// # Type Parameters
///
/// - `E`: The application-specific error type from the wrapped service
#[derive(Debug, Clone)]
pub enum ThrottleError<E> {
    /// The rate limiter rejected the call.
    RateLimited {
        /// How long to wait before retrying (if available)
        retry_after: Option<Duration>,
    },

    /// The limiter was constructed with invalid parameters.
    InvalidConfig {
        /// Human-readable description of the offending parameter.
        message: String,
    },

    /// The underlying application service returned an error.
    Application(E),
}

impl<E> fmt::Display for ThrottleError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleError::RateLimited { retry_after } => match retry_after {
                Some(d) => write!(f, "rate limited, retry after {:?}", d),
                None => write!(f, "rate limited"),
            },
            ThrottleError::InvalidConfig { message } => {
                write!(f, "invalid limiter configuration: {}", message)
            }
            ThrottleError::Application(e) => write!(f, "application error: {}", e),
        }
    }
}

impl<E> std::error::Error for ThrottleError<E> where E: std::error::Error {}

impl<E> ThrottleError<E> {
    /// Returns `true` if this is a rate limiter rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ThrottleError::RateLimited { .. })
    }

    /// Returns `true` if this is a configuration error.
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, ThrottleError::InvalidConfig { .. })
    }

    /// Returns `true` if this is an application error.
    pub fn is_application(&self) -> bool {
        matches!(self, ThrottleError::Application(_))
    }

    /// Extracts the application error, if this is an `Application` variant.
    pub fn application_error(self) -> Option<E> {
        match self {
            ThrottleError::Application(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the application error using a function.
    ///
    /// # Examples
    ///
    /// ```
    /// use tower_throttle_core::ThrottleError;
    ///
    /// let err: ThrottleError<String> = ThrottleError::Application("error".to_string());
    /// let mapped: ThrottleError<usize> = err.map_application(|s| s.len());
    /// assert_eq!(mapped.application_error(), Some(5));
    /// ```
    pub fn map_application<F, T>(self, f: F) -> ThrottleError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ThrottleError::RateLimited { retry_after } => ThrottleError::RateLimited { retry_after },
            ThrottleError::InvalidConfig { message } => ThrottleError::InvalidConfig { message },
            ThrottleError::Application(e) => ThrottleError::Application(f(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct TestError;

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test error")
        }
    }

    impl std::error::Error for TestError {}

    /// Compile-time assertion that ThrottleError is Send + Sync + 'static
    /// when the inner error type is Send + Sync + 'static.
    /// This is required for compatibility with tower's BoxError.
    const _: () = {
        const fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<ThrottleError<TestError>>();
    };

    #[test]
    fn test_into_box_error() {
        let err: ThrottleError<TestError> = ThrottleError::RateLimited { retry_after: None };
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        assert!(boxed.to_string().contains("rate limited"));
    }

    #[test]
    fn test_application_error_into_box_error() {
        let err: ThrottleError<TestError> = ThrottleError::Application(TestError);
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        assert!(boxed.to_string().contains("test error"));
    }

    #[test]
    fn test_retry_after_display() {
        let err: ThrottleError<TestError> = ThrottleError::RateLimited {
            retry_after: Some(Duration::from_millis(250)),
        };
        assert!(err.to_string().contains("retry after"));
    }

    #[test]
    fn test_predicates() {
        let err: ThrottleError<TestError> = ThrottleError::RateLimited { retry_after: None };
        assert!(err.is_rate_limited());
        assert!(!err.is_application());

        let err: ThrottleError<TestError> = ThrottleError::Application(TestError);
        assert!(err.is_application());
        assert!(err.application_error().is_some());
    }
}
