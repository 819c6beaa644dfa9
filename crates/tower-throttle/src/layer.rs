use crate::{Throttle, ThrottleConfig, ThrottleConfigBuilder};
use std::sync::Arc;
use tower::Layer;

/// A Tower [`Layer`] that paces requests through a rate limiter.
///
/// # Examples
///
/// ```
/// use tower_throttle::ThrottleConfig;
/// use tower::ServiceBuilder;
/// use std::time::Duration;
///
/// # async fn example() {
/// let throttle = ThrottleConfig::builder()
///     .permits_per_second(100.0)
///     .timeout(Duration::from_millis(250))
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(throttle)
///     .service(my_service());
/// # }
/// # fn my_service() -> impl tower::Service<String, Response = String, Error = std::io::Error> {
/// #     tower::service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) })
/// # }
/// ```
#[derive(Clone)]
pub struct ThrottleLayer {
    config: Arc<ThrottleConfig>,
}

impl ThrottleLayer {
    /// Creates a new `ThrottleLayer` with the given configuration.
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Creates a builder for the layer's configuration.
    pub fn builder() -> ThrottleConfigBuilder {
        ThrottleConfigBuilder::new()
    }
}

impl<S> Layer<S> for ThrottleLayer {
    type Service = Throttle<S>;

    fn layer(&self, service: S) -> Self::Service {
        Throttle::new(service, Arc::clone(&self.config))
    }
}
