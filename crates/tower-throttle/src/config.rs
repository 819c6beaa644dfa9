use crate::events::RateLimiterEvent;
use std::time::Duration;
use tower_throttle_core::{EventListeners, FnListener};

/// Which pricing policy the limiter applies to permits stored while idle.
#[derive(Debug, Clone, Default)]
pub enum ThrottleMode {
    /// Stored permits are free to redeem: after idle time the service
    /// absorbs a burst of up to one second of unused rate, then settles
    /// back to steady pacing.
    #[default]
    Bursty,
    /// Stored permits carry a surcharge that decays as they are consumed,
    /// ramping a cold service up to its full rate over `warmup_period`.
    WarmingUp {
        /// Time the limiter takes to go from fully cold to full rate (and,
        /// when idle, back again).
        warmup_period: Duration,
        /// Multiple of the stable interval a permit costs when fully cold.
        /// Must be at least `1.0`.
        cold_factor: f64,
    },
}

/// Configuration for the throttle layer.
pub struct ThrottleConfig {
    pub(crate) permits_per_second: f64,
    pub(crate) mode: ThrottleMode,
    pub(crate) permits_per_call: usize,
    pub(crate) timeout: Option<Duration>,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) name: String,
}

impl ThrottleConfig {
    /// Creates a builder with default settings.
    pub fn builder() -> ThrottleConfigBuilder {
        ThrottleConfigBuilder::new()
    }
}

/// Builder for [`ThrottleConfig`].
pub struct ThrottleConfigBuilder {
    permits_per_second: f64,
    mode: ThrottleMode,
    permits_per_call: usize,
    timeout: Option<Duration>,
    event_listeners: EventListeners<RateLimiterEvent>,
    name: String,
}

impl Default for ThrottleConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ThrottleConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - permits_per_second: 50.0
    /// - mode: bursty
    /// - permits_per_call: 1
    /// - timeout: 100ms
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            permits_per_second: 50.0,
            mode: ThrottleMode::default(),
            permits_per_call: 1,
            timeout: Some(Duration::from_millis(100)),
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the stable rate in permits per second.
    ///
    /// This is the long-run mean rate at which calls pass through the
    /// layer, independent of the burst or warm-up behavior configured via
    /// [`mode`](Self::mode).
    pub fn permits_per_second(mut self, permits_per_second: f64) -> Self {
        self.permits_per_second = permits_per_second;
        self
    }

    /// Sets the pricing policy for permits stored while idle.
    pub fn mode(mut self, mode: ThrottleMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the number of permits each call costs.
    ///
    /// Useful when requests represent batches of work: a call carrying 10
    /// items can be made to cost 10 permits.
    pub fn permits_per_call(mut self, permits: usize) -> Self {
        self.permits_per_call = permits;
        self
    }

    /// Sets how long a call may wait for its permits before being rejected.
    ///
    /// A call whose wait would exceed this timeout is rejected immediately,
    /// without consuming any future capacity.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Lets calls wait as long as their reservation requires, never
    /// rejecting.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Sets the name for this limiter instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for when permits are acquired.
    ///
    /// The callback receives the duration the call waited for its permits;
    /// zero means they were immediately available.
    pub fn on_permits_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitsAcquired { wait, .. } = event {
                f(*wait);
            }
        }));
        self
    }

    /// Registers a callback for when a call is rejected.
    ///
    /// The callback receives the timeout the call's wait would have
    /// exceeded.
    pub fn on_permits_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitsRejected { timeout, .. } = event {
                f(*timeout);
            }
        }));
        self
    }

    /// Registers a callback for when the stable rate is changed.
    pub fn on_rate_changed<F>(mut self, f: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::RateChanged {
                permits_per_second, ..
            } = event
            {
                f(*permits_per_second);
            }
        }));
        self
    }

    /// Builds the throttle layer.
    ///
    /// # Panics
    ///
    /// Panics if `permits_per_second` is not positive, `permits_per_call`
    /// is zero, or a warming-up mode carries a cold factor below `1.0`.
    pub fn build(self) -> crate::ThrottleLayer {
        if !(self.permits_per_second > 0.0) {
            panic!(
                "permits_per_second must be positive, got {}",
                self.permits_per_second
            );
        }
        if self.permits_per_call == 0 {
            panic!("permits_per_call must be at least 1");
        }
        if let ThrottleMode::WarmingUp { cold_factor, .. } = self.mode {
            if !(cold_factor >= 1.0) {
                panic!("cold_factor must be at least 1.0, got {}", cold_factor);
            }
        }

        let config = ThrottleConfig {
            permits_per_second: self.permits_per_second,
            mode: self.mode,
            permits_per_call: self.permits_per_call,
            timeout: self.timeout,
            event_listeners: self.event_listeners,
            name: self.name,
        };

        crate::ThrottleLayer::new(config)
    }
}
