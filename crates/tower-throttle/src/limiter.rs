//! The permit accounting engine.
//!
//! A [`RateLimiter`] distributes permits at a configured rate by keeping two
//! conceptual reservoirs: permits stored during idle time, and fresh permits
//! that accrue at the stable rate going forward. A reservation of N permits
//! draws first from storage, then from the future; the cost of the future
//! portion is pushed onto `next_free_ticket_micros`, so each request pays
//! for the debt of the previous one rather than its own. That is what makes
//! the first request after an idle period cheap and the pacing exact in the
//! long run.
//!
//! All fractional bookkeeping lives in the floating-point permit counts; all
//! integer saturation lives in the microsecond timestamps.

use crate::error::{RateLimiterError, Result};
use crate::stopwatch::{SleepingStopwatch, SystemStopwatch};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Burst window applied by the bursty factories: one second of unused rate
/// may be hoarded.
const MAX_BURST_SECONDS: f64 = 1.0;

/// Cold factor applied by the warming-up factories that do not take one
/// explicitly.
const DEFAULT_COLD_FACTOR: f64 = 3.0;

/// Pricing policy for permits stored while the limiter sits idle.
#[derive(Debug)]
enum Policy {
    /// Stored permits are free to redeem, enabling bursts after idle time.
    Bursty,
    /// Stored permits get more expensive the colder the limiter is, and the
    /// surcharge decays linearly as they are consumed.
    WarmingUp {
        warmup_period_micros: f64,
        cold_factor: f64,
        /// Stored-permit level below which redemption costs the stable
        /// interval. Derived on every rate change.
        threshold_permits: f64,
        /// Extra microseconds per permit per stored permit above the
        /// threshold. Derived on every rate change.
        slope: f64,
    },
}

/// Mutex-guarded pool state. Timestamps are microseconds on the stopwatch's
/// monotonic scale.
struct PoolState {
    stable_interval_micros: f64,
    stored_permits: f64,
    max_permits: f64,
    next_free_ticket_micros: i64,
    policy: Policy,
}

impl PoolState {
    fn new(policy: Policy) -> Self {
        Self {
            stable_interval_micros: 0.0,
            stored_permits: 0.0,
            max_permits: 0.0,
            next_free_ticket_micros: 0,
            policy,
        }
    }

    fn set_rate(&mut self, permits_per_second: f64, now_micros: i64) {
        self.resync(now_micros);
        self.stable_interval_micros = MICROS_PER_SECOND / permits_per_second;
        self.on_rate_change(permits_per_second);
    }

    /// Recomputes the storage cap and rescales the stored permits for a new
    /// rate. `next_free_ticket_micros` is deliberately left untouched:
    /// already-committed debt is paid at the price it was incurred at.
    fn on_rate_change(&mut self, permits_per_second: f64) {
        let old_max_permits = self.max_permits;
        match &mut self.policy {
            Policy::Bursty => {
                self.max_permits = MAX_BURST_SECONDS * permits_per_second;
                self.stored_permits = if old_max_permits == f64::INFINITY {
                    // Recovering from an unbounded rate: grant one full burst.
                    self.max_permits
                } else if self.stored_permits == 0.0 {
                    // Guards the empty pool against 0 * inf when the new cap
                    // is unbounded.
                    0.0
                } else {
                    self.stored_permits * self.max_permits / old_max_permits
                };
            }
            Policy::WarmingUp {
                warmup_period_micros,
                cold_factor,
                threshold_permits,
                slope,
            } => {
                let stable_interval = self.stable_interval_micros;
                let cold_interval = *cold_factor * stable_interval;
                *threshold_permits = 0.5 * *warmup_period_micros / stable_interval;
                // The ramp between the threshold and the cap is sized so
                // that its trapezoid area equals the warmup period.
                let warmup_permits =
                    2.0 * *warmup_period_micros / (stable_interval + cold_interval);
                *slope = (cold_interval - stable_interval) / warmup_permits;
                self.max_permits = *threshold_permits + warmup_permits;
                self.stored_permits = if old_max_permits == 0.0 || old_max_permits == f64::INFINITY
                {
                    // Construction and recovery from an unbounded rate both
                    // start fully cold.
                    self.max_permits
                } else if self.stored_permits == 0.0 {
                    0.0
                } else {
                    self.stored_permits * self.max_permits / old_max_permits
                };
            }
        }
    }

    /// Brings the pool up to date with the current instant: idle time since
    /// `next_free_ticket_micros` is converted into stored permits, capped at
    /// `max_permits`.
    fn resync(&mut self, now_micros: i64) {
        if now_micros > self.next_free_ticket_micros {
            let new_permits = (now_micros - self.next_free_ticket_micros) as f64
                / self.cool_down_interval_micros();
            self.stored_permits = self.max_permits.min(self.stored_permits + new_permits);
            self.next_free_ticket_micros = now_micros;
        }
    }

    /// Microseconds of idle time it takes to earn one stored permit.
    fn cool_down_interval_micros(&self) -> f64 {
        match &self.policy {
            Policy::Bursty => self.stable_interval_micros,
            Policy::WarmingUp {
                warmup_period_micros,
                ..
            } => warmup_period_micros / self.max_permits,
        }
    }

    /// Commits a reservation of `permits` and returns the instant at which
    /// it may begin. The caller's wait is `max(0, returned - now)`; the cost
    /// of the reservation itself is pushed onto `next_free_ticket_micros`.
    fn reserve_earliest_available(&mut self, permits: f64, now_micros: i64) -> i64 {
        self.resync(now_micros);
        let return_value = self.next_free_ticket_micros;
        let stored_permits_to_spend = permits.min(self.stored_permits);
        let fresh_permits = permits - stored_permits_to_spend;
        let wait_micros = self
            .stored_permits_to_wait_time(self.stored_permits, stored_permits_to_spend)
            + fresh_permits * self.stable_interval_micros;
        self.next_free_ticket_micros =
            saturating_add_micros(self.next_free_ticket_micros, wait_micros);
        self.stored_permits -= stored_permits_to_spend;
        return_value
    }

    /// Cost, in microseconds, of redeeming `permits_to_take` permits out of
    /// a storage level of `stored_permits`.
    fn stored_permits_to_wait_time(&self, stored_permits: f64, permits_to_take: f64) -> f64 {
        match &self.policy {
            Policy::Bursty => 0.0,
            Policy::WarmingUp {
                threshold_permits,
                slope,
                ..
            } => {
                let mut permits_to_take = permits_to_take;
                let mut micros = 0.0;
                let available_above_threshold = stored_permits - threshold_permits;
                if available_above_threshold > 0.0 {
                    let above_threshold_to_take = available_above_threshold.min(permits_to_take);
                    // Trapezoid area under the ramp, integrated from the
                    // current level down to where this request leaves it.
                    let permits_to_time =
                        |permits: f64| self.stable_interval_micros + permits * slope;
                    let length = permits_to_time(available_above_threshold)
                        + permits_to_time(available_above_threshold - above_threshold_to_take);
                    micros += above_threshold_to_take * length / 2.0;
                    permits_to_take -= above_threshold_to_take;
                }
                micros + self.stable_interval_micros * permits_to_take
            }
        }
    }

    /// The deadline predicate for timed acquisition: can a reservation made
    /// now begin within `timeout_micros`? Reads only; a `false` answer must
    /// leave no trace.
    fn can_acquire(&self, now_micros: i64, timeout_micros: i64) -> bool {
        self.next_free_ticket_micros.saturating_sub(timeout_micros) <= now_micros
    }
}

/// Adds a (possibly enormous) floating-point wait onto an integer instant,
/// clamping to the `i64` range instead of wrapping.
fn saturating_add_micros(instant_micros: i64, wait_micros: f64) -> i64 {
    instant_micros.saturating_add(wait_micros as i64)
}

/// Clamps a `Duration` onto the signed 64-bit microsecond scale.
fn duration_to_micros_saturating(duration: Duration) -> i64 {
    i64::try_from(duration.as_micros()).unwrap_or(i64::MAX)
}

fn validate_rate(permits_per_second: f64) -> Result<()> {
    if permits_per_second <= 0.0 || permits_per_second.is_nan() {
        return Err(RateLimiterError::InvalidRate {
            rate: permits_per_second,
        });
    }
    Ok(())
}

fn validate_permits(permits: usize) -> Result<()> {
    if permits == 0 {
        return Err(RateLimiterError::ZeroPermits);
    }
    Ok(())
}

/// A rate limiter that issues permits at a configured stable rate.
///
/// Two variants share the same accounting engine:
///
/// - **Bursty** ([`RateLimiter::bursty`]): up to one second of unused rate is
///   stored and may be redeemed for free, allowing short bursts after idle
///   periods while preserving the long-run rate.
/// - **Warming-up** ([`RateLimiter::warming_up`]): permits stored while idle
///   cost *more* than the stable interval to redeem, and the surcharge decays
///   linearly as they are consumed. This smoothly ramps a cold system (empty
///   caches, closed connection pools) up to its full rate.
///
/// All methods are callable through a shared reference; one internal mutex
/// serializes reservations, and sleeping always happens after it is
/// released. Blocking acquisition sleeps on the injected
/// [`SleepingStopwatch`]; the Tower layer in this crate instead commits
/// reservations via [`RateLimiter::reserve`] and waits on the async timer.
///
/// # Examples
///
/// ```
/// use tower_throttle::RateLimiter;
///
/// let limiter = RateLimiter::bursty(1000.0).unwrap();
/// let slept = limiter.acquire(); // first permit is free
/// assert_eq!(slept.as_micros(), 0);
/// limiter.acquire(); // subsequent permits pace at 1 ms
/// ```
pub struct RateLimiter {
    stopwatch: Arc<dyn SleepingStopwatch>,
    state: Mutex<PoolState>,
}

impl RateLimiter {
    /// Creates a bursty limiter with a one-second burst window.
    pub fn bursty(permits_per_second: f64) -> Result<Self> {
        Self::bursty_with_stopwatch(Arc::new(SystemStopwatch::new()), permits_per_second)
    }

    /// Creates a bursty limiter driven by the given stopwatch.
    pub fn bursty_with_stopwatch(
        stopwatch: Arc<dyn SleepingStopwatch>,
        permits_per_second: f64,
    ) -> Result<Self> {
        Self::with_policy(stopwatch, permits_per_second, Policy::Bursty)
    }

    /// Creates a warming-up limiter with the default cold factor of 3.
    pub fn warming_up(permits_per_second: f64, warmup_period: Duration) -> Result<Self> {
        Self::warming_up_with_stopwatch(
            Arc::new(SystemStopwatch::new()),
            permits_per_second,
            warmup_period,
            DEFAULT_COLD_FACTOR,
        )
    }

    /// Creates a warming-up limiter with an explicit cold factor.
    ///
    /// The cold factor is the multiple of the stable interval a permit costs
    /// when the limiter is fully cold. It must be at least `1.0`; exactly
    /// `1.0` yields a flat ramp, i.e. a stable-rate limiter whose warmup
    /// period only bounds storage.
    pub fn warming_up_with_cold_factor(
        permits_per_second: f64,
        warmup_period: Duration,
        cold_factor: f64,
    ) -> Result<Self> {
        Self::warming_up_with_stopwatch(
            Arc::new(SystemStopwatch::new()),
            permits_per_second,
            warmup_period,
            cold_factor,
        )
    }

    /// Creates a fully parameterized warming-up limiter.
    pub fn warming_up_with_stopwatch(
        stopwatch: Arc<dyn SleepingStopwatch>,
        permits_per_second: f64,
        warmup_period: Duration,
        cold_factor: f64,
    ) -> Result<Self> {
        if !(cold_factor >= 1.0) {
            return Err(RateLimiterError::InvalidColdFactor { cold_factor });
        }
        Self::with_policy(
            stopwatch,
            permits_per_second,
            Policy::WarmingUp {
                warmup_period_micros: warmup_period.as_micros() as f64,
                cold_factor,
                threshold_permits: 0.0,
                slope: 0.0,
            },
        )
    }

    fn with_policy(
        stopwatch: Arc<dyn SleepingStopwatch>,
        permits_per_second: f64,
        policy: Policy,
    ) -> Result<Self> {
        validate_rate(permits_per_second)?;
        let limiter = Self {
            stopwatch,
            state: Mutex::new(PoolState::new(policy)),
        };
        let now = limiter.stopwatch.read_micros();
        limiter.state.lock().unwrap().set_rate(permits_per_second, now);
        Ok(limiter)
    }

    /// Updates the stable rate.
    ///
    /// Stored permits rescale to keep their filled fraction; the debt of
    /// already-committed reservations is unaffected and is paid at the rate
    /// it was incurred at. `f64::INFINITY` is a legal rate.
    pub fn set_rate(&self, permits_per_second: f64) -> Result<()> {
        validate_rate(permits_per_second)?;
        let now = self.stopwatch.read_micros();
        let mut state = self.state.lock().unwrap();
        state.set_rate(permits_per_second, now);
        Ok(())
    }

    /// Returns the current stable rate in permits per second.
    pub fn rate(&self) -> f64 {
        let state = self.state.lock().unwrap();
        MICROS_PER_SECOND / state.stable_interval_micros
    }

    /// Acquires one permit, sleeping until it is available.
    ///
    /// Returns the time spent sleeping, which is zero when the permit was
    /// immediately available.
    pub fn acquire(&self) -> Duration {
        self.acquire_inner(1)
    }

    /// Acquires the given number of permits, sleeping until they are
    /// available.
    ///
    /// Asking for more permits than the rate earns in one interval does not
    /// starve the caller: the request commits immediately and the *next*
    /// caller absorbs the wait.
    pub fn acquire_many(&self, permits: usize) -> Result<Duration> {
        validate_permits(permits)?;
        Ok(self.acquire_inner(permits))
    }

    /// Acquires one permit only if it is available right now.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_inner(1, 0).is_some()
    }

    /// Acquires `permits` permits only if they are available right now.
    pub fn try_acquire_many(&self, permits: usize) -> Result<bool> {
        validate_permits(permits)?;
        Ok(self.try_acquire_inner(permits, 0).is_some())
    }

    /// Acquires one permit if it can be obtained within `timeout`, sleeping
    /// at most that long.
    pub fn try_acquire_for(&self, timeout: Duration) -> bool {
        self.try_acquire_inner(1, duration_to_micros_saturating(timeout))
            .is_some()
    }

    /// Acquires `permits` permits if they can be obtained within `timeout`.
    ///
    /// A declined request leaves the limiter untouched: no future capacity
    /// is consumed on behalf of a caller that was not willing to wait for
    /// it.
    pub fn try_acquire_many_for(&self, permits: usize, timeout: Duration) -> Result<bool> {
        validate_permits(permits)?;
        Ok(self
            .try_acquire_inner(permits, duration_to_micros_saturating(timeout))
            .is_some())
    }

    /// Commits a reservation of `permits` and returns the wait it carries,
    /// without sleeping.
    ///
    /// The reservation is spent the moment this returns; the caller is
    /// expected to wait out the returned duration on a timer of its choice.
    /// This is the primitive the async layer is built on.
    pub fn reserve(&self, permits: usize) -> Result<Duration> {
        validate_permits(permits)?;
        Ok(micros_to_duration(self.reserve_inner(permits)))
    }

    /// Commits a reservation only if it can begin within `timeout`, returning
    /// the wait it carries without sleeping.
    ///
    /// Returns `None`, with no state change, if the wait would exceed the
    /// timeout.
    pub fn try_reserve(&self, permits: usize, timeout: Duration) -> Result<Option<Duration>> {
        validate_permits(permits)?;
        Ok(self
            .try_reserve_inner(permits, duration_to_micros_saturating(timeout))
            .map(micros_to_duration))
    }

    fn acquire_inner(&self, permits: usize) -> Duration {
        let wait_micros = self.reserve_inner(permits);
        self.stopwatch.sleep_micros_uninterruptibly(wait_micros);
        micros_to_duration(wait_micros)
    }

    fn try_acquire_inner(&self, permits: usize, timeout_micros: i64) -> Option<i64> {
        let wait_micros = self.try_reserve_inner(permits, timeout_micros)?;
        self.stopwatch.sleep_micros_uninterruptibly(wait_micros);
        Some(wait_micros)
    }

    fn reserve_inner(&self, permits: usize) -> i64 {
        let now = self.stopwatch.read_micros();
        let mut state = self.state.lock().unwrap();
        let moment_available = state.reserve_earliest_available(permits as f64, now);
        moment_available.saturating_sub(now).max(0)
    }

    fn try_reserve_inner(&self, permits: usize, timeout_micros: i64) -> Option<i64> {
        let now = self.stopwatch.read_micros();
        let mut state = self.state.lock().unwrap();
        if !state.can_acquire(now, timeout_micros) {
            return None;
        }
        let moment_available = state.reserve_earliest_available(permits as f64, now);
        Some(moment_available.saturating_sub(now).max(0))
    }
}

fn micros_to_duration(micros: i64) -> Duration {
    Duration::from_micros(micros.max(0) as u64)
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.rate())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RateLimiter[stable_rate={:.1}qps]", self.rate())
    }
}
