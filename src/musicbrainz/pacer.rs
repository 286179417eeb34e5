use std::{
    fmt,
    num::NonZeroU32,
    time::{Duration, Instant},
};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::Rng;
use tokio::time::sleep;
use tracing::debug;

/// Hard upper bound for a single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Outbound requests allowed per second. MusicBrainz asks anonymous clients
/// to stay at or below one.
pub const REQUESTS_PER_SECOND: u32 = 1;

/// Budget used by [`PacerSettings::immediate`].
const UNTHROTTLED_REQUESTS_PER_SECOND: u32 = 1000;

/// Timing knobs for a [`RequestPacer`].
///
/// `min_delay`/`max_delay` bound the jittered spacing between calls,
/// `ceiling` caps the exponential backoff, and `per_second_budget` is the
/// hard request rate enforced regardless of jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacerSettings {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub ceiling: Duration,
    pub per_second_budget: u32,
}

impl PacerSettings {
    /// Creates settings with the given jitter bounds.
    ///
    /// Reversed bounds are swapped. The ceiling is [`MAX_BACKOFF`] and the
    /// budget is [`REQUESTS_PER_SECOND`].
    ///
    /// # Example
    ///
    /// ```rust
    /// let settings = PacerSettings::new(Duration::from_secs(2), Duration::from_secs(1));
    /// assert_eq!(settings.min_delay, Duration::from_secs(1));
    /// ```
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };
        Self {
            min_delay,
            max_delay,
            ceiling: MAX_BACKOFF,
            per_second_budget: REQUESTS_PER_SECOND,
        }
    }

    /// Replaces the per-second budget. Zero is treated as one.
    pub fn with_per_second_budget(mut self, budget: u32) -> Self {
        self.per_second_budget = budget.max(1);
        self
    }

    /// No jitter, no spacing and a budget high enough to never block; used
    /// where timing is irrelevant.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
            .with_per_second_budget(UNTHROTTLED_REQUESTS_PER_SECOND)
    }
}

impl Default for PacerSettings {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(2))
    }
}

/// Spacing and backoff gate in front of the external catalog service.
///
/// One pacer is shared by every lookup of a scan pass so that spacing is
/// global to the pass. Each [`wait`](Self::wait) first takes a permit from a
/// GCRA rate limiter sized by `per_second_budget`, then sleeps out whatever
/// is left of the jittered, backed-off delay since the previous call. The
/// failure streak lives only in memory.
pub struct RequestPacer {
    settings: PacerSettings,
    limiter: DefaultDirectRateLimiter,
    last_request: Option<Instant>,
    consecutive_failures: u32,
}

impl fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPacer")
            .field("settings", &self.settings)
            .field("last_request", &self.last_request)
            .field("consecutive_failures", &self.consecutive_failures)
            .finish_non_exhaustive()
    }
}

impl RequestPacer {
    pub fn new(settings: PacerSettings) -> Self {
        let budget = NonZeroU32::new(settings.per_second_budget).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(budget)),
            settings,
            last_request: None,
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Sleeps until the next outbound call is allowed.
    pub async fn wait(&mut self) {
        if self.limiter.check().is_err() {
            debug!(
                budget = self.settings.per_second_budget,
                "per-second budget exhausted"
            );
            self.limiter.until_ready().await;
        }

        let delay = self.required_delay(&mut rand::rng());
        let since_last = self.last_request.map(|at| at.elapsed());
        let pause = remaining_wait(delay, since_last);
        if !pause.is_zero() {
            debug!(
                wait_ms = pause.as_millis() as u64,
                failures = self.consecutive_failures,
                "pacing outbound request"
            );
            sleep(pause).await;
        }

        self.last_request = Some(Instant::now());
    }

    /// Jittered base delay with the current backoff applied.
    pub fn required_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let base = jittered_delay(self.settings.min_delay, self.settings.max_delay, rng);
        backoff_delay(base, self.consecutive_failures, self.settings.ceiling)
    }
}

/// Uniform draw from `[min, max]`.
pub fn jittered_delay<R: Rng + ?Sized>(min: Duration, max: Duration, rng: &mut R) -> Duration {
    if max <= min {
        return min;
    }
    let spread = (max - min).as_secs_f64();
    min + Duration::from_secs_f64(rng.random::<f64>() * spread)
}

/// Exponential backoff: `base * 2^failures`, never above `ceiling`.
///
/// # Arguments
///
/// * `base` - The un-backed-off delay, usually a [`jittered_delay`] draw
/// * `failures` - Consecutive failures so far
/// * `ceiling` - Upper bound for the result
///
/// # Returns
///
/// The backed-off delay. Overflowing shifts saturate and are then clamped.
pub fn backoff_delay(base: Duration, failures: u32, ceiling: Duration) -> Duration {
    let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(ceiling)
}

/// What is left of `delay` once `since_last` has already elapsed.
pub fn remaining_wait(delay: Duration, since_last: Option<Duration>) -> Duration {
    match since_last {
        Some(elapsed) => delay.saturating_sub(elapsed),
        None => Duration::ZERO,
    }
}
