//! Retry delays for JWKS fetches.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Delay before the first retry.
pub const DEFAULT_BASE: Duration = Duration::from_millis(250);

/// Longest delay between retries.
pub const DEFAULT_CEILING: Duration = Duration::from_secs(4);

/// Largest fraction of the delay that jitter may add.
const JITTER_FRACTION: f64 = 0.2;

/// Source of values in `[0, 1)` used to spread retries out.
pub type JitterSource = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `ceiling`.
///
/// Attempt `0` is treated like attempt `1`. With jitter the delay grows by
/// up to 20% and is still capped at the ceiling.
#[derive(Clone)]
pub struct Backoff {
    base: Duration,
    ceiling: Duration,
    jitter: Option<JitterSource>,
}

impl Backoff {
    /// Create a policy without jitter.
    #[must_use]
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling: ceiling.max(base),
            jitter: None,
        }
    }

    /// Use `source` to add jitter to every delay.
    #[must_use]
    pub fn with_jitter(mut self, source: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        self.jitter = Some(Arc::new(source));
        self
    }

    /// Add jitter from the thread-local random generator.
    #[must_use]
    pub fn with_random_jitter(self) -> Self {
        self.with_jitter(rand::random::<f64>)
    }

    /// The smallest delay.
    #[must_use]
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// The largest delay.
    #[must_use]
    pub const fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Delay to wait before retry number `attempt`.
    #[must_use]
    pub fn duration(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let delay = 1u32
            .checked_shl(exponent)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.ceiling, |d| d.min(self.ceiling));

        match &self.jitter {
            Some(source) => {
                let sample = source();
                let sample = if sample.is_finite() {
                    sample.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                delay
                    .mul_f64(1.0 + sample * JITTER_FRACTION)
                    .min(self.ceiling)
            }
            None => delay,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, DEFAULT_CEILING)
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backoff")
            .field("base", &self.base)
            .field("ceiling", &self.ceiling)
            .field("jitter", &self.jitter.is_some())
            .finish()
    }
}

/// Delay before retry number `attempt` under the default policy, without
/// jitter.
#[must_use]
pub fn backoff_duration(attempt: u32) -> Duration {
    Backoff::default().duration(attempt)
}
