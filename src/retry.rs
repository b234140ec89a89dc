use crate::error::FailureKind;
use rand::Rng;
use std::time::Duration;

/// Default number of attempts per unit (including the first one)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default pause before every attempt, before jitter
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,
    /// Pause inserted before every attempt
    pub base_delay: Duration,
    /// Upper bound of the random jitter added to `base_delay`, in seconds
    pub attempt_jitter: f64,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            attempt_jitter: 0.2,
        }
    }

    /// Set the jitter bound added before every attempt
    pub fn with_attempt_jitter(mut self, seconds: f64) -> Self {
        self.attempt_jitter = seconds.max(0.0);
        self
    }

    /// Delay before an attempt: `base_delay + random(0, attempt_jitter)`
    pub fn attempt_delay(&self) -> Duration {
        let jitter = if self.attempt_jitter > 0.0 {
            rand::thread_rng().gen_range(0.0..self.attempt_jitter)
        } else {
            0.0
        };
        self.base_delay + Duration::from_secs_f64(jitter)
    }

    /// Backoff after the failed attempt with 0-based index `attempt`
    pub fn backoff(&self, kind: FailureKind, attempt: u32) -> Duration {
        backoff_for(kind, attempt, rand::thread_rng().gen::<f64>())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

/// Backoff schedule by failure class.
///
/// `unit` is a random sample in `[0, 1)` scaled into each class's jitter range:
/// - network: `2^attempt + random(0, 1)`
/// - rate limited: `30 + random(0, 10)`, independent of the attempt number
/// - other: `2^attempt * 0.5 + random(0, 0.5)`
pub fn backoff_for(kind: FailureKind, attempt: u32, unit: f64) -> Duration {
    let unit = unit.clamp(0.0, 1.0);
    let exp = 2f64.powi(attempt.min(16) as i32);

    let seconds = match kind {
        FailureKind::Network => exp + unit,
        FailureKind::RateLimited => 30.0 + unit * 10.0,
        FailureKind::Other => exp * 0.5 + unit * 0.5,
    };

    Duration::from_secs_f64(seconds)
}
