//! Retry logic with randomized increasing backoff for throttled downloads.
//!
//! Only upstream throttling (HTTP 525) is worth retrying. Every other failure
//! is permanent for the current run and is handed back to the caller.
//!
//! # Overview
//!
//! A failed attempt is classified into a [`FailureType`]. The
//! [`RetryPolicy`] then decides, from the attempt number and the delay used
//! before the failed attempt, whether to retry and how long to wait.
//! Delays never decrease from one retry to the next and never exceed the
//! configured ceiling.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use capcache_core::download::{DownloadError, FailureType, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://example.com/a.pcap", 525);
//! assert_eq!(classify_error(&error), FailureType::Throttled);
//!
//! match policy.should_retry(FailureType::Throttled, 1, Duration::ZERO) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("retrying in {delay:?} (attempt {attempt})");
//!     }
//!     RetryDecision::DoNotRetry { reason } => println!("not retrying: {reason}"),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::DownloadError;
use super::constants::{DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, THROTTLED_STATUS};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Default upper bound of the random jitter added to each delay.
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(1000);

/// Classification of a failed download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Upstream throttling; the same request may succeed later.
    Throttled,

    /// Access denied; retrying without credentials would not help.
    NeedsAuth,

    /// Anything else. Fails the fetch immediately.
    Permanent,
}

/// Decision on whether to retry a failed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the download after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the download.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior.
///
/// # Default Values
///
/// - `max_attempts`: 6 (the first attempt plus [`DEFAULT_MAX_RETRIES`])
/// - `base_delay`: 1 second
/// - `max_delay`: 32 seconds
/// - `backoff_multiplier`: 2.0
/// - `max_jitter`: 1 second
///
/// # Delay Calculation
///
/// ```text
/// first  = min(base_delay + jitter, max_delay)
/// next   = min(previous * multiplier + jitter, max_delay)
/// ```
///
/// With defaults the delays are roughly 1s, 3s, 7s, 15s, 31s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Delay before the first retry.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Multiplier applied to the previous delay (at least 1.0).
    backoff_multiplier: f32,

    /// Upper bound of the random jitter.
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES + 1,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum attempts including initial (clamped to >= 1)
    /// * `base_delay` - Delay before the first retry
    /// * `max_delay` - Maximum delay cap
    /// * `backoff_multiplier` - Growth factor (clamped to >= 1.0)
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier: backoff_multiplier.max(1.0),
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// Creates a policy allowing `max_retries` retries after the first attempt.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            ..Self::default()
        }
    }

    /// Replaces the jitter bound.
    #[must_use]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay ceiling.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Determines whether to retry a failed download.
    ///
    /// # Arguments
    ///
    /// * `failure_type` - Classification of the failure
    /// * `attempt` - The attempt number that just failed (1-indexed)
    /// * `previous_delay` - Delay slept before that attempt (`Duration::ZERO` for the first)
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(
        &self,
        failure_type: FailureType,
        attempt: u32,
        previous_delay: Duration,
    ) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::NeedsAuth => {
                return RetryDecision::DoNotRetry {
                    reason: "authorization required - retry would not help".to_string(),
                };
            }
            FailureType::Throttled => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.next_delay(previous_delay);

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Computes the delay following `previous`.
    ///
    /// Never smaller than `previous` once `previous` is within the cap, and
    /// never above `max_delay`.
    #[must_use]
    pub fn next_delay(&self, previous: Duration) -> Duration {
        let grown = if previous.is_zero() {
            self.base_delay
        } else {
            previous
                .mul_f64(f64::from(self.backoff_multiplier))
                .max(previous)
        };
        (grown + self.calculate_jitter()).min(self.max_delay)
    }

    /// Generates random jitter between 0 and `max_jitter`.
    fn calculate_jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}

/// Classifies a download error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | `HttpStatus` 525 | Throttled |
/// | `AuthRequired` | NeedsAuth |
/// | everything else | Permanent |
#[instrument]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } if *status == THROTTLED_STATUS => {
            FailureType::Throttled
        }
        DownloadError::AuthRequired { .. } => FailureType::NeedsAuth,
        _ => FailureType::Permanent,
    }
}
