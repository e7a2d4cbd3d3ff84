//! Bounded retry with exponential backoff for transient pipeline failures.
//!
//! Every failed pipeline attempt is classified into a [`FailureKind`], and
//! the [`RetryPolicy`] decides whether to re-enter the pipeline from the page
//! fetch. Retry is a loop with an attempt counter, never recursion, so
//! abandonment is an observable outcome with the attempt count and last error
//! attached.
//!
//! # Delay Calculation
//!
//! ```text
//! delay = min(base_delay * multiplier^attempt, max_delay) + jitter
//! ```
//!
//! With defaults, delays are approximately: 1s, 2s (before hitting max
//! attempts). A 429 response with a parseable Retry-After header overrides
//! the computed backoff for that attempt.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use super::error::PipelineError;
use crate::extract::ExtractError;
use crate::fetch::FetchError;
use crate::store::StoreError;

/// Default maximum attempts (including the initial attempt).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Maximum Retry-After value (1 hour) to prevent excessive delays.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Classification of a pipeline failure for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Temporary failure that may succeed on retry.
    ///
    /// Network errors, timeouts, non-404 HTTP errors, malformed page bodies,
    /// vanished resources.
    Transient,

    /// Server rate limiting (HTTP 429). Retries, honoring Retry-After.
    RateLimited,

    /// Failure that retrying the same task cannot fix.
    ///
    /// Disk write failures and invalid URLs.
    Fatal,
}

/// Decision on whether to retry a failed pipeline attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enter the pipeline after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Abandon the task.
    Abandon {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// `max_attempts` includes the initial attempt and is clamped to at
    /// least 1.
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
            backoff_multiplier,
        }
    }

    /// Creates a policy with a custom attempt count, defaults otherwise.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry after the given failed attempt (1-indexed).
    #[must_use]
    pub fn should_retry(&self, kind: FailureKind, attempt: u32) -> RetryDecision {
        match kind {
            FailureKind::Fatal => {
                return RetryDecision::Abandon {
                    reason: "fatal failure - retry would not help".to_string(),
                };
            }
            FailureKind::Transient | FailureKind::RateLimited => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::Abandon {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Calculates the delay for a retry attempt with backoff and jitter.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);

        // attempt is 0-indexed for the exponent (attempt 1 = 2^0 = 1x base)
        let exponent = f64::from(attempt - 1);
        let delay_ms = base_ms * multiplier.powf(exponent);

        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        let jitter = self.calculate_jitter();

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            Duration::from_millis(capped_ms as u64) + jitter
        }
    }

    /// Generates random jitter between 0 and `MAX_JITTER`.
    ///
    /// Jitter spreads out retries when many pages fail simultaneously.
    fn calculate_jitter(&self) -> Duration {
        let mut rng = rand::thread_rng();
        #[allow(clippy::cast_possible_truncation)]
        let jitter_ms = rng.gen_range(0..=MAX_JITTER.as_millis() as u64);
        Duration::from_millis(jitter_ms)
    }
}

/// Classifies a pipeline error into a failure kind.
///
/// | Error | Kind | Rationale |
/// |-------|------|-----------|
/// | HTTP 429 | RateLimited | Backs off, honoring Retry-After |
/// | Other non-2xx | Transient | Server may recover |
/// | Timeout / network | Transient | Network may recover |
/// | Invalid URL | Fatal | Won't succeed |
/// | Extraction failure | Transient | Usually a truncated response |
/// | Vanished resource | Transient | Stale page body, re-fetch |
/// | Store failure | Fatal | Local disk issue |
#[must_use]
pub fn classify_error(error: &PipelineError) -> FailureKind {
    match error {
        PipelineError::Fetch(fetch) => match fetch {
            FetchError::HttpStatus { status: 429, .. } => FailureKind::RateLimited,
            FetchError::HttpStatus { .. } | FetchError::Timeout { .. } | FetchError::Network { .. } => {
                FailureKind::Transient
            }
            FetchError::InvalidUrl { .. } | FetchError::LimiterClosed => FailureKind::Fatal,
        },
        PipelineError::Extract(ExtractError::Selector(_)) => FailureKind::Fatal,
        PipelineError::Extract(_) | PipelineError::ResourceVanished { .. } => FailureKind::Transient,
        PipelineError::Store(StoreError::Io { .. }) => FailureKind::Fatal,
    }
}

/// Extracts the server-mandated delay from a rate-limited error, if any.
#[must_use]
pub fn retry_after_delay(error: &PipelineError) -> Option<Duration> {
    let PipelineError::Fetch(FetchError::HttpStatus {
        status: 429,
        retry_after: Some(header),
        ..
    }) = error
    else {
        return None;
    };
    parse_retry_after(header)
}

/// Parses a Retry-After header value into a `Duration`.
///
/// Supports both delta-seconds and HTTP-date formats (RFC 7231). Returns
/// `None` for unparseable or negative values; caps at 1 hour.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    // Delta-seconds first (most common)
    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);

        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }

        return Some(duration);
    }

    // HTTP-date
    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        let now = std::time::SystemTime::now();
        if let Ok(duration) = datetime.duration_since(now) {
            if duration > MAX_RETRY_AFTER {
                warn!(
                    delay_secs = duration.as_secs(),
                    max_secs = MAX_RETRY_AFTER.as_secs(),
                    "Retry-After date exceeds maximum, capping at 1 hour"
                );
                return Some(MAX_RETRY_AFTER);
            }
            return Some(duration);
        }
        // Date in the past: retry immediately
        return Some(Duration::ZERO);
    }

    debug!(header_value, "unparseable Retry-After value");
    None
}
