//! Concurrency limiter bounding the number of in-flight network calls.
//!
//! Every [`FetchClient`](super::FetchClient) call acquires a permit before the
//! request is issued and drops it as soon as the response body has been read,
//! so only network time counts against the limit. Parsing and disk I/O run
//! outside the permit.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use super::error::FetchError;

/// Minimum allowed limiter capacity.
const MIN_CAPACITY: usize = 1;

/// Maximum allowed limiter capacity.
const MAX_CAPACITY: usize = 100;

/// Default number of concurrent fetches.
pub const DEFAULT_CONCURRENCY: usize = 40;

/// Counting semaphore shared by all fetches of a run.
///
/// Wrapped in `Arc` internally so clones share the same permit pool.
///
/// # Example
///
/// ```
/// use mangagrab_core::fetch::FetchLimiter;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = FetchLimiter::new(8)?;
/// let permit = limiter.acquire().await?;
/// // ... issue the network call ...
/// drop(permit);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FetchLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Error type for limiter construction.
#[derive(Debug, thiserror::Error)]
#[error("invalid concurrency value {value}: must be between {MIN_CAPACITY} and {MAX_CAPACITY}")]
pub struct InvalidConcurrency {
    /// The invalid value that was provided.
    pub value: usize,
}

impl FetchLimiter {
    /// Creates a limiter with the given capacity (1-100).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConcurrency`] if the value is outside the valid range.
    pub fn new(capacity: usize) -> Result<Self, InvalidConcurrency> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(InvalidConcurrency { value: capacity });
        }

        debug!(capacity, "creating fetch limiter");

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of permits currently available.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Acquires a permit, waiting if the limit is saturated.
    ///
    /// The permit is released when the returned guard is dropped (RAII).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::LimiterClosed`] if the semaphore was closed.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, FetchError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchError::LimiterClosed)
    }
}
