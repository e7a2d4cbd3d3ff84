//! Unified error type for page pipeline steps.

use thiserror::Error;

use crate::extract::ExtractError;
use crate::fetch::FetchError;
use crate::store::StoreError;

/// Any failure raised by one of the pipeline steps.
///
/// The retry policy classifies these into retryable and fatal kinds; see
/// [`classify_error`](super::classify_error).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A fetch step failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A page body could not be parsed.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Persisting the resource failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The located resource URL returned 404.
    ///
    /// The page body that referenced it was probably stale or truncated, so
    /// the whole pipeline re-runs from the page fetch.
    #[error("located resource vanished: {url}")]
    ResourceVanished {
        /// The resource URL that 404'd.
        url: String,
    },
}
