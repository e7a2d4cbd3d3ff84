//! Error types for page-body extraction.

use thiserror::Error;

/// Errors raised while locating data inside a fetched page body.
///
/// All variants are retryable from the pipeline's point of view: a missing
/// element is usually a truncated or momentarily malformed response rather
/// than a permanent site change.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The page body contains no resource reference.
    #[error("no resource reference found in page body")]
    MissingResource,

    /// The page body contains no page-count indicator.
    #[error("no page-count indicator found in page body")]
    MissingPageCount,

    /// The series page contains no chapter listing.
    #[error("no chapter listing found in series page")]
    MissingChapterList,

    /// A value was present but not parseable as a number.
    #[error("unparseable {field} value: {value:?}")]
    Unparseable {
        /// Which field failed to parse.
        field: &'static str,
        /// The offending text.
        value: String,
    },

    /// A CSS selector failed to compile.
    #[error("invalid selector: {0}")]
    Selector(String),
}
