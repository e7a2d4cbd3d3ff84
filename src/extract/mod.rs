//! Page-body extraction: the seam between the pipeline and site markup.
//!
//! The pipeline consumes page bodies through the [`PageParser`] trait and
//! never touches HTML itself. [`MangaReaderParser`] is the concrete
//! implementation for the mangareader page structure; tests substitute
//! simpler implementations.

mod error;
mod mangareader;

pub use error::ExtractError;
pub use mangareader::MangaReaderParser;

/// Locates data inside fetched page bodies.
///
/// Implementations are pure parsers: no I/O, no retry, no state. Every
/// failure is an [`ExtractError`], which the pipeline treats as transient.
pub trait PageParser: Send + Sync {
    /// Returns the URL of the one downloadable resource the page embeds.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::MissingResource`] if the body has no resource
    /// reference.
    fn locate_resource(&self, body: &str) -> Result<String, ExtractError>;

    /// Returns the chapter's total page count from a first-page body.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the indicator is absent or unparseable.
    fn page_count(&self, body: &str) -> Result<u32, ExtractError>;

    /// Returns the newest available chapter number from a series page body.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the chapter listing is absent or
    /// unparseable.
    fn latest_chapter(&self, body: &str) -> Result<u32, ExtractError>;
}
