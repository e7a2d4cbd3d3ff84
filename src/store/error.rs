//! Error types for the local store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by store scans and resource persistence.
///
/// Disk failures are fatal for the task that hit them; the pipeline never
/// retries a `StoreError`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system error (create directory, write, scan, etc.)
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
