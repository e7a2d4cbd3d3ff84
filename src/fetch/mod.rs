//! Network fetch boundary: shared HTTP client and concurrency limiter.
//!
//! This module provides:
//! - [`FetchClient`] - pooled HTTP client with text and bytes fetch variants
//! - [`FetchLimiter`] - counting semaphore bounding in-flight network calls
//! - [`Fetched`] - fetch outcome distinguishing a body from a first-class 404
//! - [`FetchError`] - transport and status error taxonomy

mod client;
mod error;
mod limiter;

pub use client::{FetchClient, Fetched};
pub use error::FetchError;
pub use limiter::{DEFAULT_CONCURRENCY, FetchLimiter, InvalidConcurrency};
