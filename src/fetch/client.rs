//! HTTP client wrapper for page and resource fetches.
//!
//! This module provides the `FetchClient` struct which issues single network
//! fetches with proper timeout configuration and error handling. The client is
//! created once per run and reused for every fetch, taking advantage of
//! connection pooling.
//!
//! Retry is deliberately not handled here; the page pipeline owns retry
//! decisions. The one piece of policy the client does own is the concurrency
//! limiter: a permit is held across the request and body read of every call,
//! and nothing else.

use std::time::Instant;

use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use tracing::{debug, instrument};
use url::Url;

use super::error::FetchError;
use super::limiter::FetchLimiter;
use crate::user_agent;

/// Connect timeout for all fetches (seconds).
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout for all fetches (seconds). Page bodies are small but resource
/// payloads can be several megabytes on slow mirrors.
const READ_TIMEOUT_SECS: u64 = 120;

/// Outcome of a fetch: either a body, or a first-class 404.
///
/// A 404 signals "this chapter or page does not exist (yet)" and is part of
/// the normal control flow, so it is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    /// Successful 2xx response with its body.
    Body(T),
    /// The remote returned 404.
    NotFound,
}

impl<T> Fetched<T> {
    /// Returns the body, or `None` for a 404.
    pub fn into_body(self) -> Option<T> {
        match self {
            Self::Body(body) => Some(body),
            Self::NotFound => None,
        }
    }
}

/// HTTP client for fetching page bodies (text) and resource payloads (bytes).
///
/// # Example
///
/// ```no_run
/// use mangagrab_core::fetch::{FetchClient, FetchLimiter, Fetched};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = FetchLimiter::new(40)?;
/// let client = FetchClient::new(limiter);
/// match client.fetch_text("https://example.com/series/42/1").await? {
///     Fetched::Body(html) => println!("{} bytes of page body", html.len()),
///     Fetched::NotFound => println!("chapter not released yet"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Client,
    limiter: FetchLimiter,
}

impl FetchClient {
    /// Creates a new fetch client with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(limiter: FetchLimiter) -> Self {
        Self::new_with_timeouts(limiter, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new fetch client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(
        limiter: FetchLimiter,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .timeout(std::time::Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_fetch_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client, limiter }
    }

    /// Returns the limiter shared by all fetches of this client.
    #[must_use]
    pub fn limiter(&self) -> &FetchLimiter {
        &self.limiter
    }

    /// Fetches a page body as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failures, timeouts, and non-2xx
    /// statuses other than 404.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_text(&self, url: &str) -> Result<Fetched<String>, FetchError> {
        let _permit = self.limiter.acquire().await?;
        let started = Instant::now();

        let Some(response) = self.send(url).await? else {
            return Ok(Fetched::NotFound);
        };
        let body = response
            .text()
            .await
            .map_err(|e| body_error(url, e))?;

        debug!(
            url,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "text fetch complete"
        );
        Ok(Fetched::Body(body))
    }

    /// Fetches a resource payload as raw bytes.
    ///
    /// The full body is read while the limiter permit is held; callers persist
    /// the bytes afterwards, outside the permit.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failures, timeouts, and non-2xx
    /// statuses other than 404.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_bytes(&self, url: &str) -> Result<Fetched<Vec<u8>>, FetchError> {
        let _permit = self.limiter.acquire().await?;
        let started = Instant::now();

        let Some(response) = self.send(url).await? else {
            return Ok(Fetched::NotFound);
        };
        let body = response
            .bytes()
            .await
            .map_err(|e| body_error(url, e))?;

        debug!(
            url,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bytes fetch complete"
        );
        Ok(Fetched::Body(body.to_vec()))
    }

    /// Issues the GET and maps the status line. `Ok(None)` is a 404.
    async fn send(&self, url: &str) -> Result<Option<reqwest::Response>, FetchError> {
        if Url::parse(url).is_err() {
            return Err(FetchError::invalid_url(url));
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url, "fetch returned 404");
            return Ok(None);
        }
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(std::string::ToString::to_string);
            return Err(FetchError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }

        Ok(Some(response))
    }
}

/// Maps a body-read failure, distinguishing timeouts from other transport errors.
fn body_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(url)
    } else {
        FetchError::network(url, error)
    }
}
