//! Page pipeline: the per-page download state machine.
//!
//! One invocation drives a single page through
//! fetch page → locate resource → fetch resource → persist,
//! re-entering from the page fetch on any retryable failure. The bounded
//! retry loop lives here; each terminal outcome is returned as a value and
//! reduced by the chapter orchestrator.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::error::PipelineError;
use super::retry::{FailureKind, RetryDecision, RetryPolicy, classify_error, retry_after_delay};
use super::task::PageTask;
use crate::extract::PageParser;
use crate::fetch::{FetchClient, Fetched};
use crate::store::{SeriesStore, layout};

/// Shared per-run collaborators for page pipelines.
///
/// Cloned into every spawned page task; all members are cheap handles.
#[derive(Clone)]
pub struct PageContext {
    /// Shared fetch client (carries the concurrency limiter).
    pub client: FetchClient,
    /// Site parser for page bodies.
    pub parser: Arc<dyn PageParser>,
    /// Destination store.
    pub store: SeriesStore,
    /// Bounded retry policy.
    pub policy: RetryPolicy,
    /// Cooperative delay after each page-body parse. Zero disables.
    pub politeness_delay: Duration,
    /// When false (dry run), resource fetch and persist are skipped.
    pub persist: bool,
}

/// Terminal outcome of one page pipeline.
#[derive(Debug)]
pub enum PageOutcome {
    /// The resource was fetched and persisted during this run.
    Completed,
    /// The resource was already on disk; nothing was fetched.
    AlreadyPresent,
    /// The page returned 404: the chapter has fewer pages than assumed.
    Missing,
    /// All attempts failed; the last error is retained for reporting.
    Abandoned {
        /// Total attempts made.
        attempts: u32,
        /// The error from the final attempt.
        error: PipelineError,
    },
}

/// Result of one non-terminal pipeline attempt.
enum Attempt {
    Done,
    Missing,
}

/// Runs the pipeline for one page to a terminal outcome.
///
/// Never returns an error: every failure mode is an outcome value.
#[instrument(skip(ctx, task), fields(chapter = task.chapter, page = task.page))]
pub async fn run_page(ctx: &PageContext, task: &PageTask) -> PageOutcome {
    // Resume short-circuit: a persisted file is proof of prior completion.
    match ctx.store.page_exists(task.chapter, task.page).await {
        Ok(true) => {
            debug!("resource already persisted, skipping");
            return PageOutcome::AlreadyPresent;
        }
        Ok(false) => {}
        Err(e) => {
            warn!(error = %e, "store probe failed");
            return PageOutcome::Abandoned {
                attempts: 0,
                error: e.into(),
            };
        }
    }

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        debug!(attempt, "attempting page");

        let error = match attempt_page(ctx, task).await {
            Ok(Attempt::Done) => {
                info!(attempt, "page complete");
                return PageOutcome::Completed;
            }
            Ok(Attempt::Missing) => {
                debug!("page not present upstream");
                return PageOutcome::Missing;
            }
            Err(e) => e,
        };

        let kind = classify_error(&error);
        let server_delay = if kind == FailureKind::RateLimited {
            retry_after_delay(&error)
        } else {
            None
        };

        match ctx.policy.should_retry(kind, attempt) {
            RetryDecision::Retry {
                delay: backoff_delay,
                attempt: next_attempt,
            } => {
                let delay = server_delay.unwrap_or(backoff_delay);
                info!(
                    attempt = next_attempt,
                    max_attempts = ctx.policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    using_retry_after = server_delay.is_some(),
                    error = %error,
                    "retrying page"
                );
                tokio::time::sleep(delay).await;
            }
            RetryDecision::Abandon { reason } => {
                warn!(attempts = attempt, %reason, error = %error, "abandoning page");
                return PageOutcome::Abandoned {
                    attempts: attempt,
                    error,
                };
            }
        }
    }
}

/// One pass through the pipeline states. Any `Err` re-enters from the top.
async fn attempt_page(ctx: &PageContext, task: &PageTask) -> Result<Attempt, PipelineError> {
    // FetchingPage
    let body = match ctx.client.fetch_text(&task.location).await? {
        Fetched::Body(body) => body,
        Fetched::NotFound => return Ok(Attempt::Missing),
    };

    // LocatingResource
    let resource_url = ctx.parser.locate_resource(&body)?;
    drop(body);

    if !ctx.politeness_delay.is_zero() {
        tokio::time::sleep(ctx.politeness_delay).await;
    }

    if !ctx.persist {
        debug!(resource = %resource_url, "dry run, skipping resource fetch");
        return Ok(Attempt::Done);
    }

    // FetchingResource
    let bytes = match ctx.client.fetch_bytes(&resource_url).await? {
        Fetched::Body(bytes) => bytes,
        Fetched::NotFound => {
            return Err(PipelineError::ResourceVanished { url: resource_url });
        }
    };

    // Persisting: chapter directory creation is lazy, inside the store.
    let ext = layout::extension_from_resource_url(&resource_url);
    ctx.store
        .write_resource(task.chapter, task.page, &ext, &bytes)
        .await?;

    Ok(Attempt::Done)
}
