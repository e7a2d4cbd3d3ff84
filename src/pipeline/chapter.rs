//! Chapter orchestrator: discovery fetch and page fan-out.
//!
//! Every chapter in the target range is processed concurrently, and within a
//! chapter every page pipeline runs concurrently. Nothing here bounds
//! concurrency; the fetch limiter inside the client is the only throttle, so
//! pages of chapter N+1 can be in flight while chapter N is still
//! downloading. That is safe because each page's persistence is independent
//! and idempotent.

use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use super::error::PipelineError;
use super::page::{PageContext, PageOutcome, run_page};
use super::retry::{FailureKind, RetryDecision, classify_error, retry_after_delay};
use super::task::{PageTask, SeriesSource};
use crate::fetch::Fetched;

/// Outcome of one chapter.
#[derive(Debug)]
pub enum ChapterOutcome {
    /// The discovery fetch returned 404: the chapter is not available yet.
    NotAvailable,
    /// The discovery fetch kept failing and was abandoned.
    DiscoveryAbandoned {
        /// Total discovery attempts made.
        attempts: u32,
        /// The error from the final attempt.
        error: PipelineError,
    },
    /// The chapter was discovered and its pages processed.
    Pages(Vec<PageResult>),
}

/// Terminal outcome of one page, tagged with its page number.
#[derive(Debug)]
pub struct PageResult {
    /// 1-based page number.
    pub page: u32,
    /// The pipeline outcome.
    pub outcome: PageOutcome,
}

/// One chapter's result within a run.
#[derive(Debug)]
pub struct ChapterResult {
    /// The chapter number.
    pub chapter: u32,
    /// What happened to it.
    pub outcome: ChapterOutcome,
}

/// Result of the discovery phase for one chapter.
enum Discovery {
    Count(u32),
    NotAvailable,
    Abandoned { attempts: u32, error: PipelineError },
}

/// Fans page pipelines out across a contiguous chapter range.
pub struct ChapterOrchestrator {
    ctx: PageContext,
    source: SeriesSource,
}

impl ChapterOrchestrator {
    /// Creates an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(ctx: PageContext, source: SeriesSource) -> Self {
        Self { ctx, source }
    }

    /// Processes every chapter in `initial..=end` concurrently.
    ///
    /// Results come back in chapter order regardless of completion order.
    #[instrument(skip(self))]
    pub async fn process_range(&self, initial: u32, end: u32) -> Vec<ChapterResult> {
        info!(initial, end, "processing chapter range");
        join_all((initial..=end).map(|chapter| self.process_chapter(chapter))).await
    }

    /// Discovers one chapter's page count, then runs all its page pipelines.
    #[instrument(skip(self))]
    async fn process_chapter(&self, chapter: u32) -> ChapterResult {
        let total_pages = match self.discover_page_count(chapter).await {
            Discovery::Count(total) => total,
            Discovery::NotAvailable => {
                info!(chapter, "chapter not available yet");
                return ChapterResult {
                    chapter,
                    outcome: ChapterOutcome::NotAvailable,
                };
            }
            Discovery::Abandoned { attempts, error } => {
                warn!(chapter, attempts, error = %error, "chapter discovery abandoned");
                return ChapterResult {
                    chapter,
                    outcome: ChapterOutcome::DiscoveryAbandoned { attempts, error },
                };
            }
        };

        debug!(chapter, total_pages, "fanning out page tasks");
        let tasks: Vec<PageTask> = (1..=total_pages)
            .map(|page| PageTask::new(&self.source, chapter, page))
            .collect();

        let outcomes = join_all(tasks.iter().map(|task| run_page(&self.ctx, task))).await;

        let pages = tasks
            .iter()
            .zip(outcomes)
            .map(|(task, outcome)| PageResult {
                page: task.page,
                outcome,
            })
            .collect();

        ChapterResult {
            chapter,
            outcome: ChapterOutcome::Pages(pages),
        }
    }

    /// Two-phase discovery: fetch the chapter's first page solely to learn
    /// its total page count, under the same bounded retry policy as pages.
    async fn discover_page_count(&self, chapter: u32) -> Discovery {
        let url = self.source.page_url(chapter, 1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let error = match self.discovery_attempt(&url).await {
                Ok(Some(total)) => return Discovery::Count(total),
                Ok(None) => return Discovery::NotAvailable,
                Err(e) => e,
            };

            let kind = classify_error(&error);
            let server_delay = if kind == FailureKind::RateLimited {
                retry_after_delay(&error)
            } else {
                None
            };

            match self.ctx.policy.should_retry(kind, attempt) {
                RetryDecision::Retry {
                    delay: backoff_delay,
                    attempt: next_attempt,
                } => {
                    let delay = server_delay.unwrap_or(backoff_delay);
                    info!(
                        chapter,
                        attempt = next_attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying chapter discovery"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Abandon { reason } => {
                    debug!(chapter, %reason, "not retrying discovery");
                    return Discovery::Abandoned {
                        attempts: attempt,
                        error,
                    };
                }
            }
        }
    }

    /// One discovery attempt. `Ok(None)` is a 404.
    async fn discovery_attempt(&self, url: &str) -> Result<Option<u32>, PipelineError> {
        let body = match self.ctx.client.fetch_text(url).await? {
            Fetched::Body(body) => body,
            Fetched::NotFound => return Ok(None),
        };
        let total = self.ctx.parser.page_count(&body)?;

        if !self.ctx.politeness_delay.is_zero() {
            tokio::time::sleep(self.ctx.politeness_delay).await;
        }
        Ok(Some(total))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::extract::{ExtractError, PageParser};
    use crate::fetch::{FetchClient, FetchLimiter};
    use crate::pipeline::retry::RetryPolicy;
    use crate::store::SeriesStore;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct MarkerParser;

    impl PageParser for MarkerParser {
        fn locate_resource(&self, body: &str) -> Result<String, ExtractError> {
            body.split("res:")
                .nth(1)
                .and_then(|rest| rest.split(' ').next())
                .map(std::string::ToString::to_string)
                .ok_or(ExtractError::MissingResource)
        }

        fn page_count(&self, body: &str) -> Result<u32, ExtractError> {
            body.split("count:")
                .nth(1)
                .and_then(|rest| rest.split(' ').next())
                .and_then(|n| n.parse().ok())
                .ok_or(ExtractError::MissingPageCount)
        }

        fn latest_chapter(&self, body: &str) -> Result<u32, ExtractError> {
            body.split("latest:")
                .nth(1)
                .and_then(|rest| rest.split(' ').next())
                .and_then(|n| n.parse().ok())
                .ok_or(ExtractError::MissingChapterList)
        }
    }

    fn orchestrator(tmp: &TempDir, server_uri: &str) -> ChapterOrchestrator {
        let ctx = PageContext {
            client: FetchClient::new(FetchLimiter::new(8).unwrap()),
            parser: Arc::new(MarkerParser),
            store: SeriesStore::open(tmp.path(), "Test Series", "Test").unwrap(),
            policy: RetryPolicy::new(
                2,
                Duration::from_millis(1),
                Duration::from_millis(5),
                2.0,
            ),
            politeness_delay: Duration::ZERO,
            persist: true,
        };
        ChapterOrchestrator::new(ctx, SeriesSource::new(server_uri, "/series"))
    }

    async fn mount_chapter(server: &MockServer, chapter: u32, pages: u32) {
        for page in 1..=pages {
            let resource = format!("{}/cdn/ch{chapter}-p{page}.jpg", server.uri());
            let body = format!("count:{pages} res:{resource} ");
            Mock::given(method("GET"))
                .and(path(format!("/series/{chapter}/{page}")))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(server)
                .await;
            Mock::given(method("GET"))
                .and(path(format!("/cdn/ch{chapter}-p{page}.jpg")))
                .respond_with(
                    ResponseTemplate::new(200).set_body_bytes(format!("b{page}").into_bytes()),
                )
                .mount(server)
                .await;
        }
    }

    #[tokio::test]
    async fn test_chapter_discovery_404_yields_no_tasks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series/9/1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&tmp, &server.uri());
        let results = orchestrator.process_range(9, 9).await;

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].outcome, ChapterOutcome::NotAvailable));
        // No directory for an unavailable chapter.
        assert!(!tmp.path().join("Test Series/Chapter 9").exists());
    }

    #[tokio::test]
    async fn test_chapter_fan_out_downloads_all_pages() {
        let server = MockServer::start().await;
        mount_chapter(&server, 1, 3).await;

        let tmp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&tmp, &server.uri());
        let results = orchestrator.process_range(1, 1).await;

        let ChapterOutcome::Pages(pages) = &results[0].outcome else {
            panic!("Expected Pages, got {:?}", results[0].outcome);
        };
        assert_eq!(pages.len(), 3);
        assert!(
            pages
                .iter()
                .all(|p| matches!(p.outcome, PageOutcome::Completed))
        );

        for page in 1..=3u32 {
            let file = tmp
                .path()
                .join("Test Series/Chapter 1")
                .join(format!("Test.ch1.p{page:03}.jpg"));
            assert_eq!(
                std::fs::read(&file).unwrap(),
                format!("b{page}").into_bytes(),
                "unexpected contents at {}",
                file.display()
            );
        }
    }

    #[tokio::test]
    async fn test_multiple_chapters_processed_concurrently() {
        let server = MockServer::start().await;
        mount_chapter(&server, 1, 2).await;
        mount_chapter(&server, 2, 1).await;

        let tmp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&tmp, &server.uri());
        let results = orchestrator.process_range(1, 2).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chapter, 1);
        assert_eq!(results[1].chapter, 2);
        assert!(tmp.path().join("Test Series/Chapter 1/Test.ch1.p002.jpg").exists());
        assert!(tmp.path().join("Test Series/Chapter 2/Test.ch2.p001.jpg").exists());
    }

    #[tokio::test]
    async fn test_discovery_abandoned_after_persistent_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series/5/1"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&tmp, &server.uri());
        let results = orchestrator.process_range(5, 5).await;

        match &results[0].outcome {
            ChapterOutcome::DiscoveryAbandoned { attempts, error } => {
                assert_eq!(*attempts, 2);
                assert!(error.to_string().contains("503"));
            }
            other => panic!("Expected DiscoveryAbandoned, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_short_chapter_page_404_is_missing_not_abandoned() {
        let server = MockServer::start().await;
        // Discovery claims 3 pages but page 3 is gone upstream.
        for page in 1..=2u32 {
            let resource = format!("{}/cdn/ch1-p{page}.jpg", server.uri());
            Mock::given(method("GET"))
                .and(path(format!("/series/1/{page}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(format!("count:3 res:{resource} ")),
                )
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path(format!("/cdn/ch1-p{page}.jpg")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/series/1/3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&tmp, &server.uri());
        let results = orchestrator.process_range(1, 1).await;

        let ChapterOutcome::Pages(pages) = &results[0].outcome else {
            panic!("Expected Pages");
        };
        assert!(matches!(pages[0].outcome, PageOutcome::Completed));
        assert!(matches!(pages[1].outcome, PageOutcome::Completed));
        assert!(matches!(pages[2].outcome, PageOutcome::Missing));
    }
}
