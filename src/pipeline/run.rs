//! Run driver: resume computation, end-chapter discovery, and reporting.
//!
//! The driver is the only place that reads the chapter state store, and it
//! does so exactly once, before any task launches. Startup failures (store
//! scan, latest-chapter probe) abort the run before any page task exists.

use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::chapter::{ChapterOrchestrator, ChapterOutcome, ChapterResult};
use super::page::{PageContext, PageOutcome};
use super::task::SeriesSource;
use crate::extract::ExtractError;
use crate::fetch::{FetchError, Fetched};
use crate::store::StoreError;

/// Errors that abort a run before any page task launches.
#[derive(Debug, Error)]
pub enum RunError {
    /// The chapter state store could not be read.
    #[error("store scan failed: {0}")]
    Store(#[from] StoreError),

    /// The latest-chapter probe failed at the network level.
    #[error("latest-chapter probe failed: {0}")]
    Probe(#[from] FetchError),

    /// The series page was fetched but the chapter listing was unusable.
    #[error("latest-chapter probe failed: {0}")]
    ProbeParse(#[from] ExtractError),

    /// The series page itself returned 404.
    #[error("series page not found: {url}")]
    SeriesNotFound {
        /// The probed URL.
        url: String,
    },

    /// Writing the run report to the series log failed.
    #[error("run log write failed: {0}")]
    Log(StoreError),
}

/// A page abandoned after exhausting its retry budget.
#[derive(Debug, Clone, Serialize)]
pub struct AbandonedPage {
    /// The chapter the page belongs to.
    pub chapter: u32,
    /// The page number.
    pub page: u32,
    /// Display form of the last error.
    pub last_error: String,
}

/// Summary of one run, printed to the user and appended to the series log.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// First chapter in the processed range (the resume point).
    pub initial_chapter: u32,
    /// Last chapter in the processed range.
    pub end_chapter: u32,
    /// Pages fetched and persisted during this run.
    pub pages_completed: usize,
    /// Pages skipped because their file already existed.
    pub pages_already_present: usize,
    /// Pages that returned 404 (chapter shorter than assumed).
    pub pages_missing: usize,
    /// Chapters whose discovery fetch returned 404.
    pub missing_chapters: Vec<u32>,
    /// Chapters whose discovery fetch was abandoned, with the last error.
    pub abandoned_discoveries: Vec<AbandonedPage>,
    /// Pages abandoned after exhausting retries.
    pub abandoned_pages: Vec<AbandonedPage>,
    /// Total wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Returns true if the run had nothing to do (store already current).
    #[must_use]
    pub fn nothing_new(&self) -> bool {
        self.initial_chapter == self.end_chapter && self.pages_completed == 0
    }

    fn empty(initial: u32, end: u32, elapsed: Duration) -> Self {
        Self {
            initial_chapter: initial,
            end_chapter: end,
            pages_completed: 0,
            pages_already_present: 0,
            pages_missing: 0,
            missing_chapters: Vec::new(),
            abandoned_discoveries: Vec::new(),
            abandoned_pages: Vec::new(),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Where the end of the chapter range comes from.
#[derive(Debug, Clone, Copy)]
pub enum EndChapter {
    /// Probe the series page for the newest chapter.
    Discover,
    /// Caller-supplied chapter number.
    Fixed(u32),
}

/// Drives one complete run for one series.
pub struct RunDriver {
    ctx: PageContext,
    source: SeriesSource,
    end: EndChapter,
}

impl RunDriver {
    /// Creates a driver over the shared pipeline context.
    #[must_use]
    pub fn new(ctx: PageContext, source: SeriesSource, end: EndChapter) -> Self {
        Self { ctx, source, end }
    }

    /// Executes the run and returns its report.
    ///
    /// The report is also appended as one JSON line to the series log, even
    /// when tasks were abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] only for startup failures; per-task failures are
    /// reported inside the [`RunReport`].
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let started = Instant::now();

        let initial = self.ctx.store.last_completed_chapter()?;
        let store_empty = !self.ctx.store.has_chapters()?;
        let resume_page = self.ctx.store.last_completed_page(initial)?;
        info!(
            initial_chapter = initial,
            resume_page, store_empty, "resume state recovered"
        );

        let end = match self.end {
            EndChapter::Fixed(chapter) => chapter,
            EndChapter::Discover => self.discover_end_chapter().await?,
        };

        // A fresh store reports chapter 1 as its resume point without having
        // downloaded anything, so the equality short-circuit only applies
        // once at least one chapter directory exists.
        if initial == end && !store_empty {
            info!(chapter = initial, "no new chapters");
            let report = RunReport::empty(initial, end, started.elapsed());
            self.append_log(&report).await?;
            return Ok(report);
        }

        let orchestrator =
            ChapterOrchestrator::new(self.ctx.clone(), self.source.clone());
        let results = orchestrator.process_range(initial, end).await;

        let mut report = reduce(initial, end, results);
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        self.append_log(&report).await?;
        Ok(report)
    }

    /// Probes the series page for the newest available chapter.
    async fn discover_end_chapter(&self) -> Result<u32, RunError> {
        let url = self.source.series_url();
        let body = match self.ctx.client.fetch_text(&url).await? {
            Fetched::Body(body) => body,
            Fetched::NotFound => return Err(RunError::SeriesNotFound { url }),
        };
        let latest = self.ctx.parser.latest_chapter(&body)?;
        info!(latest, "latest chapter discovered");
        Ok(latest)
    }

    async fn append_log(&self, report: &RunReport) -> Result<(), RunError> {
        let json = serde_json::to_string(report).unwrap_or_else(|e| {
            warn!(error = %e, "report serialization failed");
            String::from("{}")
        });
        self.ctx
            .store
            .append_run_log(&json)
            .await
            .map_err(RunError::Log)
    }
}

/// Folds per-chapter results into the run report.
fn reduce(initial: u32, end: u32, results: Vec<ChapterResult>) -> RunReport {
    let mut report = RunReport::empty(initial, end, Duration::ZERO);

    for result in results {
        match result.outcome {
            ChapterOutcome::NotAvailable => report.missing_chapters.push(result.chapter),
            ChapterOutcome::DiscoveryAbandoned { error, .. } => {
                report.abandoned_discoveries.push(AbandonedPage {
                    chapter: result.chapter,
                    page: 1,
                    last_error: error.to_string(),
                });
            }
            ChapterOutcome::Pages(pages) => {
                for page in pages {
                    match page.outcome {
                        PageOutcome::Completed => report.pages_completed += 1,
                        PageOutcome::AlreadyPresent => report.pages_already_present += 1,
                        PageOutcome::Missing => report.pages_missing += 1,
                        PageOutcome::Abandoned { error, .. } => {
                            report.abandoned_pages.push(AbandonedPage {
                                chapter: result.chapter,
                                page: page.page,
                                last_error: error.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    report
}
