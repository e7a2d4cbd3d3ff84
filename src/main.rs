//! CLI entry point for the mangagrab tool.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mangagrab_core::{
    EndChapter, FetchClient, FetchLimiter, MangaReaderParser, PageContext, RetryPolicy, RunDriver,
    RunReport, SeriesSource, SeriesStore, catalog, store::layout,
};
use tracing::{info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Mangagrab starting");

    let limiter = FetchLimiter::new(usize::from(args.concurrency))?;
    let client = FetchClient::new(limiter);

    // Resolve the series: direct endpoint flags, or a catalog search.
    let (title, endpoint) = if let Some(endpoint) = &args.endpoint {
        let title = args
            .title
            .clone()
            .context("--endpoint requires --title")?;
        (title, endpoint.clone())
    } else {
        let query = args
            .search
            .as_deref()
            .context("either --search or --endpoint is required")?;
        let ranked = catalog::search(&client, &args.base_url, query).await?;
        for alternative in ranked.iter().skip(1).take(3) {
            info!(
                name = %alternative.entry.name,
                creator = %alternative.entry.creator,
                similarity = alternative.similarity,
                "other catalog candidate"
            );
        }
        let best = &ranked[0];
        info!(
            name = %best.entry.name,
            creator = %best.entry.creator,
            "series selected"
        );
        (best.entry.name.clone(), best.entry.endpoint.clone())
    };

    let file_stem = layout::file_stem_from_title(&title);
    let store = SeriesStore::open(&args.path, &title, &file_stem)
        .with_context(|| format!("cannot open library under {}", args.path.display()))?;
    info!(root = %store.root().display(), "library ready");

    let parser = MangaReaderParser::new()?;
    let ctx = PageContext {
        client,
        parser: Arc::new(parser),
        store,
        policy: RetryPolicy::with_max_attempts(u32::from(args.max_attempts)),
        politeness_delay: Duration::from_millis(args.delay_ms),
        persist: !args.no_download,
    };

    let source = SeriesSource::new(&args.base_url, &endpoint);
    let end = args.end_chapter.map_or(EndChapter::Discover, EndChapter::Fixed);

    let driver = RunDriver::new(ctx, source, end);
    let report = driver.run().await?;

    print_report(&report);
    Ok(())
}

/// Emits the run summary. Abandoned work is listed explicitly, never
/// swallowed into the counters.
fn print_report(report: &RunReport) {
    if report.nothing_new() {
        info!(
            chapter = report.initial_chapter,
            "no new chapters yet, nothing to do"
        );
        return;
    }

    info!(
        initial_chapter = report.initial_chapter,
        end_chapter = report.end_chapter,
        pages_completed = report.pages_completed,
        pages_already_present = report.pages_already_present,
        pages_missing = report.pages_missing,
        elapsed_ms = report.elapsed_ms,
        "run complete"
    );

    if !report.missing_chapters.is_empty() {
        info!(
            chapters = ?report.missing_chapters,
            "chapters not available yet"
        );
    }

    for discovery in &report.abandoned_discoveries {
        warn!(
            chapter = discovery.chapter,
            error = %discovery.last_error,
            "chapter discovery abandoned"
        );
    }

    for page in &report.abandoned_pages {
        warn!(
            chapter = page.chapter,
            page = page.page,
            error = %page.last_error,
            "page abandoned"
        );
    }
}
