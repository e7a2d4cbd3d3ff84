//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use mangagrab_core::{DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS};

/// Maintain a resumable local archive of a chaptered series.
///
/// Mangagrab scans the local library to find where the previous run stopped,
/// discovers how many chapters the remote source has, and downloads every
/// missing page resource concurrently.
#[derive(Parser, Debug)]
#[command(name = "mangagrab")]
#[command(author, version, about)]
#[command(group(
    clap::ArgGroup::new("series")
        .required(true)
        .args(["search", "endpoint"])
))]
pub struct Args {
    /// Search the remote catalog for a series by name
    #[arg(short, long)]
    pub search: Option<String>,

    /// Series endpoint path (skips the catalog search; requires --title)
    #[arg(short, long, requires = "title")]
    pub endpoint: Option<String>,

    /// Series title, used as the library directory name
    #[arg(short, long)]
    pub title: Option<String>,

    /// Base directory for the library
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,

    /// Remote source base URL
    #[arg(long, default_value = "https://www.mangareader.net")]
    pub base_url: String,

    /// Stop at this chapter instead of probing the newest one
    #[arg(long)]
    pub end_chapter: Option<u32>,

    /// Maximum concurrent fetches (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Maximum attempts per page for transient failures (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_ATTEMPTS as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: u8,

    /// Delay after each page parse in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, default_value_t = 250, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub delay_ms: u64,

    /// Discover and parse only; skip resource downloads
    #[arg(short = 'n', long)]
    pub no_download: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_search_mode_parses() {
        let args = Args::try_parse_from(["mangagrab", "--search", "boruto"]).unwrap();
        assert_eq!(args.search.as_deref(), Some("boruto"));
        assert!(args.endpoint.is_none());
        assert_eq!(args.concurrency, 40);
        assert_eq!(args.max_attempts, 3);
        assert_eq!(args.delay_ms, 250);
        assert!(!args.no_download);
    }

    #[test]
    fn test_cli_endpoint_mode_requires_title() {
        let result = Args::try_parse_from(["mangagrab", "--endpoint", "/naruto"]);
        assert!(result.is_err());

        let args =
            Args::try_parse_from(["mangagrab", "--endpoint", "/naruto", "--title", "Naruto"])
                .unwrap();
        assert_eq!(args.endpoint.as_deref(), Some("/naruto"));
        assert_eq!(args.title.as_deref(), Some("Naruto"));
    }

    #[test]
    fn test_cli_series_selection_required() {
        let result = Args::try_parse_from(["mangagrab"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_search_conflicts_with_endpoint() {
        let result = Args::try_parse_from([
            "mangagrab",
            "--search",
            "boruto",
            "--endpoint",
            "/naruto",
            "--title",
            "Naruto",
        ]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_concurrency_range_enforced() {
        let args = Args::try_parse_from(["mangagrab", "-s", "x", "-c", "1"]).unwrap();
        assert_eq!(args.concurrency, 1);

        let args = Args::try_parse_from(["mangagrab", "-s", "x", "-c", "100"]).unwrap();
        assert_eq!(args.concurrency, 100);

        let result = Args::try_parse_from(["mangagrab", "-s", "x", "-c", "0"]);
        assert!(result.is_err());
        let result = Args::try_parse_from(["mangagrab", "-s", "x", "-c", "101"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_max_attempts_range_enforced() {
        let args = Args::try_parse_from(["mangagrab", "-s", "x", "-r", "10"]).unwrap();
        assert_eq!(args.max_attempts, 10);

        let result = Args::try_parse_from(["mangagrab", "-s", "x", "-r", "0"]);
        assert!(result.is_err());
        let result = Args::try_parse_from(["mangagrab", "-s", "x", "-r", "11"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_delay_zero_disables() {
        let args = Args::try_parse_from(["mangagrab", "-s", "x", "-l", "0"]).unwrap();
        assert_eq!(args.delay_ms, 0);

        let result = Args::try_parse_from(["mangagrab", "-s", "x", "-l", "60001"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_end_chapter_flag() {
        let args =
            Args::try_parse_from(["mangagrab", "-s", "x", "--end-chapter", "42"]).unwrap();
        assert_eq!(args.end_chapter, Some(42));
    }

    #[test]
    fn test_cli_no_download_flag() {
        let args = Args::try_parse_from(["mangagrab", "-s", "x", "-n"]).unwrap();
        assert!(args.no_download);
    }

    #[test]
    fn test_cli_verbose_and_quiet_flags() {
        let args = Args::try_parse_from(["mangagrab", "-s", "x", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);

        let args = Args::try_parse_from(["mangagrab", "-s", "x", "-q"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["mangagrab", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
