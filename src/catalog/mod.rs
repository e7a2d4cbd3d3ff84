//! Catalog search: locating a series endpoint from a free-text query.
//!
//! The catalog endpoint returns newline-separated, pipe-delimited records
//! (`Name|Image|Title|Creator|Endpoint|Index`). Candidates are ranked against
//! the query by normalized string similarity and the ranked list is handed
//! back to the caller; the CLI picks the best match and logs the rest.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::fetch::{FetchClient, FetchError, Fetched};

/// Minimum similarity for a candidate to be considered at all.
const MATCH_THRESHOLD: f64 = 0.3;

/// One series entry from the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Display name of the series.
    pub name: String,
    /// Series author/creator.
    pub creator: String,
    /// Endpoint path of the series (e.g. `/boruto-naruto-next-generations`).
    pub endpoint: String,
}

/// A catalog entry with its match quality against the query.
#[derive(Debug, Clone)]
pub struct RankedEntry {
    /// The matched entry.
    pub entry: CatalogEntry,
    /// Similarity in 0.0..=1.0, higher is better.
    pub similarity: f64,
}

/// Errors raised by catalog search.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The search fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The catalog endpoint itself returned 404.
    #[error("catalog endpoint not found: {url}")]
    Unavailable {
        /// The search URL.
        url: String,
    },

    /// No candidate cleared the similarity threshold.
    #[error("no catalog match for query {query:?}")]
    NoMatch {
        /// The search query.
        query: String,
    },
}

/// Searches the catalog and returns candidates ranked best-first.
///
/// # Errors
///
/// Returns [`CatalogError`] if the fetch fails, the endpoint is missing, or
/// nothing matches the query.
#[instrument(skip(client))]
pub async fn search(
    client: &FetchClient,
    base_url: &str,
    query: &str,
) -> Result<Vec<RankedEntry>, CatalogError> {
    let url = search_url(base_url, query);
    let body = match client.fetch_text(&url).await? {
        Fetched::Body(body) => body,
        Fetched::NotFound => return Err(CatalogError::Unavailable { url }),
    };

    let entries = parse_records(&body);
    debug!(candidates = entries.len(), "catalog records parsed");

    let ranked = rank_entries(query, entries);
    if ranked.is_empty() {
        return Err(CatalogError::NoMatch {
            query: query.to_string(),
        });
    }

    info!(
        best = %ranked[0].entry.name,
        similarity = ranked[0].similarity,
        "catalog search complete"
    );
    Ok(ranked)
}

/// Builds the search URL for a query.
#[must_use]
pub fn search_url(base_url: &str, query: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let encoded = urlencoding::encode(&query.to_lowercase()).into_owned();
    format!("{base}/actions/search/?q={encoded}&limit=100")
}

/// Parses pipe-delimited catalog records, skipping malformed lines.
#[must_use]
pub fn parse_records(body: &str) -> Vec<CatalogEntry> {
    let mut entries = Vec::new();
    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('|').collect();
        // Name|Image|Title|Creator|Endpoint|Index
        if fields.len() != 6 {
            warn!(line, "skipping malformed catalog record");
            continue;
        }
        entries.push(CatalogEntry {
            name: fields[0].trim().to_string(),
            creator: fields[3].trim().to_string(),
            endpoint: fields[4].trim().to_string(),
        });
    }
    entries
}

/// Ranks entries against the query by normalized similarity, best first.
///
/// Ties break towards the earlier catalog position, matching the remote
/// relevance order.
#[must_use]
pub fn rank_entries(query: &str, entries: Vec<CatalogEntry>) -> Vec<RankedEntry> {
    let query_norm = query.to_lowercase();
    let mut ranked: Vec<RankedEntry> = entries
        .into_iter()
        .map(|entry| {
            let similarity = strsim::normalized_levenshtein(&entry.name.to_lowercase(), &query_norm);
            RankedEntry { entry, similarity }
        })
        .filter(|ranked| ranked.similarity >= MATCH_THRESHOLD)
        .collect();

    ranked.sort_by(|left, right| {
        right
            .similarity
            .partial_cmp(&left.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}
