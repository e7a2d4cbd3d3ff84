//! Shared User-Agent string for all fetch traffic.
//!
//! Single source for project URL and UA format so page and resource traffic
//! stay consistent and easy to update (good citizenship; RFC 9308).

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/mangagrab";

/// Default User-Agent for all fetches (identifies the tool).
#[must_use]
pub(crate) fn default_fetch_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("mangagrab/{version} (archive-tool; +{PROJECT_UA_URL})")
}
