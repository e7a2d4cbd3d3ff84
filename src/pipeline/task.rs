//! Page task descriptors and series URL construction.

/// Remote addressing for one series: base URL plus series endpoint.
///
/// Page URLs follow the pattern `{base}{endpoint}/{chapter}/{page}`.
#[derive(Debug, Clone)]
pub struct SeriesSource {
    base: String,
    endpoint: String,
}

impl SeriesSource {
    /// Creates a source from a base URL and a series endpoint path.
    ///
    /// Trailing and leading slashes are normalized so either form composes
    /// into a valid URL.
    #[must_use]
    pub fn new(base_url: &str, endpoint: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        let trimmed = endpoint.trim().trim_end_matches('/');
        let endpoint = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        Self { base, endpoint }
    }

    /// Returns the series page URL (chapter listing, latest-chapter probe).
    #[must_use]
    pub fn series_url(&self) -> String {
        format!("{}{}", self.base, self.endpoint)
    }

    /// Returns the URL of one page of one chapter.
    #[must_use]
    pub fn page_url(&self, chapter: u32, page: u32) -> String {
        format!("{}{}/{chapter}/{page}", self.base, self.endpoint)
    }
}

/// Immutable descriptor for one page download.
///
/// Created by the chapter orchestrator once a chapter's page count is known;
/// dropped when the page's pipeline terminates.
#[derive(Debug, Clone)]
pub struct PageTask {
    /// The chapter this page belongs to.
    pub chapter: u32,
    /// 1-based page number within the chapter.
    pub page: u32,
    /// The page location to fetch.
    pub location: String,
}

impl PageTask {
    /// Creates the task for one page of one chapter.
    #[must_use]
    pub fn new(source: &SeriesSource, chapter: u32, page: u32) -> Self {
        Self {
            chapter,
            page,
            location: source.page_url(chapter, page),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_source_url_composition() {
        let source = SeriesSource::new("https://www.mangareader.net", "/boruto-naruto-next-generations");
        assert_eq!(
            source.series_url(),
            "https://www.mangareader.net/boruto-naruto-next-generations"
        );
        assert_eq!(
            source.page_url(42, 7),
            "https://www.mangareader.net/boruto-naruto-next-generations/42/7"
        );
    }

    #[test]
    fn test_series_source_slash_normalization() {
        let source = SeriesSource::new("https://example.com/", "naruto/");
        assert_eq!(source.series_url(), "https://example.com/naruto");
        assert_eq!(source.page_url(1, 1), "https://example.com/naruto/1/1");
    }

    #[test]
    fn test_page_task_location() {
        let source = SeriesSource::new("https://example.com", "/naruto");
        let task = PageTask::new(&source, 3, 12);
        assert_eq!(task.chapter, 3);
        assert_eq!(task.page, 12);
        assert_eq!(task.location, "https://example.com/naruto/3/12");
    }
}
