//! Site-specific parser for mangareader-style page markup.
//!
//! The markup contract this parser understands:
//! - each page embeds its image inside `<div id="imgholder"><img src="..."></div>`
//! - page 1 carries a page selector `<div id="selectpage">... of N</div>` whose
//!   trailing integer is the chapter's total page count
//! - the series page lists chapters in the third `<ul>`, newest first, with
//!   hrefs ending in the chapter number

use regex::Regex;
use scraper::{Html, Selector};

use super::PageParser;
use super::error::ExtractError;

/// Parser for the mangareader page structure.
#[derive(Debug)]
pub struct MangaReaderParser {
    trailing_int: Regex,
}

impl MangaReaderParser {
    /// Creates the parser.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Selector`] if the internal patterns fail to
    /// compile, which indicates a programming error rather than bad input.
    pub fn new() -> Result<Self, ExtractError> {
        let trailing_int =
            Regex::new(r"(\d+)\s*$").map_err(|e| ExtractError::Selector(e.to_string()))?;
        Ok(Self { trailing_int })
    }

    fn selector(pattern: &str) -> Result<Selector, ExtractError> {
        Selector::parse(pattern).map_err(|e| ExtractError::Selector(e.to_string()))
    }
}

impl PageParser for MangaReaderParser {
    fn locate_resource(&self, body: &str) -> Result<String, ExtractError> {
        let document = Html::parse_document(body);
        let selector = Self::selector("#imgholder img")?;
        document
            .select(&selector)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(std::string::ToString::to_string)
            .ok_or(ExtractError::MissingResource)
    }

    fn page_count(&self, body: &str) -> Result<u32, ExtractError> {
        let document = Html::parse_document(body);
        let selector = Self::selector("#selectpage")?;
        let text = document
            .select(&selector)
            .next()
            .map(|element| element.text().collect::<String>())
            .ok_or(ExtractError::MissingPageCount)?;
        let trimmed = text.trim();

        let capture = self
            .trailing_int
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .ok_or(ExtractError::MissingPageCount)?;
        capture
            .as_str()
            .parse::<u32>()
            .map_err(|_| ExtractError::Unparseable {
                field: "page count",
                value: trimmed.to_string(),
            })
    }

    fn latest_chapter(&self, body: &str) -> Result<u32, ExtractError> {
        let document = Html::parse_document(body);
        let list_selector = Self::selector("ul")?;
        let anchor_selector = Self::selector("a")?;

        // The chapter listing is the third <ul> on the series page, newest
        // chapter first.
        let listing = document
            .select(&list_selector)
            .nth(2)
            .ok_or(ExtractError::MissingChapterList)?;
        let href = listing
            .select(&anchor_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .ok_or(ExtractError::MissingChapterList)?;

        let last_segment = href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(href);
        last_segment
            .parse::<u32>()
            .map_err(|_| ExtractError::Unparseable {
                field: "latest chapter",
                value: href.to_string(),
            })
    }
}
