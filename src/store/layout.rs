//! Store layout: deterministic directory and file naming.
//!
//! The layout is the resumability source of truth, so the format is fixed:
//! `{root}/Chapter {N}/{stem}.ch{N}.p{page:03}.{ext}`, one directory per
//! chapter, page numbers zero-padded to 3 digits. The resume scan in
//! [`super::SeriesStore`] parses these names back.

use std::path::{Path, PathBuf};

use url::Url;

/// Fallback extension when the resource URL carries none.
pub const DEFAULT_RESOURCE_EXT: &str = "jpg";

/// Returns the directory name for a chapter.
#[must_use]
pub fn chapter_dir_name(chapter: u32) -> String {
    format!("Chapter {chapter}")
}

/// Returns the directory path for a chapter under the series root.
#[must_use]
pub fn chapter_dir(root: &Path, chapter: u32) -> PathBuf {
    root.join(chapter_dir_name(chapter))
}

/// Returns the file name for a persisted page resource.
#[must_use]
pub fn page_file_name(stem: &str, chapter: u32, page: u32, ext: &str) -> String {
    format!("{stem}.ch{chapter}.p{page:03}.{ext}")
}

/// Returns the full path for a persisted page resource.
#[must_use]
pub fn page_file_path(root: &Path, stem: &str, chapter: u32, page: u32, ext: &str) -> PathBuf {
    chapter_dir(root, chapter).join(page_file_name(stem, chapter, page, ext))
}

/// The file-name prefix shared by every extension variant of one page.
///
/// Used for existence probes that must match regardless of extension.
#[must_use]
pub fn page_file_prefix(stem: &str, chapter: u32, page: u32) -> String {
    format!("{stem}.ch{chapter}.p{page:03}.")
}

/// Derives the file extension from a resource URL, or the jpg fallback.
///
/// The last path segment is percent-decoded before the extension is split
/// off, and implausibly long "extensions" are rejected.
#[must_use]
pub fn extension_from_resource_url(url: &str) -> String {
    let Some(ext) = Url::parse(url).ok().and_then(|parsed| {
        let last_segment = parsed.path_segments()?.next_back()?.to_string();
        let decoded = urlencoding::decode(&last_segment)
            .map(|s| s.into_owned())
            .unwrap_or(last_segment);
        let dot_index = decoded.rfind('.')?;
        let ext = &decoded[dot_index + 1..];
        if ext.is_empty() || ext.len() > 8 || !ext.chars().all(char::is_alphanumeric) {
            return None;
        }
        Some(ext.to_lowercase())
    }) else {
        return DEFAULT_RESOURCE_EXT.to_string();
    };
    ext
}

/// Derives the file-name stem from a series title: first word, hostile
/// characters replaced.
#[must_use]
pub fn file_stem_from_title(title: &str) -> String {
    let first_word = title.split_whitespace().next().unwrap_or("series");
    let cleaned: String = first_word
        .chars()
        .map(|ch| match ch {
            c if c.is_alphanumeric() || matches!(c, '-' | '_') => c,
            _ => '_',
        })
        .collect();
    if cleaned.chars().all(|c| c == '_') {
        "series".to_string()
    } else {
        cleaned
    }
}
