//! Series store: the chapter-partitioned on-disk library for one series.
//!
//! One `SeriesStore` owns the series root directory. It answers the two
//! resume questions at startup (highest chapter directory, highest contiguous
//! page within a chapter) and performs all resource writes during the run.
//!
//! The resume scans are pure reads performed once before any task launches,
//! so they never race with pipeline writes. Mid-run the only store reads are
//! per-page existence probes, and each page's file is written exclusively by
//! that page's own task.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::error::StoreError;
use super::layout;

/// On-disk store for one series.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    root: PathBuf,
    file_stem: String,
}

impl SeriesStore {
    /// Opens (creating if needed) the series root under `base`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the root directory cannot be created.
    pub fn open(base: &Path, title: &str, file_stem: &str) -> Result<Self, StoreError> {
        let root = base.join(title);
        std::fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        debug!(root = %root.display(), "opened series store");
        Ok(Self {
            root,
            file_stem: file_stem.to_string(),
        })
    }

    /// Returns the series root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file-name stem used for persisted resources.
    #[must_use]
    pub fn file_stem(&self) -> &str {
        &self.file_stem
    }

    /// Returns the highest chapter directory present, or 1 for an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the root cannot be scanned.
    pub fn last_completed_chapter(&self) -> Result<u32, StoreError> {
        let resolved = self.scan_chapter_dirs()?.unwrap_or(1);
        info!(chapter = resolved, "resume scan: last chapter directory");
        Ok(resolved)
    }

    /// Returns whether any chapter directory exists yet.
    ///
    /// Distinguishes a genuinely empty store from one whose last chapter is
    /// chapter 1; `last_completed_chapter` reports 1 for both.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the root cannot be scanned.
    pub fn has_chapters(&self) -> Result<bool, StoreError> {
        Ok(self.scan_chapter_dirs()?.is_some())
    }

    /// Scans the root for chapter directories; `None` means none exist.
    fn scan_chapter_dirs(&self) -> Result<Option<u32>, StoreError> {
        let pattern = chapter_dir_pattern();
        let mut last: Option<u32> = None;

        let entries = std::fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(chapter) = pattern
                .captures(&name.to_string_lossy())
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            else {
                continue;
            };
            last = Some(last.map_or(chapter, |current| current.max(chapter)));
        }

        Ok(last)
    }

    /// Returns the highest contiguous page present in a chapter, or 1 if the
    /// chapter directory is absent or holds no page files.
    ///
    /// Contiguity is deliberate: a gap (pages 1 and 3 present, 2 missing)
    /// resolves to the page before the gap so the missing page is re-fetched
    /// on resume.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if an existing chapter directory cannot be
    /// scanned.
    pub fn last_completed_page(&self, chapter: u32) -> Result<u32, StoreError> {
        let dir = layout::chapter_dir(&self.root, chapter);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(1),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let pattern = page_file_pattern();
        let mut pages = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let name = entry.file_name();
            if let Some(page) = pattern
                .captures(&name.to_string_lossy())
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            {
                pages.insert(page);
            }
        }

        let mut last = 0u32;
        while pages.contains(&(last + 1)) {
            last += 1;
        }
        Ok(last.max(1))
    }

    /// Returns whether a resource for this page is already persisted, under
    /// any extension.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if an existing chapter directory cannot be
    /// scanned.
    pub async fn page_exists(&self, chapter: u32, page: u32) -> Result<bool, StoreError> {
        let dir = layout::chapter_dir(&self.root, chapter);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let prefix = layout::page_file_prefix(&self.file_stem, chapter, page);
        loop {
            let entry = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::io(&dir, e))?;
            let Some(entry) = entry else {
                return Ok(false);
            };
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                return Ok(true);
            }
        }
    }

    /// Persists resource bytes for a page, creating the chapter directory if
    /// needed. Overwriting an existing file is permitted; writing the same
    /// page twice is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any disk failure.
    pub async fn write_resource(
        &self,
        chapter: u32,
        page: u32,
        ext: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let dir = layout::chapter_dir(&self.root, chapter);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let path = dir.join(layout::page_file_name(&self.file_stem, chapter, page, ext));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        debug!(path = %path.display(), bytes = bytes.len(), "resource persisted");
        Ok(path)
    }

    /// Appends one JSON line to the series run log (`error.log` in the root).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the log cannot be opened or written.
    pub async fn append_run_log(&self, json_line: &str) -> Result<(), StoreError> {
        let path = self.root.join("error.log");
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(json_line.as_bytes())
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        Ok(())
    }
}

/// Pattern for chapter directory names. Compiled per scan; scans run once.
#[allow(clippy::unwrap_used)]
fn chapter_dir_pattern() -> Regex {
    // The pattern is a literal and cannot fail to compile.
    Regex::new(r"^Chapter (\d+)$").unwrap()
}

/// Pattern for the page number inside persisted file names.
#[allow(clippy::unwrap_used)]
fn page_file_pattern() -> Regex {
    // The pattern is a literal and cannot fail to compile.
    Regex::new(r"\.p(\d{3,})\.[^.]+$").unwrap()
}
