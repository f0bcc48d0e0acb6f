//! Transcript source representation.
//!
//! A transcript is an ordered list of raw pages as produced by an upstream
//! text extractor. Page boundaries in text files are marked by form feeds
//! (`\x0c`) unless another delimiter is given; a file without any delimiter
//! is a single page and gets page numbers from a fixed lines-per-page divisor.

use crate::error::{DepoIndexError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Page delimiter emitted by most PDF-to-text extractors.
pub const FORM_FEED: &str = "\x0c";

/// One page of unprocessed transcript text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawPage {
    /// 1-indexed page number as reported by the source.
    pub page_number: usize,
    /// Extracted text, noise included.
    pub raw_text: String,
}

impl RawPage {
    pub fn new(page_number: usize, raw_text: impl Into<String>) -> Self {
        Self {
            page_number,
            raw_text: raw_text.into(),
        }
    }
}

/// A deposition transcript consisting of one or more raw pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Transcript name (file stem when loaded from disk).
    pub name: String,
    /// Original file path (if loaded from file).
    pub path: Option<PathBuf>,
    /// Pages in source order.
    pub pages: Vec<RawPage>,
}

impl Transcript {
    /// Create a transcript from already-split pages.
    pub fn new(name: impl Into<String>, pages: Vec<RawPage>) -> Self {
        Self {
            name: name.into(),
            path: None,
            pages,
        }
    }

    /// Split raw text into pages on `delimiter`.
    ///
    /// Page numbers follow the position of each part in the source, so a
    /// blank page still consumes its number.
    pub fn from_text(name: impl Into<String>, content: &str, delimiter: &str) -> Self {
        let pages = if delimiter.is_empty() {
            vec![RawPage::new(1, content)]
        } else {
            content
                .split(delimiter)
                .enumerate()
                .map(|(i, s)| RawPage::new(i + 1, s))
                .collect()
        };

        Self::new(name, pages)
    }

    /// Load a text file, splitting pages on form feeds.
    pub fn from_text_file(path: &Path) -> Result<Self> {
        Self::from_text_file_with_delimiter(path, FORM_FEED)
    }

    /// Load a text file with a custom page delimiter.
    pub fn from_text_file_with_delimiter(path: &Path, delimiter: &str) -> Result<Self> {
        if !path.exists() {
            return Err(DepoIndexError::TranscriptNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| DepoIndexError::io(path, e))?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();

        let mut transcript = Self::from_text(name, &content, delimiter);
        // A trailing delimiter leaves an empty last page behind.
        while transcript
            .pages
            .last()
            .is_some_and(|p| p.raw_text.trim().is_empty() && transcript.pages.len() > 1)
        {
            transcript.pages.pop();
        }
        transcript.path = Some(path.to_path_buf());

        Ok(transcript)
    }

    /// Find every `.txt` transcript under a directory, sorted by path.
    pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(DepoIndexError::InvalidCorpusPath(dir.to_path_buf()));
        }

        let mut found: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
            })
            .collect();

        if found.is_empty() {
            return Err(DepoIndexError::EmptyCorpus(dir.to_path_buf()));
        }

        found.sort();
        Ok(found)
    }

    /// Get total number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Approximate size of the transcript in words.
    pub fn total_words(&self) -> usize {
        self.pages
            .iter()
            .map(|p| p.raw_text.split_whitespace().count())
            .sum()
    }
}
