//! Page extraction from PDF files.
//!
//! A paper is read into an ordered run of [`Page`]s, one per PDF page,
//! numbered from 1 and capped at a maximum page count. Pages whose text
//! layer is empty are kept so numbering never has gaps.

use crate::config::MAX_PAGES;
use crate::error::{PaperIndexError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A single page of a PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-indexed page number.
    pub number: usize,
    /// Plain text of the page, trimmed.
    pub text: String,
}

impl Page {
    /// Create a new page.
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    /// Whether the page carried any extractable text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Consuming iterator over the extracted pages of one PDF.
///
/// Finite and single-pass; collect it if the pages are needed twice.
#[derive(Debug)]
pub struct Pages {
    inner: std::iter::Take<std::iter::Enumerate<std::vec::IntoIter<String>>>,
    total_pages: usize,
}

impl Pages {
    fn new(raw: Vec<String>, max_pages: usize) -> Self {
        let total_pages = raw.len();
        Self {
            inner: raw.into_iter().enumerate().take(max_pages),
            total_pages,
        }
    }

    /// Page count of the source PDF, before the cap was applied.
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }
}

impl Iterator for Pages {
    type Item = Page;

    fn next(&mut self) -> Option<Page> {
        self.inner
            .next()
            .map(|(i, text)| Page::new(i + 1, text.trim()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Reads page text out of PDF files.
#[derive(Debug, Clone, Copy)]
pub struct PageExtractor {
    max_pages: usize,
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new(MAX_PAGES)
    }
}

impl PageExtractor {
    /// Create an extractor reading at most `max_pages` pages.
    pub fn new(max_pages: usize) -> Self {
        Self { max_pages }
    }

    /// Extract pages from a PDF on disk.
    pub fn extract(&self, path: &Path) -> Result<Pages> {
        let bytes = std::fs::read(path).map_err(|e| PaperIndexError::extraction(path, e))?;
        self.extract_from_bytes(&bytes, path)
    }

    /// Extract pages from in-memory PDF bytes; `origin` is used for error context.
    pub fn extract_from_bytes(&self, bytes: &[u8], origin: &Path) -> Result<Pages> {
        // pdf-extract panics on some malformed inputs instead of returning Err.
        let raw = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
            .map_err(|_| PaperIndexError::extraction(origin, "PDF parser aborted"))?
            .map_err(|e| PaperIndexError::extraction(origin, e))?;

        debug!(
            path = %origin.display(),
            total_pages = raw.len(),
            max_pages = self.max_pages,
            "PDF text layer read"
        );

        Ok(Pages::new(raw, self.max_pages))
    }
}

/// A paper's extracted pages.
#[derive(Debug, Clone)]
pub struct Document {
    /// Source file path.
    pub path: PathBuf,
    /// Pages in order, capped.
    pub pages: Vec<Page>,
    /// Page count of the PDF before capping.
    pub total_pages: usize,
}

impl Document {
    /// Load a PDF into memory using the given extractor.
    pub fn from_pdf(path: &Path, extractor: &PageExtractor) -> Result<Self> {
        let pages = extractor.extract(path)?;
        let total_pages = pages.total_pages();
        Ok(Self {
            path: path.to_path_buf(),
            pages: pages.collect(),
            total_pages,
        })
    }

    /// Build a document from pre-extracted pages.
    pub fn from_pages(path: impl Into<PathBuf>, pages: Vec<Page>) -> Self {
        let total_pages = pages.len();
        Self {
            path: path.into(),
            pages,
            total_pages,
        }
    }

    /// Get number of extracted pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// True when no page has extractable text (e.g. scanned PDFs).
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(Page::is_blank)
    }

    /// Total characters of text across pages.
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }

    /// Get a specific page by number (1-indexed).
    pub fn get_page(&self, number: usize) -> Option<&Page> {
        if number == 0 {
            None
        } else {
            self.pages.get(number - 1)
        }
    }
}
