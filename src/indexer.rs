//! Index store - runs the indexing pipeline for registered papers.
//!
//! For one paper:
//! 1. Extract page text from the PDF (capped page count)
//! 2. Assemble the page-tagged text under the character budget
//! 3. Ask the model for a semantic tree
//! 4. Recover and normalise the tree from the response
//! 5. Persist the index record, replacing any earlier one
//!
//! A record is written only when every stage succeeded.

use crate::budget::TextBudgeter;
use crate::config::{Config, IndexConfig};
use crate::document::{Document, PageExtractor};
use crate::error::{PaperIndexError, Result, Stage};
use crate::generator::TreeGenerator;
use crate::parser::ResponseParser;
use crate::persistence::{IndexRecord, save_record};
use crate::registry::{PaperEntry, Registry, Submission};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Why a paper was not indexed, without that being a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Registry entry without an id.
    MissingId,
    /// Metadata-only entry.
    NoFilePath,
    /// `file_path` does not point at a file.
    MissingFile(PathBuf),
    /// The PDF has no extractable text (e.g. scanned images).
    EmptyDocument,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingId => write!(f, "entry has no id"),
            SkipReason::NoFilePath => write!(f, "no file_path"),
            SkipReason::MissingFile(path) => write!(f, "PDF not found: {}", path.display()),
            SkipReason::EmptyDocument => write!(f, "no extractable text"),
        }
    }
}

/// Outcome of indexing one paper.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOutcome {
    Built(IndexRecord),
    Skipped(SkipReason),
}

/// A per-paper failure, attributed to a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperFailure {
    pub paper_id: String,
    pub stage: Stage,
    pub cause: String,
}

impl PaperFailure {
    pub fn new(paper_id: impl Into<String>, err: &PaperIndexError) -> Self {
        Self {
            paper_id: paper_id.into(),
            stage: err.stage(),
            cause: err.to_string(),
        }
    }
}

impl fmt::Display for PaperFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} failed: {}", self.paper_id, self.stage, self.cause)
    }
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub built: Vec<String>,
    pub skipped: Vec<(String, SkipReason)>,
    pub failed: Vec<PaperFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.built.len() + self.skipped.len() + self.failed.len()
    }
}

/// Result of an upload: the registration, then the indexing attempt.
#[derive(Debug, Clone)]
pub struct Upload {
    pub submission: Submission,
    pub outcome: std::result::Result<IndexOutcome, PaperFailure>,
}

/// Runs the pipeline and owns the index files.
pub struct IndexStore {
    config: IndexConfig,
    registry: Arc<Registry>,
    extractor: PageExtractor,
    budgeter: TextBudgeter,
    generator: Option<TreeGenerator>,
    parser: ResponseParser,
    write_lock: Mutex<()>,
}

impl IndexStore {
    /// Create a store from explicit parts.
    ///
    /// Without a generator, extraction still works but every build fails
    /// at the generate stage with `MissingCredential`.
    pub fn new(config: IndexConfig, registry: Arc<Registry>, generator: Option<TreeGenerator>) -> Self {
        Self {
            extractor: PageExtractor::new(config.max_pages),
            budgeter: TextBudgeter::new(config.max_text_chars),
            config,
            registry,
            generator,
            parser: ResponseParser::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store using the HTTP completion client.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let generator = match TreeGenerator::from_config(config) {
            Ok(generator) => Some(generator),
            Err(PaperIndexError::MissingCredential) => None,
            Err(e) => return Err(e),
        };
        let registry = Arc::new(Registry::new(&config.index));
        Ok(Self::new(config.index.clone(), registry, generator))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Build and persist the index for one registry entry.
    pub async fn build(&self, entry: &PaperEntry) -> Result<IndexOutcome> {
        if entry.id.is_empty() {
            return Ok(IndexOutcome::Skipped(SkipReason::MissingId));
        }
        let title = if entry.title.trim().is_empty() {
            "Untitled"
        } else {
            entry.title.as_str()
        };

        let Some(file_path) = entry.file_path.as_deref().filter(|p| !p.is_empty()) else {
            info!(paper_id = %entry.id, "skipping metadata-only entry");
            return Ok(IndexOutcome::Skipped(SkipReason::NoFilePath));
        };
        let pdf_path = self.registry.resolve_file_path(file_path);
        if !pdf_path.is_file() {
            warn!(paper_id = %entry.id, path = %pdf_path.display(), "PDF not found, skipping");
            return Ok(IndexOutcome::Skipped(SkipReason::MissingFile(pdf_path)));
        }

        let document = Document::from_pdf(&pdf_path, &self.extractor)?;
        if document.is_empty() {
            warn!(paper_id = %entry.id, "no extractable text, skipping");
            return Ok(IndexOutcome::Skipped(SkipReason::EmptyDocument));
        }
        info!(
            paper_id = %entry.id,
            pages = document.page_count(),
            total_pages = document.total_pages,
            "pages extracted"
        );

        let text = self.budgeter.assemble(&document.pages);
        if let Some(page) = text.truncated_at() {
            info!(paper_id = %entry.id, page, "text budget reached");
        }

        let generator = self
            .generator
            .as_ref()
            .ok_or(PaperIndexError::MissingCredential)?;
        let raw = generator.generate(&entry.id, title, &text).await?;

        let tree = self.parser.parse(&raw, title)?;
        let report = tree.validate(Some(document.page_count()));
        for defect in report.defects() {
            warn!(paper_id = %entry.id, defect = %defect, "tree defect tolerated");
        }

        let record = IndexRecord::new(&entry.id, title, tree);
        let path = {
            let _guard = self.write_lock.lock().await;
            save_record(&record, &self.config.papers_dir)?
        };
        info!(
            paper_id = %entry.id,
            nodes = record.tree.node_count(),
            path = %path.display(),
            "index written"
        );

        Ok(IndexOutcome::Built(record))
    }

    /// Build the index for the registry entry with `paper_id`.
    pub async fn build_by_id(&self, paper_id: &str) -> Result<IndexOutcome> {
        let entry = self.registry.find(paper_id)?;
        self.build(&entry).await
    }

    /// Index every paper in the registry, one after another.
    ///
    /// Per-paper failures are collected; a registry failure aborts the run.
    pub async fn build_all(&self) -> Result<BatchReport> {
        let doc = self.registry.load()?;
        info!(papers = doc.papers.len(), "batch started");

        let mut report = BatchReport::default();
        for entry in &doc.papers {
            match self.build(entry).await {
                Ok(IndexOutcome::Built(_)) => report.built.push(entry.id.clone()),
                Ok(IndexOutcome::Skipped(reason)) => {
                    report.skipped.push((entry.id.clone(), reason))
                }
                Err(e) if e.is_batch_fatal() => return Err(e),
                Err(e) => {
                    let failure = PaperFailure::new(&entry.id, &e);
                    warn!("{}", failure);
                    report.failed.push(failure);
                }
            }
        }

        info!(
            built = report.built.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "batch finished"
        );
        Ok(report)
    }

    /// Register an uploaded PDF and index it.
    ///
    /// The PDF and registry entry are kept even when indexing fails.
    pub async fn submit_and_build(&self, filename: &str, pdf: &[u8]) -> Result<Upload> {
        let submission = self.registry.submit(filename, pdf).await?;
        let outcome = match self.build(&submission.entry).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_batch_fatal() => return Err(e),
            Err(e) => Err(PaperFailure::new(&submission.entry.id, &e)),
        };
        Ok(Upload { submission, outcome })
    }
}
