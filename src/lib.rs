//! Paper Tree Indexer - page-anchored semantic trees for academic PDFs.
//!
//! Each paper is decomposed by an LLM into a tree of sections, subsections
//! and fact points. Every leaf points back at a page of the PDF (and
//! optionally a short quote), so a reader can jump from a claim to its
//! source.
//!
//! # Quick Start
//!
//! ```no_run
//! use paper_tree_indexer::{Config, IndexOutcome, IndexStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let config = Config::load(None)?;
//!
//!     // Index every paper listed in papers/metadata.json
//!     let store = IndexStore::from_config(&config)?;
//!     let report = store.build_all().await?;
//!
//!     for failure in &report.failed {
//!         eprintln!("{}", failure);
//!     }
//!
//!     // Or index a single paper by id
//!     if let IndexOutcome::Built(record) = store.build_by_id("attention_is_all_you_need").await? {
//!         println!("{}", record.format());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **PageExtractor**: PDF to numbered pages, capped
//! - **TextBudgeter**: page-tagged text within a character budget
//! - **TreeGenerator**: system + user prompt, one completion call
//! - **ResponseParser**: recovers the tree from noisy model output
//! - **IndexStore**: orchestration, registry ids, atomic index files

pub mod budget;
pub mod config;
pub mod document;
pub mod error;
pub mod generator;
pub mod indexer;
pub mod llm;
pub mod parser;
pub mod persistence;
pub mod registry;
pub mod tree;

// Re-export commonly used types
pub use budget::{BudgetedText, TextBudgeter};
pub use config::Config;
pub use document::{Document, Page, PageExtractor};
pub use error::{PaperIndexError, Result, Stage};
pub use generator::TreeGenerator;
pub use indexer::{BatchReport, IndexOutcome, IndexStore, PaperFailure, SkipReason};
pub use llm::{CompletionBackend, LlmClient};
pub use parser::ResponseParser;
pub use persistence::{IndexRecord, load_record, save_record};
pub use registry::{PaperEntry, Registry};
pub use tree::{Position, TreeNode};
