//! Error types for the paper indexer.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, PaperIndexError>;

/// Pipeline stage a per-paper failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Generate,
    Parse,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Generate => "generate",
            Stage::Parse => "parse",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while indexing papers.
#[derive(Error, Debug)]
pub enum PaperIndexError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization of persisted data.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration file or value error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No credential for the completion service.
    #[error("LLM API key is required. Set LLM_API_KEY (or MOONSHOT_API_KEY) or add it to the config file.")]
    MissingCredential,

    /// The PDF could not be opened or parsed.
    #[error("Failed to extract text from '{path}': {detail}")]
    Extraction { path: PathBuf, detail: String },

    /// The completion request failed (transport or non-success status).
    #[error("LLM request failed: {0}")]
    Generation(String),

    /// The completion request exceeded its deadline.
    #[error("LLM request timed out after {secs}s")]
    GenerationTimeout { secs: u64 },

    /// The model output could not be interpreted as a tree.
    #[error("Failed to parse model response: {0}")]
    Parse(String),

    /// The paper registry could not be read or written.
    #[error("Registry error: {0}")]
    Registry(String),

    /// No registry entry with the given id.
    #[error("Paper '{0}' not found in registry")]
    PaperNotFound(String),
}

impl PaperIndexError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an extraction error with path context.
    pub fn extraction(path: impl Into<PathBuf>, detail: impl fmt::Display) -> Self {
        Self::Extraction {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Extraction { .. } => Stage::Extract,
            Self::MissingCredential
            | Self::Generation(_)
            | Self::GenerationTimeout { .. }
            | Self::Config(_) => Stage::Generate,
            Self::Parse(_) => Stage::Parse,
            Self::Io { .. }
            | Self::Serialization(_)
            | Self::Registry(_)
            | Self::PaperNotFound(_) => Stage::Persist,
        }
    }

    /// Registry failures abort a batch; everything else is reported per paper.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::Registry(_))
    }
}

impl From<reqwest::Error> for PaperIndexError {
    fn from(err: reqwest::Error) -> Self {
        PaperIndexError::Generation(err.to_string())
    }
}
