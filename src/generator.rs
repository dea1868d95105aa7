//! Tree generation: prompt assembly and the single completion call.

use crate::budget::BudgetedText;
use crate::config::Config;
use crate::error::Result;
use crate::llm::{CompletionBackend, LlmClient, Message, Prompts};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Produces raw model output for a paper's budgeted text.
#[derive(Clone)]
pub struct TreeGenerator {
    backend: Arc<dyn CompletionBackend>,
}

impl TreeGenerator {
    /// Create a generator over any completion backend.
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Create a generator backed by the HTTP client.
    ///
    /// Fails with `MissingCredential` when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate_llm()?;
        Ok(Self::new(Arc::new(LlmClient::new(config.llm.clone()))))
    }

    /// The system + user exchange sent for one paper.
    pub fn build_messages(title: &str, text: &BudgetedText) -> Vec<Message> {
        vec![
            Message::system(Prompts::semantic_tree_system()),
            Message::user(Prompts::semantic_tree_user(title, text.as_str())),
        ]
    }

    /// Run one completion request and return the model's raw text.
    ///
    /// No retry happens here; a failed call surfaces as `Generation` or
    /// `GenerationTimeout`.
    pub async fn generate(&self, paper_id: &str, title: &str, text: &BudgetedText) -> Result<String> {
        let messages = Self::build_messages(title, text);

        info!(
            paper_id,
            pages = text.pages_included(),
            chars = text.char_len(),
            "requesting semantic tree"
        );
        let start = Instant::now();

        let raw = self.backend.complete(&messages).await?;

        info!(
            paper_id,
            response_chars = raw.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "model responded"
        );
        Ok(raw)
    }
}
