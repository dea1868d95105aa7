//! LLM integration module.
//!
//! Provides an OpenAI-compatible client for chat completions, the
//! [`CompletionBackend`] seam the generator talks to, and the prompts used
//! for semantic tree generation.

mod client;
mod prompts;

pub use client::{LlmClient, Message, Role};
pub use prompts::Prompts;

use crate::error::Result;
use async_trait::async_trait;

/// A remote text-completion service.
///
/// One call, one response: implementations must not retry on their own.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send the conversation and return the raw text of the first choice.
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}
