//! OpenAI-compatible LLM client.
//!
//! Works with any chat-completions endpoint (Moonshot, OpenAI, local
//! proxies). The configured base URL already includes the version path.

use super::CompletionBackend;
use crate::config::LlmConfig;
use crate::error::{PaperIndexError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request body for chat completion.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

/// Response from chat completion.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// OpenAI API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// OpenAI-compatible LLM client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Get the API endpoint URL.
    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    fn transport_error(&self, err: reqwest::Error) -> PaperIndexError {
        if err.is_timeout() {
            PaperIndexError::GenerationTimeout {
                secs: self.config.timeout_secs,
            }
        } else {
            PaperIndexError::from(err)
        }
    }

    /// Send a chat completion request and return the first choice's text.
    pub async fn chat(&self, messages: &[Message]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            // Try to parse as API error
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
                return Err(PaperIndexError::Generation(format!(
                    "API error ({}): {}",
                    status, api_error.error.message
                )));
            }
            return Err(PaperIndexError::Generation(format!(
                "Request failed ({}): {}",
                status,
                truncate(&body, 300)
            )));
        }

        parse_completion(&body)
    }

    /// Test connectivity to the API.
    pub async fn test_connection(&self) -> Result<()> {
        let messages = [Message::user("Say 'hello' and nothing else.")];

        let content = self.chat(&messages).await?;

        if content.to_lowercase().contains("hello") {
            Ok(())
        } else {
            Err(PaperIndexError::Generation(format!(
                "Unexpected response: {}",
                content
            )))
        }
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        self.chat(messages).await
    }
}

/// Extract `choices[0].message.content` from a completion body.
fn parse_completion(body: &str) -> Result<String> {
    let completion: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        PaperIndexError::Generation(format!("malformed completion response: {}", e))
    })?;

    if let Some(usage) = &completion.usage {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "completion usage"
        );
    }

    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| PaperIndexError::Generation("No choices in response".to_string()))?;

    if choice.finish_reason.as_deref() == Some("length") {
        debug!("completion stopped at max_tokens; tree may be cut short");
    }

    Ok(choice.message.content.unwrap_or_default())
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
