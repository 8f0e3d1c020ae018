//! LLM Oracle Port
//!
//! Abstract text-in/text-out interface to a language model. The simulation
//! never talks to a transport directly; the assessor, the event variator and
//! the analysis writer each hold an `Arc<dyn LlmOracle>`.
//!
//! Rate limiting and retries belong inside implementations. Callers wrap
//! every invocation in their own timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Options for a completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(1024),
            temperature: Some(0.7),
        }
    }
}

impl CompletionOptions {
    /// Low-temperature options for structured (JSON) answers
    pub fn structured() -> Self {
        Self {
            max_tokens: Some(800),
            temperature: Some(0.2),
        }
    }
}

/// Response from a completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text content
    pub content: String,
    /// Model that generated the response
    pub model: String,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Which engine subsystem is asking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OraclePurpose {
    Assessment,
    EventVariation,
    Analysis,
}

/// LLM oracle interface
///
/// # Example
///
/// ```rust,ignore
/// use cadsim::ports::LlmOracle;
///
/// struct HttpOracle { /* ... */ }
///
/// #[async_trait]
/// impl LlmOracle for HttpOracle {
///     async fn complete(&self, purpose: OraclePurpose, messages: &[ChatMessage],
///         options: &CompletionOptions) -> Result<CompletionResponse, DomainError> {
///         // Call the model
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait LlmOracle: Send + Sync {
    /// Generate a completion from messages
    async fn complete(
        &self,
        purpose: OraclePurpose,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, DomainError>;

    /// Generate a completion from a system prompt and a single user prompt
    async fn complete_simple(
        &self,
        purpose: OraclePurpose,
        system: &str,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, DomainError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
        let response = self.complete(purpose, &messages, options).await?;
        Ok(response.content)
    }

    /// Provider name (e.g. "replay", "anthropic")
    fn provider_name(&self) -> &str;

    /// Model ID being used
    fn model_id(&self) -> &str;
}
