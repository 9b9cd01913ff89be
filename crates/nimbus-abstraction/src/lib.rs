//! Model abstraction layer for Nimbus.
//!
//! This crate defines the core traits and types for interacting with the
//! platform's chat and completion models, including the streaming surface.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Represents an error that can occur when interacting with a model.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// An error occurred during the API request (e.g., network issues, invalid request).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The model returned an error (e.g., invalid input, server failure).
    #[error("Model Response Error: {0}")]
    ModelResponseError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// The model provider is not supported or configured.
    #[error("Unsupported Model Provider: {0}")]
    UnsupportedModelProvider(String),

    /// Provider quota exceeded or rate limit hit (hard stop error).
    #[error("Provider '{provider}' quota exceeded")]
    QuotaExceeded {
        /// The provider name.
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The truncation-continuation loop exceeded its round cap while the
    /// server kept reporting a truncated reply.
    #[error("response still truncated after {rounds} continuation rounds")]
    TruncationLimitExceeded {
        /// Number of rounds issued before giving up.
        rounds: usize,
    },

    /// Other unexpected errors.
    #[error("Other Model Error: {0}")]
    Other(String),
}

/// Represents a message in a conversation with a chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender (e.g., "user", "assistant", "system").
    pub role: String,
    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a user-role message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    /// Creates an assistant-role message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }

    /// Creates a system-role message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }
}

/// Parameters for controlling the model's generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Sampling temperature. Higher values mean the model takes more risks.
    pub temperature: Option<f32>,

    /// Nucleus sampling: the model considers the tokens with `top_p`
    /// probability mass.
    pub top_p: Option<f32>,

    /// The maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sequences where the API will stop generating further tokens.
    pub stop_sequences: Option<Vec<String>>,

    /// Repetition penalty applied to already-generated tokens.
    pub penalty_score: Option<f32>,

    /// System instruction sent alongside the conversation.
    pub system: Option<String>,
}

/// Usage statistics for a model request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,

    /// Number of tokens in the completion.
    pub completion_tokens: u32,

    /// Total number of tokens used.
    pub total_tokens: u32,
}

/// The response from a text generation or chat completion model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated content.
    pub content: String,

    /// The ID of the model used to generate the response.
    pub model_id: Option<String>,

    /// Usage statistics for the request.
    pub usage: Option<ModelUsage>,

    /// Whether the server cut the reply short. A truncated reply must be
    /// continued before being presented as final.
    pub is_truncated: bool,

    /// Wall-clock time spent on the request.
    #[serde(skip)]
    pub latency: Option<Duration>,

    /// Time to first streamed token, when the request was streamed.
    #[serde(skip)]
    pub first_token_latency: Option<Duration>,
}

impl ModelResponse {
    /// Creates a complete (non-truncated) response with the given content.
    #[must_use]
    pub fn complete(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model_id: None,
            usage: None,
            is_truncated: false,
            latency: None,
            first_token_latency: None,
        }
    }
}

/// A single chunk of a streamed chat reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Incremental content carried by this chunk.
    pub delta: String,
    /// Truncation flag as last reported by the server.
    pub is_truncated: bool,
    /// Whether this is the final chunk of the stream.
    pub is_end: bool,
}

/// A boxed stream of chat chunks.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, ModelError>> + Send>>;

/// A trait for interacting with chat and completion models.
///
/// All models must be `Send + Sync` to allow concurrent use across threads.
#[async_trait]
pub trait Model: Send + Sync {
    /// Generates a text completion based on the given prompt.
    ///
    /// # Errors
    /// Returns a `ModelError` if generation fails.
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError>;

    /// Generates a chat completion based on the given conversation history.
    ///
    /// # Errors
    /// Returns a `ModelError` if generation fails.
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError>;

    /// Opens a streamed chat completion for the given conversation history.
    ///
    /// Backends without streaming support keep the default implementation,
    /// which reports the capability as unsupported.
    ///
    /// # Errors
    /// Returns a `ModelError` if the stream cannot be established.
    async fn generate_chat_stream(
        &self,
        _messages: &[ChatMessage],
        _parameters: Option<ModelParameters>,
    ) -> Result<ChatStream, ModelError> {
        Err(ModelError::UnsupportedModelProvider(format!(
            "model '{}' does not support streaming",
            self.model_id()
        )))
    }

    /// Returns the ID of the model.
    fn model_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_constructors() {
        let msg = ChatMessage::user("hello");
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content, "hello");
        assert_eq!(ChatMessage::assistant("x").role, "assistant");
        assert_eq!(ChatMessage::system("x").role, "system");
    }

    #[test]
    fn test_complete_response_is_not_truncated() {
        let response = ModelResponse::complete("done");
        assert!(!response.is_truncated);
        assert_eq!(response.content, "done");
    }

    #[test]
    fn test_truncation_limit_error_display() {
        let err = ModelError::TruncationLimitExceeded { rounds: 10 };
        assert!(err.to_string().contains("10"));
    }
}
