//! Model client implementations for Nimbus.
//!
//! This crate provides concrete implementations of the `Model` trait for
//! the platform's chat and completion endpoints, the per-model capability
//! tables, and the truncation-continuation protocol.

pub mod capabilities;
pub mod client;
pub mod continuation;
pub mod factory;

use async_trait::async_trait;
use futures::stream;
use nimbus_abstraction::{
    ChatChunk, ChatMessage, ChatStream, Model, ModelError, ModelParameters, ModelResponse,
    ModelUsage,
};
use tracing::debug;

pub use capabilities::{capabilities_for, validate_parameters, ModelCapabilities, CAPABILITIES};
pub use client::{PlatformChatModel, PlatformCompletionModel};
pub use continuation::{
    generate_with_continuation, stream_with_continuation, CONTINUE_PROMPT, DEFAULT_MAX_ROUNDS,
};
pub use factory::{ModelConfig, ModelFactory, ModelKind};

/// A mock implementation of the `Model` trait for testing and
/// demonstration.
#[derive(Debug, Default)]
pub struct MockModel {
    id: String,
}

impl MockModel {
    /// Creates a new `MockModel` with the given ID.
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(model_id = %self.id, prompt = %prompt, parameters = ?parameters, "MockModel generating text");

        let content = format!("Mock response for: {prompt}");
        let prompt_tokens = count_tokens(prompt);
        let completion_tokens = count_tokens(&content);
        Ok(ModelResponse {
            usage: Some(ModelUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
            model_id: Some(self.id.clone()),
            ..ModelResponse::complete(content)
        })
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.id,
            message_count = messages.len(),
            parameters = ?parameters,
            "MockModel generating chat completion"
        );
        let last = messages.last().map_or("", |message| message.content.as_str());
        self.generate_text(last, None).await
    }

    async fn generate_chat_stream(
        &self,
        messages: &[ChatMessage],
        _parameters: Option<ModelParameters>,
    ) -> Result<ChatStream, ModelError> {
        let last = messages.last().map_or("", |message| message.content.as_str());
        let chunks = vec![
            ChatChunk {
                delta: format!("Mock response for: {last}"),
                is_truncated: false,
                is_end: false,
            },
            ChatChunk { delta: String::new(), is_truncated: false, is_end: true },
        ];
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok::<ChatChunk, ModelError>))))
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

/// Count tokens in a string (simplified: word count).
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}
