//! HTTP clients for the platform's chat and completion endpoints.
//!
//! Both clients speak the platform's JSON protocol over `reqwest`, with a
//! constructor-time base URL override so tests can run against a local
//! mock server. Responses carry the server's truncation flag; callers that
//! must not surface partial replies wrap these clients with the
//! continuation helpers in [`crate::continuation`].

use crate::capabilities::validate_parameters;
use async_trait::async_trait;
use futures::Stream;
use nimbus_abstraction::{
    ChatChunk, ChatMessage, ChatStream, Model, ModelError, ModelParameters, ModelResponse,
    ModelUsage,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tracing::{debug, error};

const DEFAULT_BASE_URL: &str = "https://api.nimbus.dev/v1";

/// Client for the platform's `/chat/{model}` endpoint.
#[derive(Debug, Clone)]
pub struct PlatformChatModel {
    model_id: String,
    api_key: String,
    base_url: String,
    client: Client,
}

impl PlatformChatModel {
    /// Creates a chat client, reading the API key from `NIMBUS_API_KEY`.
    ///
    /// # Errors
    /// Returns a `ModelError` if the API key is not set.
    pub fn new(model_id: String) -> Result<Self, ModelError> {
        let api_key = env::var("NIMBUS_API_KEY").map_err(|_| {
            ModelError::UnsupportedModelProvider(
                "NIMBUS_API_KEY environment variable not set".to_string(),
            )
        })?;
        Ok(Self::with_api_key(model_id, api_key))
    }

    /// Creates a chat client with an explicit API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self { model_id, api_key, base_url: DEFAULT_BASE_URL.to_string(), client: Client::new() }
    }

    /// Overrides the API base URL (used by tests and private deployments).
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/{}", self.base_url, self.model_id)
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
        stream: bool,
    ) -> ChatRequest {
        let parameters = validate_parameters(&self.model_id, parameters.unwrap_or_default());
        let system = parameters
            .system
            .clone()
            .or_else(|| extract_system_prompt(messages));
        ChatRequest {
            messages: messages
                .iter()
                .filter(|message| message.role != "system")
                .map(|message| WireMessage {
                    role: message.role.clone(),
                    content: message.content.clone(),
                })
                .collect(),
            stream,
            system,
            temperature: parameters.temperature,
            top_p: parameters.top_p,
            max_output_tokens: parameters.max_tokens,
            stop: parameters.stop_sequences,
            penalty_score: parameters.penalty_score,
        }
    }
}

/// Extracts the first system message from the history; the platform takes
/// system context via a dedicated request field.
fn extract_system_prompt(messages: &[ChatMessage]) -> Option<String> {
    messages.iter().find(|message| message.role == "system").map(|message| message.content.clone())
}

/// Maps an HTTP error status to a typed model error.
async fn error_from_response(provider: &str, response: reqwest::Response) -> ModelError {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    error!(status = %status, error = %error_text, "platform API returned error status");
    if status == 401 || status == 403 {
        return ModelError::UnsupportedModelProvider(format!(
            "Authentication failed ({status}): {error_text}"
        ));
    }
    if status == 402 || status == 429 {
        return ModelError::QuotaExceeded {
            provider: provider.to_string(),
            message: Some(error_text),
        };
    }
    ModelError::ModelResponseError(format!("API error ({status}): {error_text}"))
}

#[async_trait]
impl Model for PlatformChatModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        let messages = vec![ChatMessage::user(prompt)];
        self.generate_chat_completion(&messages, parameters).await
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            "generating chat completion"
        );
        let request_body = self.build_request(messages, parameters, false);
        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "failed to send request to chat endpoint");
                ModelError::RequestError(format!("Network error: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(error_from_response("nimbus", response).await);
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            ModelError::SerializationError(format!("Failed to parse response: {e}"))
        })?;

        Ok(ModelResponse {
            content: chat_response.result,
            model_id: Some(self.model_id.clone()),
            usage: chat_response.usage.map(|usage| ModelUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }),
            is_truncated: chat_response.is_truncated,
            latency: Some(started.elapsed()),
            first_token_latency: None,
        })
    }

    async fn generate_chat_stream(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ChatStream, ModelError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            "opening chat completion stream"
        );
        let request_body = self.build_request(messages, parameters, true);
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| ModelError::RequestError(format!("Network error: {e}")))?;

        if !response.status().is_success() {
            return Err(error_from_response("nimbus", response).await);
        }

        Ok(Box::pin(SseChunkStream::new(response)))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Client for the platform's `/completions/{model}` endpoint.
#[derive(Debug, Clone)]
pub struct PlatformCompletionModel {
    model_id: String,
    api_key: String,
    base_url: String,
    client: Client,
}

impl PlatformCompletionModel {
    /// Creates a completion client, reading the API key from
    /// `NIMBUS_API_KEY`.
    ///
    /// # Errors
    /// Returns a `ModelError` if the API key is not set.
    pub fn new(model_id: String) -> Result<Self, ModelError> {
        let api_key = env::var("NIMBUS_API_KEY").map_err(|_| {
            ModelError::UnsupportedModelProvider(
                "NIMBUS_API_KEY environment variable not set".to_string(),
            )
        })?;
        Ok(Self::with_api_key(model_id, api_key))
    }

    /// Creates a completion client with an explicit API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self { model_id, api_key, base_url: DEFAULT_BASE_URL.to_string(), client: Client::new() }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Flattens a conversation into a single role-prefixed prompt; the
    /// completion endpoint has no message structure.
    fn flatten_messages(messages: &[ChatMessage]) -> String {
        let mut prompt = String::new();
        for message in messages {
            prompt.push_str(&message.role);
            prompt.push_str(": ");
            prompt.push_str(&message.content);
            prompt.push('\n');
        }
        prompt
    }
}

#[async_trait]
impl Model for PlatformCompletionModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(model_id = %self.model_id, prompt_len = prompt.len(), "generating completion");
        let parameters = validate_parameters(&self.model_id, parameters.unwrap_or_default());
        let request_body = CompletionRequest {
            prompt: prompt.to_string(),
            temperature: parameters.temperature,
            top_p: parameters.top_p,
            max_output_tokens: parameters.max_tokens,
            stop: parameters.stop_sequences,
            penalty_score: parameters.penalty_score,
        };
        let url = format!("{}/completions/{}", self.base_url, self.model_id);
        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| ModelError::RequestError(format!("Network error: {e}")))?;

        if !response.status().is_success() {
            return Err(error_from_response("nimbus", response).await);
        }

        let completion: ChatResponse = response.json().await.map_err(|e| {
            ModelError::SerializationError(format!("Failed to parse response: {e}"))
        })?;

        Ok(ModelResponse {
            content: completion.result,
            model_id: Some(self.model_id.clone()),
            usage: completion.usage.map(|usage| ModelUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }),
            is_truncated: completion.is_truncated,
            latency: Some(started.elapsed()),
            first_token_latency: None,
        })
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        let prompt = Self::flatten_messages(messages);
        self.generate_text(&prompt, parameters).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Platform API request/response structures

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    penalty_score: Option<f32>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    penalty_score: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    result: String,
    #[serde(default)]
    is_truncated: bool,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    result: String,
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    is_end: bool,
}

/// Parses the platform's SSE stream into [`ChatChunk`]s.
struct SseChunkStream {
    stream: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    buffer: String,
    done: bool,
}

impl SseChunkStream {
    fn new(response: reqwest::Response) -> Self {
        Self { stream: Box::pin(response.bytes_stream()), buffer: String::new(), done: false }
    }

    /// Pops the next complete SSE event out of the buffer, if any.
    fn next_event(&mut self) -> Option<String> {
        let end = self.buffer.find("\n\n")?;
        let event = self.buffer[..end].to_string();
        self.buffer = self.buffer[end + 2..].to_string();
        Some(event)
    }
}

impl Stream for SseChunkStream {
    type Item = Result<ChatChunk, ModelError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            while let Some(event) = self.next_event() {
                let Some(data) = event.strip_prefix("data: ") else {
                    // Comments and keep-alives are skipped.
                    continue;
                };
                if data.trim() == "[DONE]" {
                    self.done = true;
                    return Poll::Ready(None);
                }
                match serde_json::from_str::<StreamEvent>(data) {
                    Ok(parsed) => {
                        let chunk = ChatChunk {
                            delta: parsed.result,
                            is_truncated: parsed.is_truncated,
                            is_end: parsed.is_end,
                        };
                        if chunk.is_end {
                            self.done = true;
                        }
                        return Poll::Ready(Some(Ok(chunk)));
                    }
                    Err(e) => {
                        // Skip malformed chunks (some servers send empty
                        // frames between events).
                        debug!("failed to parse SSE chunk: {}", e);
                    }
                }
            }

            match self.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(chunk) => self.buffer.push_str(&chunk),
                    Err(e) => {
                        return Poll::Ready(Some(Err(ModelError::SerializationError(format!(
                            "Failed to decode SSE bytes: {e}"
                        )))));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(ModelError::RequestError(format!(
                        "Stream error: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_chat_completion_parses_truncation_flag() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/nimbus-chat-8k")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"result": "partial", "is_truncated": true, "usage": {"prompt_tokens": 3, "completion_tokens": 5, "total_tokens": 8}}"#,
            )
            .create_async()
            .await;

        let model =
            PlatformChatModel::with_api_key("nimbus-chat-8k".to_string(), "key".to_string())
                .with_base_url(server.url());
        let response = model
            .generate_chat_completion(&[ChatMessage::user("hi")], None)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(response.content, "partial");
        assert!(response.is_truncated);
        assert_eq!(response.usage.unwrap().total_tokens, 8);
        assert!(response.latency.is_some());
    }

    #[tokio::test]
    async fn test_quota_errors_are_typed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/nimbus-chat-8k")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let model =
            PlatformChatModel::with_api_key("nimbus-chat-8k".to_string(), "key".to_string())
                .with_base_url(server.url());
        let err = model.generate_text("hi", None).await.unwrap_err();
        assert!(matches!(err, ModelError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn test_auth_errors_are_typed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/completions/nimbus-completion-8k")
            .with_status(401)
            .with_body("bad key")
            .create_async()
            .await;

        let model = PlatformCompletionModel::with_api_key(
            "nimbus-completion-8k".to_string(),
            "key".to_string(),
        )
        .with_base_url(server.url());
        let err = model.generate_text("hi", None).await.unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedModelProvider(_)));
    }

    #[tokio::test]
    async fn test_stream_yields_chunks_until_end() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"result\": \"Hel\", \"is_truncated\": false, \"is_end\": false}\n\n",
            "data: {\"result\": \"lo\", \"is_truncated\": false, \"is_end\": true}\n\n",
        );
        server
            .mock("POST", "/chat/nimbus-chat-8k")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let model =
            PlatformChatModel::with_api_key("nimbus-chat-8k".to_string(), "key".to_string())
                .with_base_url(server.url());
        let mut stream =
            model.generate_chat_stream(&[ChatMessage::user("hi")], None).await.unwrap();
        let mut collected = String::new();
        let mut saw_end = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            collected.push_str(&chunk.delta);
            saw_end = chunk.is_end;
        }
        assert_eq!(collected, "Hello");
        assert!(saw_end);
    }

    #[tokio::test]
    async fn test_completion_flattens_chat_history() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/completions/nimbus-completion-8k")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"prompt": "user: question\nassistant: answer\nuser: follow-up\n"}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": "ok", "is_truncated": false}"#)
            .create_async()
            .await;

        let model = PlatformCompletionModel::with_api_key(
            "nimbus-completion-8k".to_string(),
            "key".to_string(),
        )
        .with_base_url(server.url());
        let messages = vec![
            ChatMessage::user("question"),
            ChatMessage::assistant("answer"),
            ChatMessage::user("follow-up"),
        ];
        let response = model.generate_chat_completion(&messages, None).await.unwrap();
        mock.assert_async().await;
        assert_eq!(response.content, "ok");
    }
}
