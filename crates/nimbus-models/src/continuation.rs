//! Truncation-continuation protocol.
//!
//! A reply flagged `is_truncated` must not be presented as final. The
//! unary helper re-issues the request with the partial reply and a fixed
//! continue prompt appended to the history, concatenating results until
//! the server reports a complete reply. The streaming variant does the
//! same transparently: the caller sees one logically continuous stream
//! even when it spans several requests.
//!
//! Both loops are bounded: a server that keeps reporting truncation past
//! `max_rounds` requests surfaces `TruncationLimitExceeded` instead of
//! spinning forever.

use futures::stream::{self, StreamExt};
use nimbus_abstraction::{
    ChatChunk, ChatMessage, ChatStream, Model, ModelError, ModelParameters, ModelResponse,
};
use std::sync::Arc;
use tracing::debug;

/// User turn appended after a truncated partial reply.
pub const CONTINUE_PROMPT: &str = "continue";

/// Default cap on continuation rounds (requests issued per logical reply).
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Generates a chat completion, automatically continuing truncated replies
/// until the server reports completion.
///
/// # Errors
/// Returns `TruncationLimitExceeded` when the reply is still truncated
/// after `max_rounds` requests, or any transport error from the model.
pub async fn generate_with_continuation(
    model: &dyn Model,
    messages: &[ChatMessage],
    parameters: Option<ModelParameters>,
    max_rounds: usize,
) -> Result<ModelResponse, ModelError> {
    let mut history = messages.to_vec();
    let mut content = String::new();
    let mut rounds = 0_usize;
    loop {
        if rounds >= max_rounds {
            return Err(ModelError::TruncationLimitExceeded { rounds });
        }
        rounds += 1;
        let response = model.generate_chat_completion(&history, parameters.clone()).await?;
        content.push_str(&response.content);
        if !response.is_truncated {
            debug!(rounds, "continuation complete");
            let mut complete = response;
            complete.content = content;
            return Ok(complete);
        }
        debug!(rounds, "reply truncated, continuing");
        history.push(ChatMessage::assistant(response.content));
        history.push(ChatMessage::user(CONTINUE_PROMPT));
    }
}

struct StreamState {
    model: Arc<dyn Model>,
    history: Vec<ChatMessage>,
    parameters: Option<ModelParameters>,
    max_rounds: usize,
    rounds: usize,
    current: Option<ChatStream>,
    round_content: String,
    last_truncated: bool,
    done: bool,
}

impl StreamState {
    /// Records the finished round's partial reply and the continue prompt.
    fn push_continuation(&mut self) {
        let partial = std::mem::take(&mut self.round_content);
        self.history.push(ChatMessage::assistant(partial));
        self.history.push(ChatMessage::user(CONTINUE_PROMPT));
    }
}

/// Opens a streamed chat completion that transparently re-issues follow-up
/// streams while the server reports truncation. Intermediate end-of-stream
/// chunks are forwarded with `is_end` cleared; only the final round's end
/// chunk carries `is_end = true`.
#[must_use]
pub fn stream_with_continuation(
    model: Arc<dyn Model>,
    messages: Vec<ChatMessage>,
    parameters: Option<ModelParameters>,
    max_rounds: usize,
) -> ChatStream {
    let state = StreamState {
        model,
        history: messages,
        parameters,
        max_rounds,
        rounds: 0,
        current: None,
        round_content: String::new(),
        last_truncated: false,
        done: false,
    };
    Box::pin(stream::try_unfold(state, |mut state| async move {
        loop {
            if state.done {
                return Ok(None);
            }
            if state.current.is_none() {
                if state.rounds >= state.max_rounds {
                    return Err(ModelError::TruncationLimitExceeded { rounds: state.rounds });
                }
                state.rounds += 1;
                debug!(round = state.rounds, "opening continuation stream round");
                let stream = state
                    .model
                    .generate_chat_stream(&state.history, state.parameters.clone())
                    .await?;
                state.current = Some(stream);
                state.round_content.clear();
                state.last_truncated = false;
            }

            let item = match state.current.as_mut() {
                Some(stream) => stream.next().await,
                None => None,
            };
            match item {
                Some(Ok(chunk)) => {
                    state.round_content.push_str(&chunk.delta);
                    state.last_truncated = chunk.is_truncated;
                    if chunk.is_end {
                        state.current = None;
                        if chunk.is_truncated {
                            state.push_continuation();
                            let forwarded = ChatChunk {
                                delta: chunk.delta,
                                is_truncated: true,
                                is_end: false,
                            };
                            return Ok(Some((forwarded, state)));
                        }
                        state.done = true;
                        return Ok(Some((chunk, state)));
                    }
                    return Ok(Some((chunk, state)));
                }
                Some(Err(e)) => return Err(e),
                None => {
                    // Stream closed without an end marker; the last reported
                    // truncation flag decides whether a follow-up is due.
                    state.current = None;
                    if state.last_truncated {
                        state.push_continuation();
                        continue;
                    }
                    state.done = true;
                    return Ok(None);
                }
            }
        }
    }))
}
