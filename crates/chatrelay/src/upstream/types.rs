//! Chat-completions API types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use chatrelay_protocol::ChatMessage;

use super::{MAX_TOKENS, MODEL, TEMPERATURE};

/// Request body for a streaming chat completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Streaming request with the relay's fixed parameters.
    pub fn streaming(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: MODEL.to_string(),
            messages,
            stream: true,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }
}

/// One `chat.completion.chunk` event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionChunk {
    /// Text of the first choice's delta; empty when the chunk carries none
    /// (role announcements, finish markers).
    pub fn into_content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .unwrap_or_default()
    }
}

/// Error envelope the provider sends on rejected calls and, mid-stream, in
/// place of a chunk.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: Value,
}

impl ErrorEnvelope {
    pub fn message(&self) -> String {
        provider_error_message(&self.error)
    }
}

/// Human-readable text of a provider `error` value.
pub(crate) fn provider_error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}
