//! Conversation types sent from the client to the relay.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One `{role, content}` entry of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of a relay call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// Why an inbound relay request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Body was not JSON at all.
    #[error("Request body must be valid JSON: {0}")]
    MalformedBody(String),

    /// `messages` was absent, null, or not an array.
    #[error("Messages array is required")]
    MessagesRequired,

    /// An entry of `messages` did not have a known role and string content.
    #[error("Invalid message at index {index}: {reason}")]
    InvalidMessage { index: usize, reason: String },
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    /// Parse and validate a raw request body.
    ///
    /// Validation runs on the untyped JSON first so a missing or non-array
    /// `messages` field is reported as such rather than as a generic decode error.
    pub fn from_slice(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;

        let Some(Value::Array(entries)) = value.get("messages") else {
            return Err(ValidationError::MessagesRequired);
        };

        let messages = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                ChatMessage::deserialize(entry).map_err(|e| ValidationError::InvalidMessage {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { messages })
    }
}
