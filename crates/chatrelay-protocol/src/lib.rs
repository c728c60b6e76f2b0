//! Wire types for the chatrelay streaming relay.
//!
//! Both ends of the relay speak the same two shapes:
//!
//! ```text
//! Client --[POST {messages: [...]}]--> Relay --[chat completion, streamed]--> Upstream
//! Client <--[data: {"content": ...}\n\n ... data: [DONE]\n\n]-- Relay
//! ```
//!
//! The request body is a plain conversation (`ChatRequest`). The response body is a
//! sequence of `StreamFrame`s in server-sent-event framing. The terminal sentinel is
//! a bare literal, not JSON, and must be matched before any JSON decoding.

pub mod frame;
pub mod messages;

pub use frame::{
    CHAT_ENDPOINT_PATH, DATA_FIELD, DONE_SENTINEL, EVENT_STREAM_CONTENT_TYPE, FrameError,
    StreamFrame,
};
pub use messages::{ChatMessage, ChatRequest, Role, ValidationError};
