//! Upstream completion source.
//!
//! The relay only needs one capability from the LLM provider: open a streaming
//! completion for a conversation and hand back its text deltas in order. That
//! capability is the `CompletionSource` trait so handlers can be driven by a
//! scripted source in tests.

mod client;
mod error;
mod types;

use async_trait::async_trait;
use futures::stream::BoxStream;

use chatrelay_protocol::ChatMessage;

pub use client::OpenAiClient;
pub use error::{UpstreamError, UpstreamResult};
pub use types::{CompletionChunk, CompletionRequest};

/// Model used for every relayed completion.
pub const MODEL: &str = "gpt-3.5-turbo";

/// Sampling temperature used for every relayed completion.
pub const TEMPERATURE: f32 = 0.7;

/// Upper bound on generated tokens per completion.
pub const MAX_TOKENS: u32 = 1000;

/// Ordered upstream text deltas. Ends on natural completion; an `Err` item is
/// the last item of a failed stream.
pub type DeltaStream = BoxStream<'static, UpstreamResult<String>>;

#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Open one streaming completion.
    ///
    /// Resolves only once upstream has accepted the call, so rejections surface
    /// here rather than inside the stream.
    async fn stream_completion(&self, messages: Vec<ChatMessage>) -> UpstreamResult<DeltaStream>;

    /// Whether a credential is present. Used for diagnostics only; a missing
    /// credential is still reported lazily by `stream_completion`.
    fn is_configured(&self) -> bool;
}
