//! Client side of the chat relay.
//!
//! Decodes the relay's event-stream body into frames, merges them into a
//! [`Transcript`], and gates the chat surface behind an auth provider.

pub mod auth;
pub mod decoder;
pub mod session;
pub mod transcript;
pub mod transport;

pub use decoder::{StreamDecoder, TransportError, decode_stream};
pub use session::{ChatError, ChatSession, SubmitOutcome};
pub use transcript::{FAILURE_MESSAGE, Transcript, TranscriptError, Turn, TurnId};
pub use transport::{ByteStream, ClientError, HttpRelay, RelayTransport};
