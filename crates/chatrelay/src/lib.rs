//! Streaming chat relay.
//!
//! Accepts a conversation over HTTP, opens one streaming completion upstream and
//! re-frames the upstream deltas as a server-sent-event body. The crate can be
//! used as the `chatrelay` binary or embedded by building a router from
//! [`api::create_router`] with any [`upstream::CompletionSource`].

pub mod api;
pub mod config;
pub mod framer;
pub mod upstream;

pub use api::{AppState, create_router};
pub use config::AppConfig;
