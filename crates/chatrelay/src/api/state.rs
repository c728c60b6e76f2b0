//! Application state shared across handlers.

use std::sync::Arc;

use crate::upstream::CompletionSource;

/// State handed to every handler.
///
/// Holds no per-request data; the upstream client is constructed once and only
/// read afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Completion source used by the relay endpoint.
    pub upstream: Arc<dyn CompletionSource>,
}

impl AppState {
    pub fn new(upstream: Arc<dyn CompletionSource>) -> Self {
        Self { upstream }
    }
}
