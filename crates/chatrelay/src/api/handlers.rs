//! Relay endpoint handlers.

use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header},
    response::Response,
};
use serde::Serialize;
use tracing::{error, info, instrument};

use chatrelay_protocol::{ChatRequest, EVENT_STREAM_CONTENT_TYPE};

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::framer::frame_deltas;
use crate::upstream::MODEL;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Static diagnostics for `GET /api/chat`.
#[derive(Debug, Serialize)]
pub struct ChatDiagnostics {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub model: &'static str,
    pub upstream_configured: bool,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/chat
pub async fn chat_diagnostics(State(state): State<AppState>) -> Json<ChatDiagnostics> {
    Json(ChatDiagnostics {
        status: "ok",
        service: "chat-relay",
        version: env!("CARGO_PKG_VERSION"),
        model: MODEL,
        upstream_configured: state.upstream.is_configured(),
    })
}

/// Relay a conversation to the upstream provider and stream the reply.
///
/// POST /api/chat
///
/// The body is validated before anything else; an invalid body never reaches
/// upstream. Once upstream accepts the call the response head is sent with
/// status 200 and every later failure only terminates the body.
#[instrument(skip_all)]
pub async fn chat(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request = ChatRequest::from_slice(&body)?;
    info!(message_count = request.messages.len(), "Chat relay called");

    let deltas = state.upstream.stream_completion(request.messages).await?;
    info!("Upstream accepted completion, streaming to client");

    build_event_stream_response(Body::from_stream(frame_deltas(deltas)))
}

/// Build an event-stream response around a framed body.
fn build_event_stream_response(body: Body) -> ApiResult<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no") // Disable nginx buffering if present
        .body(body)
        .map_err(|e| {
            error!("Failed to build SSE response: {:?}", e);
            ApiError::internal("Failed to build stream response")
        })
}
