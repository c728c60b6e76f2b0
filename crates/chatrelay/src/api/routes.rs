//! API route definitions.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use chatrelay_protocol::CHAT_ENDPOINT_PATH;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // The relay is not a trust boundary; any origin may call it. The layer also
    // answers OPTIONS on every route with the static permissive headers.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            CHAT_ENDPOINT_PATH,
            post(handlers::chat).get(handlers::chat_diagnostics),
        )
        .layer(cors)
        .layer(trace_layer)
        .with_state(state)
}
