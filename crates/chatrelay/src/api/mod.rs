//! HTTP API module.
//!
//! Provides the relay endpoint and its diagnostics routes.

mod error;
pub mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse, GENERIC_FAILURE};
pub use routes::create_router;
pub use state::AppState;
