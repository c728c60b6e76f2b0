//! Upstream client error types.

use thiserror::Error;

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Errors talking to the completion provider.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// No API credential configured.
    #[error("upstream API credential is not configured")]
    MissingCredential,

    /// Provider answered the call with a non-success status.
    #[error("upstream rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Provider answered with something other than an event stream.
    #[error("upstream returned unexpected content type: {0}")]
    UnexpectedContentType(String),

    /// Connection could not be established.
    #[error("failed to reach upstream: {0}")]
    Connection(String),

    /// Stream broke after it was opened.
    #[error("upstream stream failed: {0}")]
    Stream(String),

    /// A chunk could not be decoded.
    #[error("failed to decode upstream chunk: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Whether the failure comes from local configuration rather than the provider.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::MissingCredential)
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        Self::Connection(err.to_string())
    }
}
