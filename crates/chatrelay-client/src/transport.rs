//! HTTP transport to the relay endpoint.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use chatrelay_protocol::{CHAT_ENDPOINT_PATH, ChatRequest};

use crate::decoder::TransportError;

/// Raw body of an accepted relay call.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Errors opening a relay call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The relay answered with a non-success status.
    #[error("relay rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never got a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid relay URL: {0}")]
    InvalidUrl(String),
}

/// Something that can open a relay call and hand back its body.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ClientError>;
}

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

/// Relay transport over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRelay {
    client: Client,
    endpoint: String,
}

impl HttpRelay {
    /// Build a transport for the relay at `base_url`.
    ///
    /// `base_path` is an optional deployment prefix placed in front of the
    /// chat path. It may be empty, with or without slashes.
    pub fn new(base_url: &str, base_path: &str) -> Result<Self, ClientError> {
        let endpoint = endpoint_url(base_url, base_path)?;
        Ok(Self {
            client: Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn endpoint_url(base_url: &str, base_path: &str) -> Result<String, ClientError> {
    let base_url = base_url.trim().trim_end_matches('/');
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ClientError::InvalidUrl(base_url.to_string()));
    }

    let base_path = base_path.trim().trim_matches('/');
    if base_path.is_empty() {
        Ok(format!("{base_url}{CHAT_ENDPOINT_PATH}"))
    } else {
        Ok(format!("{base_url}/{base_path}{CHAT_ENDPOINT_PATH}"))
    }
}

#[async_trait]
impl RelayTransport for HttpRelay {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        debug!(
            endpoint = %self.endpoint,
            message_count = request.messages.len(),
            "opening relay call"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<RelayErrorBody>(&text) {
                Ok(body) => match body.details {
                    Some(details) => format!("{}: {}", body.error, details),
                    None => body.error,
                },
                Err(_) => text,
            };
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from))
            .boxed())
    }
}
