//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use reqwest::Client;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource, retry};
use serde_json::Value;
use tracing::{debug, warn};

use chatrelay_protocol::{ChatMessage, DONE_SENTINEL};

use super::error::{UpstreamError, UpstreamResult};
use super::types::{CompletionChunk, CompletionRequest, ErrorEnvelope, provider_error_message};
use super::{CompletionSource, DeltaStream};

/// Client for a chat-completions endpoint.
///
/// Built once at startup and shared read-only by every relay call.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    /// HTTP client.
    client: Client,
    /// Base URL (e.g., "https://api.openai.com/v1").
    base_url: String,
    /// Bearer credential. Absence is only reported when a call is made.
    api_key: Option<String>,
}

impl OpenAiClient {
    /// Create a new client.
    ///
    /// Only the connect phase is bounded; a total request timeout would cut
    /// long-running completion streams.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        connect_timeout: Duration,
    ) -> UpstreamResult<Self> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionSource for OpenAiClient {
    async fn stream_completion(&self, messages: Vec<ChatMessage>) -> UpstreamResult<DeltaStream> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredential)?;

        let url = self.completions_url();
        let request = CompletionRequest::streaming(messages);
        debug!(
            url = %url,
            model = %request.model,
            message_count = request.messages.len(),
            "Opening upstream completion stream"
        );

        let builder = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("Accept", "text/event-stream")
            .json(&request);

        let mut events =
            EventSource::new(builder).map_err(|e| UpstreamError::Connection(e.to_string()))?;
        events.set_retry_policy(Box::new(retry::Never));

        // Wait for the response head so rejections become errors before any
        // bytes are sent to the caller.
        let mut early = None;
        match events.next().await {
            Some(Ok(Event::Open)) => {}
            Some(Ok(Event::Message(message))) => {
                debug!("Upstream sent data before open");
                early = Some(message.data);
            }
            Some(Err(err)) => {
                events.close();
                return Err(open_error(err).await);
            }
            None => {
                return Err(UpstreamError::Connection(
                    "stream closed before opening".to_string(),
                ));
            }
        }

        Ok(Box::pin(completion_deltas(events, early)))
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Translate a failure on the first poll into an upstream error.
async fn open_error(err: EventSourceError) -> UpstreamError {
    match err {
        EventSourceError::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.message())
                .unwrap_or(body);
            UpstreamError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
        EventSourceError::InvalidContentType(content_type, _) => {
            UpstreamError::UnexpectedContentType(
                content_type.to_str().unwrap_or("<binary>").to_string(),
            )
        }
        EventSourceError::Transport(err) => UpstreamError::Connection(err.to_string()),
        other => UpstreamError::Connection(other.to_string()),
    }
}

/// What one provider `data:` payload means for the relay.
#[derive(Debug)]
enum Payload {
    Done,
    Delta(String),
    Failed(UpstreamError),
}

/// Classify a provider payload. An `error` object in place of a chunk is a
/// mid-stream failure, never an empty delta.
fn interpret(data: &str) -> Payload {
    if data == DONE_SENTINEL {
        return Payload::Done;
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(err) => return Payload::Failed(UpstreamError::Decode(err.to_string())),
    };
    if let Some(error) = value.get("error").filter(|error| !error.is_null()) {
        return Payload::Failed(UpstreamError::Stream(provider_error_message(error)));
    }

    match serde_json::from_value::<CompletionChunk>(value) {
        Ok(chunk) => Payload::Delta(chunk.into_content()),
        Err(err) => Payload::Failed(UpstreamError::Decode(err.to_string())),
    }
}

struct DeltaState {
    events: EventSource,
    pending: Option<String>,
}

/// Map upstream events to content deltas, ending at the provider's own `[DONE]`.
///
/// `pending` is a payload that was already read before the stream was handed
/// over; it is emitted first.
fn completion_deltas(
    events: EventSource,
    pending: Option<String>,
) -> impl Stream<Item = UpstreamResult<String>> + Send {
    stream::unfold(Some(DeltaState { events, pending }), |state| async move {
        let DeltaState {
            mut events,
            mut pending,
        } = state?;
        loop {
            let data = match pending.take() {
                Some(data) => data,
                None => match events.next().await {
                    Some(Ok(Event::Open)) => continue,
                    Some(Ok(Event::Message(message))) => message.data,
                    Some(Err(EventSourceError::StreamEnded)) | None => {
                        events.close();
                        return None;
                    }
                    Some(Err(err)) => {
                        events.close();
                        return Some((Err(UpstreamError::Stream(err.to_string())), None));
                    }
                },
            };

            match interpret(&data) {
                Payload::Done => {
                    events.close();
                    return None;
                }
                Payload::Delta(content) => {
                    let next = DeltaState {
                        events,
                        pending: None,
                    };
                    return Some((Ok(content), Some(next)));
                }
                Payload::Failed(err) => {
                    warn!(error = %err, "Upstream reported a failure mid-stream");
                    events.close();
                    return Some((Err(err), None));
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: Option<&str>) -> OpenAiClient {
        OpenAiClient::new(
            "https://api.example.com/v1/",
            api_key.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_completions_url_trims_trailing_slash() {
        assert_eq!(
            client(Some("sk-test")).completions_url(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_blank_key_is_unconfigured() {
        assert!(!client(Some("  ")).is_configured());
        assert!(!client(None).is_configured());
        assert!(client(Some("sk-test")).is_configured());
    }

    #[test]
    fn test_interpret_payloads() {
        assert!(matches!(interpret("[DONE]"), Payload::Done));
        assert!(matches!(
            interpret(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#),
            Payload::Delta(content) if content == "Hi"
        ));
        assert!(matches!(
            interpret(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
            Payload::Delta(content) if content.is_empty()
        ));
    }

    #[test]
    fn test_interpret_error_object_is_failure() {
        let payload = interpret(
            r#"{"error":{"message":"The server is overloaded","type":"server_error"}}"#,
        );
        assert!(matches!(
            payload,
            Payload::Failed(UpstreamError::Stream(message)) if message == "The server is overloaded"
        ));
    }

    #[test]
    fn test_interpret_malformed_is_decode_failure() {
        assert!(matches!(
            interpret("not json"),
            Payload::Failed(UpstreamError::Decode(_))
        ));
        assert!(matches!(
            interpret(r#"{"choices":"nope"}"#),
            Payload::Failed(UpstreamError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_any_request() {
        let result = client(None)
            .stream_completion(vec![ChatMessage::user("hi")])
            .await;
        assert!(matches!(result, Err(UpstreamError::MissingCredential)));
    }
}
