//! Server-sent-event framing for relay responses.
//!
//! Each frame is one `data:` record followed by a blank line:
//!
//! ```text
//! data: {"content":"Hel"}
//!
//! data: [DONE]
//!
//! ```

use serde::Deserialize;
use thiserror::Error;

/// Path of the relay endpoint, relative to the optional base path.
pub const CHAT_ENDPOINT_PATH: &str = "/api/chat";

/// Content type of a relay response body.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Field name carrying frame payloads.
pub const DATA_FIELD: &str = "data";

/// Literal payload of the terminal frame. Never JSON-encoded.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A single wire-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A non-empty content fragment.
    Delta(String),
    /// Graceful end of the stream. Nothing follows it.
    Done,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct DeltaPayload {
    #[serde(default)]
    content: Option<String>,
}

impl StreamFrame {
    /// Build a delta frame, or `None` for an empty fragment.
    pub fn delta(content: impl Into<String>) -> Option<Self> {
        let content = content.into();
        if content.is_empty() {
            None
        } else {
            Some(Self::Delta(content))
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Serialize into the exact bytes written to the wire.
    pub fn encode(&self) -> String {
        match self {
            Self::Delta(content) => {
                let payload = serde_json::json!({ "content": content });
                format!("{DATA_FIELD}: {payload}\n\n")
            }
            Self::Done => format!("{DATA_FIELD}: {DONE_SENTINEL}\n\n"),
        }
    }

    /// Interpret the joined `data` value of one record.
    ///
    /// Returns `Ok(None)` for a well-formed payload that carries no content.
    pub fn parse_data(data: &str) -> Result<Option<Self>, FrameError> {
        if data == DONE_SENTINEL {
            return Ok(Some(Self::Done));
        }

        let payload: DeltaPayload = serde_json::from_str(data)?;
        Ok(payload.content.and_then(Self::delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_delta() {
        let frame = StreamFrame::delta("Hel").unwrap();
        assert_eq!(frame.encode(), "data: {\"content\":\"Hel\"}\n\n");
    }

    #[test]
    fn test_encode_escapes_json() {
        let frame = StreamFrame::delta("line\n\"quoted\"").unwrap();
        assert_eq!(
            frame.encode(),
            "data: {\"content\":\"line\\n\\\"quoted\\\"\"}\n\n"
        );
    }

    #[test]
    fn test_encode_done() {
        assert_eq!(StreamFrame::Done.encode(), "data: [DONE]\n\n");
        assert!(StreamFrame::Done.is_terminal());
    }

    #[test]
    fn test_empty_delta_is_not_a_frame() {
        assert_eq!(StreamFrame::delta(""), None);
    }

    #[test]
    fn test_parse_sentinel_before_json() {
        assert_eq!(
            StreamFrame::parse_data("[DONE]").unwrap(),
            Some(StreamFrame::Done)
        );
    }

    #[test]
    fn test_parse_delta() {
        assert_eq!(
            StreamFrame::parse_data(r#"{"content":"lo, "}"#).unwrap(),
            Some(StreamFrame::Delta("lo, ".to_string()))
        );
    }

    #[test]
    fn test_parse_contentless_payload() {
        assert_eq!(StreamFrame::parse_data(r#"{"content":""}"#).unwrap(), None);
        assert_eq!(StreamFrame::parse_data(r#"{}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(StreamFrame::parse_data("{not json").is_err());
    }
}
