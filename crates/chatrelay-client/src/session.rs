//! Chat session: one transcript driven by relay calls.

use std::pin::pin;

use futures::StreamExt;
use thiserror::Error;
use tracing::{info, warn};

use chatrelay_protocol::{ChatRequest, StreamFrame};

use crate::decoder::{TransportError, decode_stream};
use crate::transcript::{FAILURE_MESSAGE, Transcript, TranscriptError};
use crate::transport::RelayTransport;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Transcript(TranscriptError),
}

impl From<TranscriptError> for ChatError {
    fn from(err: TranscriptError) -> Self {
        match err {
            TranscriptError::EmptyMessage => Self::EmptyMessage,
            other => Self::Transcript(other),
        }
    }
}

/// How a submission ended. Every variant is final; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The relay sent the terminal frame.
    Completed,
    /// The body ended without the terminal frame. Content is kept.
    Truncated,
    /// Reading failed after some content arrived. Content is kept.
    Interrupted { error: TransportError },
    /// Nothing arrived. The reply was replaced by the failure message.
    Failed { reason: String },
}

pub struct ChatSession<T> {
    transport: T,
    transcript: Transcript,
}

impl<T: RelayTransport> ChatSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            transcript: Transcript::new(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `input` and merge the streamed reply into the transcript.
    ///
    /// `on_delta` sees every fragment as it is merged. Blank input returns
    /// [`ChatError::EmptyMessage`] without touching the transcript or the
    /// network.
    pub async fn submit<F>(
        &mut self,
        input: &str,
        mut on_delta: F,
    ) -> Result<SubmitOutcome, ChatError>
    where
        F: FnMut(&str),
    {
        self.transcript.append_user_turn(input)?;
        let request = ChatRequest::new(self.transcript.request_messages());

        let body = match self.transport.open(&request).await {
            Ok(body) => body,
            Err(err) => {
                warn!("relay call failed: {}", err);
                self.transcript.mark_failed(FAILURE_MESSAGE)?;
                return Ok(SubmitOutcome::Failed {
                    reason: err.to_string(),
                });
            }
        };

        let mut frames = pin!(decode_stream(body));
        while let Some(item) = frames.next().await {
            match item {
                Ok(StreamFrame::Delta(delta)) => {
                    self.transcript.apply_delta(&delta)?;
                    on_delta(&delta);
                }
                Ok(StreamFrame::Done) => {
                    info!("reply completed");
                    return Ok(SubmitOutcome::Completed);
                }
                Err(error) => {
                    warn!("relay stream broke: {}", error);
                    if self.transcript.awaiting_first_delta() {
                        self.transcript.mark_failed(FAILURE_MESSAGE)?;
                        return Ok(SubmitOutcome::Failed {
                            reason: error.to_string(),
                        });
                    }
                    return Ok(SubmitOutcome::Interrupted { error });
                }
            }
        }

        warn!("relay stream ended without a terminal frame");
        if self.transcript.awaiting_first_delta() {
            self.transcript.mark_failed(FAILURE_MESSAGE)?;
            return Ok(SubmitOutcome::Failed {
                reason: "stream ended before any content".to_string(),
            });
        }
        Ok(SubmitOutcome::Truncated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use chatrelay_protocol::{ChatMessage, Role};

    use super::*;
    use crate::transport::{ByteStream, ClientError};

    enum Reply {
        Body(Vec<Result<&'static str, &'static str>>),
        Reject,
    }

    struct FakeTransport {
        reply: Reply,
        calls: AtomicUsize,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl FakeTransport {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn body(chunks: &[&'static str]) -> Self {
            Self::new(Reply::Body(chunks.iter().map(|c| Ok(*c)).collect()))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RelayTransport for FakeTransport {
        async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());

            match &self.reply {
                Reply::Body(chunks) => {
                    let items: Vec<Result<Bytes, TransportError>> = chunks
                        .iter()
                        .map(|c| match c {
                            Ok(text) => Ok(Bytes::from(*text)),
                            Err(msg) => Err(TransportError(msg.to_string())),
                        })
                        .collect();
                    Ok(futures::stream::iter(items).boxed())
                }
                Reply::Reject => Err(ClientError::Rejected {
                    status: 500,
                    message: "Failed to process chat request".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_completed_reply() {
        let transport = FakeTransport::body(&[
            "data: {\"content\":\"Hel\"}\n\ndata: {\"con",
            "tent\":\"lo, \"}\n\ndata: {\"content\":\"world!\"}\n\n",
            "data: [DONE]\n\n",
        ]);
        let mut session = ChatSession::new(transport);

        let mut seen = Vec::new();
        let outcome = session
            .submit("Say hello", |delta| seen.push(delta.to_string()))
            .await
            .unwrap();

        assert_eq!(outcome, SubmitOutcome::Completed);
        assert_eq!(seen, vec!["Hel", "lo, ", "world!"]);
        assert_eq!(session.transcript().last().unwrap().content(), "Hello, world!");
        assert_eq!(session.transport().calls(), 1);
    }

    #[tokio::test]
    async fn test_blank_submission_makes_no_call() {
        let mut session = ChatSession::new(FakeTransport::body(&["data: [DONE]\n\n"]));

        let result = session.submit("   ", |_| {}).await;

        assert_eq!(result, Err(ChatError::EmptyMessage));
        assert!(session.transcript().is_empty());
        assert_eq!(session.transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_truncated_reply_keeps_content() {
        let transport = FakeTransport::body(&["data: {\"content\":\"Partial\"}\n\n"]);
        let mut session = ChatSession::new(transport);

        let outcome = session.submit("hi", |_| {}).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Truncated);
        assert_eq!(session.transcript().last().unwrap().content(), "Partial");
    }

    #[tokio::test]
    async fn test_empty_truncated_reply_marks_failed() {
        let mut session = ChatSession::new(FakeTransport::body(&[": keep-alive\n\n"]));

        let outcome = session.submit("hi", |_| {}).await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
        assert_eq!(session.transcript().last().unwrap().content(), FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_interrupted_reply_keeps_content() {
        let transport = FakeTransport::new(Reply::Body(vec![
            Ok("data: {\"content\":\"Partial\"}\n\n"),
            Err("connection reset"),
        ]));
        let mut session = ChatSession::new(transport);

        let outcome = session.submit("hi", |_| {}).await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Interrupted { .. }));
        assert_eq!(session.transcript().last().unwrap().content(), "Partial");
    }

    #[tokio::test]
    async fn test_error_before_content_marks_failed() {
        let transport = FakeTransport::new(Reply::Body(vec![Err("connection reset")]));
        let mut session = ChatSession::new(transport);

        let outcome = session.submit("hi", |_| {}).await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
        assert_eq!(session.transcript().last().unwrap().content(), FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_rejected_call_marks_failed() {
        let mut session = ChatSession::new(FakeTransport::new(Reply::Reject));

        let outcome = session.submit("hi", |_| {}).await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
        let turns = session.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content(), "hi");
        assert_eq!(turns[1].role(), Role::Assistant);
        assert_eq!(turns[1].content(), FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_second_submission_sends_history() {
        let transport = FakeTransport::body(&["data: {\"content\":\"one\"}\n\ndata: [DONE]\n\n"]);
        let mut session = ChatSession::new(transport);

        session.submit("first", |_| {}).await.unwrap();
        session.submit("second", |_| {}).await.unwrap();

        let requests = session.transport().requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages, vec![ChatMessage::user("first")]);
        assert_eq!(
            requests[1].messages,
            vec![
                ChatMessage::user("first"),
                ChatMessage::assistant("one"),
                ChatMessage::user("second"),
            ]
        );
    }
}
