//! Test utilities and common setup.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use futures::stream;

use chatrelay::upstream::{CompletionSource, DeltaStream, UpstreamError, UpstreamResult};
use chatrelay::{AppState, create_router};
use chatrelay_protocol::ChatMessage;

/// What a scripted upstream does when called.
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit these deltas, then complete normally.
    Complete(Vec<&'static str>),
    /// Emit these deltas, then fail mid-stream.
    FailAfter(Vec<&'static str>),
    /// Refuse the call before any stream is opened.
    Reject { status: u16, message: &'static str },
    /// Behave like a relay without a credential.
    Unconfigured,
}

/// Completion source that plays back a script and records its calls.
pub struct ScriptedSource {
    script: Script,
    calls: AtomicUsize,
    last_messages: Mutex<Option<Vec<ChatMessage>>>,
}

impl ScriptedSource {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Option<Vec<ChatMessage>> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionSource for ScriptedSource {
    async fn stream_completion(&self, messages: Vec<ChatMessage>) -> UpstreamResult<DeltaStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = Some(messages);

        match &self.script {
            Script::Complete(deltas) => {
                let items: Vec<UpstreamResult<String>> =
                    deltas.iter().map(|d| Ok(d.to_string())).collect();
                Ok(Box::pin(stream::iter(items)))
            }
            Script::FailAfter(deltas) => {
                let mut items: Vec<UpstreamResult<String>> =
                    deltas.iter().map(|d| Ok(d.to_string())).collect();
                items.push(Err(UpstreamError::Stream("connection reset".to_string())));
                Ok(Box::pin(stream::iter(items)))
            }
            Script::Reject { status, message } => Err(UpstreamError::Rejected {
                status: *status,
                message: message.to_string(),
            }),
            Script::Unconfigured => Err(UpstreamError::MissingCredential),
        }
    }

    fn is_configured(&self) -> bool {
        !matches!(self.script, Script::Unconfigured)
    }
}

/// Build the router around a scripted upstream.
pub fn test_app(script: Script) -> (Router, Arc<ScriptedSource>) {
    let source = ScriptedSource::new(script);
    let app = create_router(AppState::new(source.clone()));
    (app, source)
}
