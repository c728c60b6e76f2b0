//! Client-side conversation transcript.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use chatrelay_protocol::{ChatMessage, Role};

/// Content shown in place of an assistant reply that never arrived.
pub const FAILURE_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("message is empty")]
    EmptyMessage,

    /// The last turn is not an assistant turn. Indicates a caller bug.
    #[error("no assistant turn is awaiting content")]
    NoPendingAssistant,
}

/// Opaque identifier of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(Uuid);

impl TurnId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One message in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    id: TurnId,
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: TurnId::new(),
            role,
            content,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Ordered list of turns. Turns are only ever appended; the trailing
/// assistant turn is the only one whose content changes.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append the user's message followed by an empty assistant placeholder.
    ///
    /// Returns the id of the placeholder. Blank input adds nothing.
    pub fn append_user_turn(&mut self, text: &str) -> Result<TurnId, TranscriptError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TranscriptError::EmptyMessage);
        }

        self.turns.push(Turn::new(Role::User, text.to_string()));
        let placeholder = Turn::new(Role::Assistant, String::new());
        let id = placeholder.id;
        self.turns.push(placeholder);
        Ok(id)
    }

    /// Append a streamed fragment to the trailing assistant turn.
    pub fn apply_delta(&mut self, delta: &str) -> Result<(), TranscriptError> {
        self.pending_assistant()?.content.push_str(delta);
        Ok(())
    }

    /// Replace the trailing assistant turn's content wholesale.
    pub fn mark_failed(&mut self, message: &str) -> Result<(), TranscriptError> {
        let turn = self.pending_assistant()?;
        turn.content.clear();
        turn.content.push_str(message);
        Ok(())
    }

    /// True while the trailing assistant turn has received nothing yet.
    pub fn awaiting_first_delta(&self) -> bool {
        matches!(
            self.turns.last(),
            Some(turn) if turn.role == Role::Assistant && turn.content.is_empty()
        )
    }

    /// Messages to send to the relay: every turn except an empty trailing
    /// assistant placeholder.
    pub fn request_messages(&self) -> Vec<ChatMessage> {
        let end = if self.awaiting_first_delta() {
            self.turns.len() - 1
        } else {
            self.turns.len()
        };
        self.turns[..end].iter().map(Turn::to_message).collect()
    }

    fn pending_assistant(&mut self) -> Result<&mut Turn, TranscriptError> {
        match self.turns.last_mut() {
            Some(turn) if turn.role == Role::Assistant => Ok(turn),
            _ => Err(TranscriptError::NoPendingAssistant),
        }
    }
}
