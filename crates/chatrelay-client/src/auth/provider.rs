//! The narrow interface the gate needs from an authentication provider.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::error::AuthFailure;

/// A signed-in member as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Member {
    /// Full name, when both parts are known.
    pub fn display_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                Some(format!("{first} {last}"))
            }
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub credentials: Credentials,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialProvider {
    Google,
    Github,
}

impl SocialProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }
}

impl fmt::Display for SocialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Push feed of auth changes: `Some(member)` on sign-in, `None` on sign-out.
///
/// Dropping the handle unsubscribes from the provider.
pub struct AuthSubscription {
    changes: UnboundedReceiverStream<Option<Member>>,
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl AuthSubscription {
    pub fn new(
        changes: mpsc::UnboundedReceiver<Option<Member>>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            changes: UnboundedReceiverStream::new(changes),
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Stream for AuthSubscription {
    type Item = Option<Member>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.changes.poll_next_unpin(cx)
    }
}

impl fmt::Debug for AuthSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSubscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Authentication provider operations used by the gate.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The member of the current session, if any.
    async fn current_member(&self) -> Result<Option<Member>, AuthFailure>;

    async fn login(&self, credentials: &Credentials) -> Result<Member, AuthFailure>;

    async fn signup(&self, request: &SignupRequest) -> Result<Member, AuthFailure>;

    /// Start a social login. Unknown accounts are signed up.
    async fn login_with_provider(&self, provider: SocialProvider) -> Result<(), AuthFailure>;

    /// Start a social signup. Existing accounts are logged in.
    async fn signup_with_provider(&self, provider: SocialProvider) -> Result<(), AuthFailure>;

    async fn logout(&self) -> Result<(), AuthFailure>;

    fn subscribe(&self) -> AuthSubscription;
}
