//! Access gate in front of the chat surface.
//!
//! The gate starts in [`GateState::Loading`] and leaves it exactly once, when
//! [`AccessGate::initialize`] resolves. After that only push notifications
//! from the provider move it between signed-in and signed-out. Login and
//! signup calls never change the state directly; a successful call is
//! followed by a notification.

use std::future::Future;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use super::error::{AuthError, AuthFailure};
use super::provider::{
    AuthProvider, AuthSubscription, Credentials, Member, SignupRequest, SocialProvider,
};

const SOCIAL_FALLBACK_MESSAGE: &str = "Social login failed";
const NOT_READY_MESSAGE: &str = "Authentication is not available.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Loading,
    Unauthenticated,
    Authenticated(Member),
    /// Initialization failed. The gate stays here.
    Unavailable(String),
}

impl GateState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormMode {
    #[default]
    Login,
    Signup,
}

/// What the surface should render.
#[derive(Debug, PartialEq, Eq)]
pub enum GateView<'a> {
    Loading,
    Notice(&'a str),
    CredentialForm {
        mode: FormMode,
        error: Option<&'a str>,
    },
    Chat(&'a Member),
}

/// Values entered on the credential form.
#[derive(Debug, Clone)]
pub struct CredentialForm {
    pub credentials: Credentials,
    pub first_name: String,
    pub last_name: String,
}

pub struct AccessGate<P> {
    provider: Option<P>,
    state: GateState,
    subscription: Option<AuthSubscription>,
    mode: FormMode,
    form_error: Option<String>,
}

impl<P> Default for AccessGate<P> {
    fn default() -> Self {
        Self {
            provider: None,
            state: GateState::Loading,
            subscription: None,
            mode: FormMode::default(),
            form_error: None,
        }
    }
}

impl<P: AuthProvider> AccessGate<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn form_error(&self) -> Option<&str> {
        self.form_error.as_deref()
    }

    pub fn provider(&self) -> Option<&P> {
        self.provider.as_ref()
    }

    /// Bring up the provider and resolve the initial session.
    ///
    /// `connect` receives the public key and builds the provider. A missing
    /// key or a failed connect leaves the gate unavailable. Calling this
    /// again after the first resolution does nothing.
    pub async fn initialize<F, Fut>(&mut self, public_key: Option<&str>, connect: F)
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<P, AuthError>>,
    {
        if self.state != GateState::Loading {
            warn!("access gate already initialized");
            return;
        }

        info!("initializing auth provider");
        let public_key = match public_key.map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => key.to_string(),
            None => {
                self.fail(AuthError::MissingPublicKey);
                return;
            }
        };

        let provider = match connect(public_key).await {
            Ok(provider) => provider,
            Err(err) => {
                self.fail(err);
                return;
            }
        };

        let member = match provider.current_member().await {
            Ok(member) => member,
            Err(err) => {
                error!("failed to load current member: {}", err);
                None
            }
        };

        match &member {
            Some(member) => info!("found existing session for {}", member.email),
            None => info!("no existing session"),
        }

        self.subscription = Some(provider.subscribe());
        self.provider = Some(provider);
        self.state = session_state(member);
    }

    fn fail(&mut self, err: AuthError) {
        error!("auth initialization failed: {}", err);
        self.state = GateState::Unavailable(err.to_string());
    }

    /// Apply one push notification.
    ///
    /// Ignored until the gate has resolved, and forever once it is
    /// unavailable.
    pub fn apply_change(&mut self, member: Option<Member>) {
        match self.state {
            GateState::Loading | GateState::Unavailable(_) => {
                debug!("ignoring auth change before the gate is ready");
            }
            GateState::Unauthenticated | GateState::Authenticated(_) => {
                info!(
                    "auth state changed: {}",
                    if member.is_some() { "logged in" } else { "logged out" }
                );
                if member.is_some() {
                    self.form_error = None;
                }
                self.state = session_state(member);
            }
        }
    }

    /// Wait for the next push notification and apply it.
    ///
    /// Returns `None` once the feed is closed or was never opened.
    pub async fn next_change(&mut self) -> Option<&GateState> {
        let member = self.subscription.as_mut()?.next().await?;
        self.apply_change(member);
        Some(&self.state)
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), AuthFailure> {
        self.form_error = None;
        let result = match &self.provider {
            Some(provider) => provider.login(credentials).await.map(drop),
            None => Err(not_ready()),
        };
        self.record(result, |failure| failure.user_message().to_string())
    }

    pub async fn signup(&mut self, request: &SignupRequest) -> Result<(), AuthFailure> {
        self.form_error = None;
        let result = match &self.provider {
            Some(provider) => provider.signup(request).await.map(drop),
            None => Err(not_ready()),
        };
        self.record(result, |failure| failure.user_message().to_string())
    }

    /// Submit the credential form in the current mode.
    pub async fn submit_form(&mut self, form: &CredentialForm) -> Result<(), AuthFailure> {
        match self.mode {
            FormMode::Login => self.login(&form.credentials).await,
            FormMode::Signup => {
                let request = SignupRequest {
                    credentials: form.credentials.clone(),
                    first_name: non_blank(&form.first_name),
                    last_name: non_blank(&form.last_name),
                };
                self.signup(&request).await
            }
        }
    }

    /// Social login in the current mode.
    pub async fn social_login(&mut self, social: SocialProvider) -> Result<(), AuthFailure> {
        self.form_error = None;
        info!("starting {} authentication", social);
        let result = match (&self.provider, self.mode) {
            (Some(provider), FormMode::Login) => provider.login_with_provider(social).await,
            (Some(provider), FormMode::Signup) => provider.signup_with_provider(social).await,
            (None, _) => Err(not_ready()),
        };
        self.record(result, |failure| match failure {
            AuthFailure::Other(message) if !message.trim().is_empty() => message.clone(),
            AuthFailure::Other(_) => SOCIAL_FALLBACK_MESSAGE.to_string(),
            other => other.user_message().to_string(),
        })
    }

    /// Log out. Failures are logged; the state follows the notification.
    pub async fn logout(&mut self) {
        let Some(provider) = &self.provider else {
            return;
        };
        match provider.logout().await {
            Ok(()) => info!("logout successful"),
            Err(err) => error!("logout failed: {}", err),
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            FormMode::Login => FormMode::Signup,
            FormMode::Signup => FormMode::Login,
        };
        self.form_error = None;
    }

    pub fn view(&self) -> GateView<'_> {
        match &self.state {
            GateState::Loading => GateView::Loading,
            GateState::Unavailable(reason) => GateView::Notice(reason.as_str()),
            GateState::Unauthenticated => GateView::CredentialForm {
                mode: self.mode,
                error: self.form_error.as_deref(),
            },
            GateState::Authenticated(member) => GateView::Chat(member),
        }
    }

    fn record(
        &mut self,
        result: Result<(), AuthFailure>,
        message: impl FnOnce(&AuthFailure) -> String,
    ) -> Result<(), AuthFailure> {
        if let Err(failure) = &result {
            warn!("authentication failed: {}", failure);
            self.form_error = Some(message(failure));
        }
        result
    }
}

fn session_state(member: Option<Member>) -> GateState {
    match member {
        Some(member) => GateState::Authenticated(member),
        None => GateState::Unauthenticated,
    }
}

fn not_ready() -> AuthFailure {
    AuthFailure::Other(NOT_READY_MESSAGE.to_string())
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
