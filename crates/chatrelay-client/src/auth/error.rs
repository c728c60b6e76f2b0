//! Authentication error types.

use thiserror::Error;

const FALLBACK_MESSAGE: &str = "An error occurred. Please try again.";

/// A login, signup or logout attempt the provider refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email not verified")]
    EmailNotVerified,

    #[error("member not found")]
    MemberNotFound,

    #[error("email already exists")]
    EmailAlreadyExists,

    #[error("weak password")]
    WeakPassword,

    #[error("invalid email")]
    InvalidEmail,

    #[error("too many requests")]
    TooManyRequests,

    /// Any other provider error, with its raw message.
    #[error("auth provider error: {0}")]
    Other(String),
}

impl AuthFailure {
    /// Map a provider error code. Unknown codes keep the provider's message.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        match code {
            "invalid_credentials" => Self::InvalidCredentials,
            "email_not_verified" => Self::EmailNotVerified,
            "member_not_found" => Self::MemberNotFound,
            "email_already_exists" => Self::EmailAlreadyExists,
            "weak_password" => Self::WeakPassword,
            "invalid_email" => Self::InvalidEmail,
            "too_many_requests" => Self::TooManyRequests,
            _ => Self::Other(message.into()),
        }
    }

    /// Text shown on the credential form.
    pub fn user_message(&self) -> &str {
        match self {
            Self::InvalidCredentials => "Invalid email or password. Please try again.",
            Self::EmailNotVerified => "Please verify your email before logging in.",
            Self::MemberNotFound => "No account found with this email. Please sign up first.",
            Self::EmailAlreadyExists => {
                "An account with this email already exists. Please try logging in."
            }
            Self::WeakPassword => "Password is too weak. Please choose a stronger password.",
            Self::InvalidEmail => "Please enter a valid email address.",
            Self::TooManyRequests => "Too many attempts. Please try again later.",
            Self::Other(message) if message.trim().is_empty() => FALLBACK_MESSAGE,
            Self::Other(message) => message.as_str(),
        }
    }
}

/// The gate could not be brought up at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("auth provider public key not found")]
    MissingPublicKey,

    #[error("failed to initialize auth provider: {0}")]
    Initialization(String),
}
