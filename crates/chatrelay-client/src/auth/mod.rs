//! Access gate for the chat surface.
//!
//! The provider itself is external. The gate talks to it through the narrow
//! [`AuthProvider`] trait and tracks the signed-in member.

mod error;
mod gate;
mod provider;

pub use error::{AuthError, AuthFailure};
pub use gate::{AccessGate, CredentialForm, FormMode, GateState, GateView};
pub use provider::{
    AuthProvider, AuthSubscription, Credentials, Member, SignupRequest, SocialProvider,
};
