//! Authentication against the hosted identity provider.
//!
//! The provider issues access/refresh token pairs; this server keeps them in
//! a sealed cookie and asks the provider (or its JWKS) whether they are still
//! good on each request.

pub mod cookies;
pub mod jwks;
pub mod seal;
pub mod session;
pub mod workos;

pub use jwks::{AccessClaims, JwksClient, JwtError};
pub use seal::{SealError, SessionSealer};
pub use session::{current_user, require_session, GuardState};
pub use workos::HostedIdentity;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::User;

/// User object as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
}

/// Everything that goes inside the sealed session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: String,
    pub user: ProviderUser,
}

/// The caller behind a verified session, available to handlers as an
/// `Extension`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture_url: Option<String>,
    /// Provider-side session id, when the access token carries one.
    pub session_id: Option<String>,
}

impl SessionUser {
    pub fn from_provider(user: ProviderUser, session_id: Option<String>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            profile_picture_url: user.profile_picture_url,
            session_id,
        }
    }

    /// The row to upsert on the user's first authenticated write.
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            profile_picture_url: self.profile_picture_url.clone(),
            bio: None,
        }
    }
}

/// A freshly sealed session together with the user it belongs to.
#[derive(Debug, Clone)]
pub struct SealedSession {
    pub sealed: String,
    pub user: SessionUser,
}

/// Outcome of checking a session cookie against the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    Authenticated(SessionUser),
    /// The session exists but its access token is no longer accepted.
    NeedsRefresh(String),
    Failed(SessionFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    NoSessionCookie,
    InvalidSession(String),
}

impl std::fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionFailure::NoSessionCookie => write!(f, "no session cookie"),
            SessionFailure::InvalidSession(reason) => write!(f, "invalid session: {}", reason),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Identity provider request failed: {0}")]
    Http(String),
    #[error("Identity provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Identity provider returned no usable session")]
    NoSession,
    #[error("Invalid session: {0}")]
    InvalidSession(String),
    #[error("Invalid identity configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Seal(#[from] SealError),
}

/// Operations the server needs from the hosted identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL of the provider's hosted login page.
    fn authorization_url(&self) -> Result<String, IdentityError>;

    /// Exchange the code from the login callback for a sealed session.
    async fn authenticate_with_code(&self, code: &str) -> Result<SealedSession, IdentityError>;

    /// Check a sealed session; `None` means the cookie was absent.
    async fn authenticate(&self, sealed: Option<&str>) -> SessionCheck;

    /// Trade the refresh token inside a sealed session for a new session.
    async fn refresh(&self, sealed: &str) -> Result<SealedSession, IdentityError>;

    /// Where to send the browser to end the provider-side session.
    fn logout_url(&self, sealed: Option<&str>) -> String;
}
