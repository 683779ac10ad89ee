//! Core domain types for the backoffice dashboard.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application: the session client
//! stores [`AccessToken`]s, the editor applies [`FormatCommand`]s.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod format;
pub use format::{
    ALIGNMENT_CLASSES, Alignment, FormatCommand, HeadingLevel, InvalidHeadingLevel, ListKind,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Credentials
// ============================================================================

/// A bearer access token.
///
/// Tokens only exist in memory. An empty (or whitespace-only) string is not a
/// token: [`AccessToken::new`] returns `None` for it, which lets callers treat
/// `""` as "signed out".
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

// Manual Debug impl to prevent leaking tokens in logs.
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken(<redacted>)")
    }
}

/// Email/password pair posted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Session
// ============================================================================

/// The `user` object the auth endpoints return next to a token.
///
/// The dashboard treats it as an opaque profile; only a few well-known fields
/// get accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionUser(Value);

impl SessionUser {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.field("email").and_then(Value::as_str)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Result of a successful login or refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: AccessToken,
    pub user: Option<SessionUser>,
}

impl TokenGrant {
    #[must_use]
    pub fn new(access_token: AccessToken) -> Self {
        Self {
            access_token,
            user: None,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: SessionUser) -> Self {
        self.user = Some(user);
        self
    }
}

impl From<AccessToken> for TokenGrant {
    fn from(access_token: AccessToken) -> Self {
        Self::new(access_token)
    }
}

/// Whether the session currently holds a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    SignedOut,
    SignedIn,
}

impl SessionStatus {
    #[must_use]
    pub const fn is_signed_in(self) -> bool {
        matches!(self, Self::SignedIn)
    }
}
