use std::sync::{PoisonError, RwLock};

use backoffice_types::{AccessToken, SessionStatus, SessionUser, TokenGrant};
use tokio::sync::watch;

/// In-memory session: the current access token and the signed-in user.
///
/// Owned by the application's composition root and shared by reference
/// (usually `Arc<SessionState>`) with every [`crate::SessionClient`]. Nothing is
/// persisted; a fresh process starts signed out.
#[derive(Debug)]
pub struct SessionState {
    token: RwLock<Option<AccessToken>>,
    user: RwLock<Option<SessionUser>>,
    status: watch::Sender<SessionStatus>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        let (status, _) = watch::channel(SessionStatus::SignedOut);
        Self {
            token: RwLock::new(None),
            user: RwLock::new(None),
            status,
        }
    }

    /// Replace the token. An empty string clears it.
    pub fn set_access_token(&self, token: impl Into<String>) {
        self.replace_token(AccessToken::new(token));
    }

    #[must_use]
    pub fn access_token(&self) -> Option<AccessToken> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<SessionUser> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store a login/refresh result. A grant without a user keeps the
    /// previously known user.
    pub fn store(&self, grant: TokenGrant) {
        if let Some(user) = grant.user {
            *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
        }
        self.replace_token(Some(grant.access_token));
    }

    /// Forget the token and the user.
    pub fn clear(&self) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.replace_token(None);
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Observe sign-in/sign-out transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    fn replace_token(&self, token: Option<AccessToken>) {
        let next = if token.is_some() {
            SessionStatus::SignedIn
        } else {
            SessionStatus::SignedOut
        };
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
        self.status.send_if_modified(|status| {
            if *status == next {
                false
            } else {
                tracing::debug!(?next, "session status changed");
                *status = next;
                true
            }
        });
    }
}
