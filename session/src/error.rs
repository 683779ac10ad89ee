use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Why a token refresh did not produce a new token.
///
/// Cloneable so a single failure can be handed to every queued request.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("refresh request failed: {0}")]
    Transport(Arc<reqwest::Error>),
    #[error("refresh endpoint returned HTTP {status}")]
    Status { status: StatusCode },
    #[error("invalid refresh response: {0}")]
    Decode(String),
    #[error("refresh response did not include an access token")]
    MissingToken,
    #[error("refresh did not complete within {0:?}")]
    TimedOut(Duration),
    #[error("refresh was abandoned before it completed")]
    Abandoned,
    #[error("refresh rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for RefreshError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(Arc::new(error))
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The refresh call failed. The stored token has been cleared.
    #[error("session expired: {0}")]
    AuthExpired(#[source] RefreshError),
    /// Any non-2xx response that is not a retryable 401, including the second
    /// 401 of a replayed request.
    #[error("request failed with HTTP {status}")]
    RequestFailed { status: StatusCode, body: String },
    #[error("auth endpoint response did not include an access token")]
    MissingToken,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid endpoint {path:?}: {source}")]
    InvalidEndpoint {
        path: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SessionError {
    /// HTTP status of the failed response, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired(_))
    }
}
