use std::future::Future;
use std::pin::Pin;

use backoffice_types::{AccessToken, SessionUser, TokenGrant};
use serde::Deserialize;
use url::Url;

use crate::RefreshError;

/// Refresh future type alias.
pub type RefreshFut<'a> =
    Pin<Box<dyn Future<Output = Result<TokenGrant, RefreshError>> + Send + 'a>>;

/// Produces a new access token when the current one is rejected.
///
/// The client guarantees at most one `refresh` call is in flight at a time.
pub trait RefreshStrategy: Send + Sync {
    fn refresh(&self) -> RefreshFut<'_>;
}

/// Default strategy: credentialed `POST` with an empty body to the refresh
/// endpoint. The refresh cookie travels in the shared client's cookie store.
#[derive(Debug, Clone)]
pub struct HttpRefreshStrategy {
    http: reqwest::Client,
    url: Url,
}

impl HttpRefreshStrategy {
    #[must_use]
    pub fn new(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl RefreshStrategy for HttpRefreshStrategy {
    fn refresh(&self) -> RefreshFut<'_> {
        Box::pin(async move {
            let response = self.http.post(self.url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(RefreshError::Status { status });
            }
            let body: TokenResponse = response
                .json()
                .await
                .map_err(|e| RefreshError::Decode(e.to_string()))?;
            body.into_grant().ok_or(RefreshError::MissingToken)
        })
    }
}

/// Adapts an async closure into a [`RefreshStrategy`].
///
/// ```rust
/// use backoffice_session::{RefreshError, strategy_fn};
/// use backoffice_types::AccessToken;
///
/// let strategy = strategy_fn(|| async {
///     AccessToken::new("from-keychain").ok_or(RefreshError::MissingToken)
/// });
/// # let _ = strategy;
/// ```
pub fn strategy_fn<F, Fut, T>(f: F) -> FnStrategy<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, RefreshError>> + Send + 'static,
    T: Into<TokenGrant>,
{
    FnStrategy(f)
}

#[derive(Debug, Clone)]
pub struct FnStrategy<F>(F);

impl<F, Fut, T> RefreshStrategy for FnStrategy<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, RefreshError>> + Send + 'static,
    T: Into<TokenGrant>,
{
    fn refresh(&self) -> RefreshFut<'_> {
        let fut = (self.0)();
        Box::pin(async move { fut.await.map(Into::into) })
    }
}

/// Body shared by the login and refresh endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    access_token: Option<String>,
    user: Option<SessionUser>,
}

impl TokenResponse {
    pub(crate) fn into_grant(self) -> Option<TokenGrant> {
        let access_token = AccessToken::new(self.access_token?)?;
        let mut grant = TokenGrant::new(access_token);
        grant.user = self.user;
        Some(grant)
    }
}
