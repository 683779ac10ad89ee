use std::sync::{Arc, PoisonError, RwLock};

use backoffice_types::{AccessToken, Credentials, SessionUser, TokenGrant};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::gate::{self, RefreshGate, Ticket};
use crate::strategy::{HttpRefreshStrategy, RefreshStrategy, TokenResponse};
use crate::{
    ApiRequest, RefreshError, SessionConfig, SessionError, http_client, read_capped_error_body,
};

/// HTTP client that attaches the session's bearer token and recovers from
/// expired tokens.
///
/// # Refresh protocol
///
/// - Every request carries `Authorization: Bearer <token>` when a token is stored.
/// - A 401 on a request that is not itself the refresh call and has not been
///   replayed yet triggers a refresh. Only one refresh runs at a time; other
///   requests that hit 401 meanwhile wait for its outcome.
/// - On success the new token is stored and each waiting request is replayed
///   once with it. A second 401 is final.
/// - On failure the session is cleared and every waiting request fails with
///   [`SessionError::AuthExpired`].
///
/// There is no backoff and no retry beyond the single replay.
pub struct SessionClient {
    http: reqwest::Client,
    config: SessionConfig,
    session: Arc<crate::SessionState>,
    default_strategy: Arc<dyn RefreshStrategy>,
    strategy: RwLock<Arc<dyn RefreshStrategy>>,
    gate: RefreshGate,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("base_url", &self.config.base_url().as_str())
            .field("refreshing", &self.gate.is_refreshing())
            .finish_non_exhaustive()
    }
}

impl SessionClient {
    pub fn new(
        config: SessionConfig,
        session: Arc<crate::SessionState>,
    ) -> Result<Self, SessionError> {
        let http = http_client(&config)?;
        let refresh_url =
            config
                .endpoint(config.refresh_path())
                .map_err(|source| SessionError::InvalidEndpoint {
                    path: config.refresh_path().to_string(),
                    source,
                })?;
        let default_strategy: Arc<dyn RefreshStrategy> =
            Arc::new(HttpRefreshStrategy::new(http.clone(), refresh_url));

        Ok(Self {
            http,
            config,
            session,
            strategy: RwLock::new(Arc::clone(&default_strategy)),
            default_strategy,
            gate: RefreshGate::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &Arc<crate::SessionState> {
        &self.session
    }

    pub fn set_access_token(&self, token: impl Into<String>) {
        self.session.set_access_token(token);
    }

    #[must_use]
    pub fn access_token(&self) -> Option<AccessToken> {
        self.session.access_token()
    }

    /// Replace how new tokens are obtained. Takes effect for the next refresh.
    pub fn set_refresh_strategy(&self, strategy: impl RefreshStrategy + 'static) {
        *self.strategy.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(strategy);
    }

    /// Go back to the credentialed `POST` against the refresh endpoint.
    pub fn reset_refresh_strategy(&self) {
        *self.strategy.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::clone(&self.default_strategy);
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.gate.is_refreshing()
    }

    /// Number of requests waiting on the in-flight refresh.
    #[must_use]
    pub fn queued_waiters(&self) -> usize {
        self.gate.queued()
    }

    /// Send a request, refreshing the token and replaying once on 401.
    ///
    /// Returns the response only for 2xx statuses.
    pub async fn send(&self, request: ApiRequest) -> Result<Response, SessionError> {
        let attached = self.session.access_token();
        let response = self.dispatch(&request, attached.as_ref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED
            || request.is_retried()
            || self.config.is_refresh_path(request.path())
        {
            return finish(response).await;
        }

        let token = match self.session.access_token() {
            // Someone else refreshed while this request was in flight.
            Some(current) if attached.as_ref() != Some(&current) => {
                tracing::debug!(path = request.path(), "Replaying with already refreshed token");
                current
            }
            _ => self
                .refresh_token()
                .await
                .map_err(SessionError::AuthExpired)?,
        };

        let replay = request.into_retry();
        let response = self.dispatch(&replay, Some(&token)).await?;
        finish(response).await
    }

    /// [`Self::send`] followed by JSON decoding of the body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, SessionError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    /// Exchange credentials for a token and user profile.
    pub async fn login(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<SessionUser>, SessionError> {
        let request = ApiRequest::post(self.config.login_path()).json(credentials)?;
        let response = finish(self.dispatch(&request, None).await?).await?;
        let body: TokenResponse = response.json().await?;
        let grant = body.into_grant().ok_or(SessionError::MissingToken)?;
        let user = grant.user.clone();
        self.session.store(grant);
        tracing::info!("Signed in");
        Ok(user)
    }

    /// Tell the server to drop the refresh cookie, then forget the session.
    ///
    /// The local session is cleared even when the server call fails.
    pub async fn logout(&self) {
        let request = ApiRequest::post(self.config.logout_path());
        let token = self.session.access_token();
        match self.dispatch(&request, token.as_ref()).await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(status = %response.status(), "Logout endpoint rejected the request");
            }
            Err(e) => tracing::warn!(%e, "Logout request failed"),
            Ok(_) => {}
        }
        self.session.clear();
        tracing::info!("Signed out");
    }

    /// Try to recover a session from the refresh cookie at startup.
    ///
    /// Returns `true` when a token was obtained.
    pub async fn restore(&self) -> bool {
        match self.refresh_token().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(%e, "No session to restore");
                false
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&AccessToken>,
    ) -> Result<Response, SessionError> {
        let url = self
            .config
            .endpoint(request.path())
            .map_err(|source| SessionError::InvalidEndpoint {
                path: request.path().to_string(),
                source,
            })?;
        let response = request.build(&self.http, url, token).send().await?;
        tracing::debug!(
            method = %request.method(),
            path = request.path(),
            status = %response.status(),
            retried = request.is_retried(),
            "Request completed"
        );
        Ok(response)
    }

    async fn refresh_token(&self) -> Result<AccessToken, RefreshError> {
        let lease = match self.gate.join() {
            Ticket::Leader(lease) => lease,
            Ticket::Waiter { ticket, rx } => {
                tracing::debug!(ticket, "Waiting for in-flight token refresh");
                return gate::wait(rx).await;
            }
        };

        tracing::debug!("Refreshing access token");
        let strategy = Arc::clone(&*self.strategy.read().unwrap_or_else(PoisonError::into_inner));
        let outcome = match self.run_strategy(strategy.as_ref()).await {
            Ok(grant) => {
                let token = grant.access_token.clone();
                self.session.store(grant);
                Ok(token)
            }
            Err(e) => {
                tracing::warn!(%e, "Token refresh failed; clearing session");
                self.session.clear();
                Err(e)
            }
        };

        let resolved = lease.settle(&outcome);
        tracing::debug!(
            waiters = resolved.len(),
            ok = outcome.is_ok(),
            "Token refresh settled"
        );
        outcome
    }

    async fn run_strategy(
        &self,
        strategy: &dyn RefreshStrategy,
    ) -> Result<TokenGrant, RefreshError> {
        match self.config.refresh_timeout() {
            Some(limit) => tokio::time::timeout(limit, strategy.refresh())
                .await
                .unwrap_or(Err(RefreshError::TimedOut(limit))),
            None => strategy.refresh().await,
        }
    }
}

async fn finish(response: Response) -> Result<Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = read_capped_error_body(response).await;
    Err(SessionError::RequestFailed { status, body })
}
