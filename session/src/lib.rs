//! Authenticated API access for the backoffice dashboard.
//!
//! # Architecture
//!
//! - [`SessionState`] - the in-memory access token and user, owned by the
//!   composition root and shared by reference
//! - [`SessionClient`] - attaches the token to outgoing requests and runs the
//!   401 → refresh → replay protocol
//! - [`RefreshStrategy`] - how a new token is obtained; defaults to
//!   [`HttpRefreshStrategy`] (credentialed `POST` to the refresh endpoint)
//!
//! ```text
//! send(request) ──401──> gate.join()
//!                         ├─ Leader: strategy.refresh() ─> store token ─> settle(queue, FIFO)
//!                         └─ Waiter: await leader outcome
//!               <─ replay once with new bearer (second 401 is final)
//! ```
//!
//! # Error Handling
//!
//! Every failure reaches the caller as a [`SessionError`]. A failed refresh
//! clears the session and surfaces as [`SessionError::AuthExpired`] for the
//! request that triggered it and for every request queued behind it.

mod client;
mod config;
mod error;
mod gate;
mod request;
mod state;
mod strategy;

pub use backoffice_types;
pub use client::SessionClient;
pub use config::{
    DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH, DEFAULT_REFRESH_PATH, SessionConfig,
    SessionConfigError,
};
pub use error::{RefreshError, SessionError};
pub use request::ApiRequest;
pub use state::SessionState;
pub use strategy::{FnStrategy, HttpRefreshStrategy, RefreshFut, RefreshStrategy, strategy_fn};

use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 10;

// Note: reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 32;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

fn base_client_builder(config: &SessionConfig) -> reqwest::ClientBuilder {
    use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(config.request_timeout())
        .redirect(reqwest::redirect::Policy::none())
        // The refresh token lives in an http-only cookie.
        .cookie_store(true)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
}

/// Build the HTTP client shared by API calls and the default refresh strategy.
pub fn http_client(config: &SessionConfig) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder(config).build()
}

pub(crate) async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
