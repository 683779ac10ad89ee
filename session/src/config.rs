use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_LOGOUT_PATH: &str = "/auth/logout";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Endpoints and timeouts for a [`crate::SessionClient`].
///
/// ```rust
/// use std::time::Duration;
/// use backoffice_session::SessionConfig;
///
/// let config = SessionConfig::new("https://api.example.com/v1")
///     .unwrap()
///     .with_refresh_path("/session/refresh")
///     .with_refresh_timeout(Some(Duration::from_secs(10)));
/// assert_eq!(
///     config.endpoint("/orders").unwrap().as_str(),
///     "https://api.example.com/v1/orders"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    base_url: Url,
    refresh_path: String,
    login_path: String,
    logout_path: String,
    request_timeout: Duration,
    refresh_timeout: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum SessionConfigError {
    #[error("invalid base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("base URL {0:?} cannot carry endpoint paths")]
    NotABase(String),
}

impl SessionConfig {
    pub fn new(base_url: &str) -> Result<Self, SessionConfigError> {
        let mut url = Url::parse(base_url).map_err(|source| SessionConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        if url.cannot_be_a_base() {
            return Err(SessionConfigError::NotABase(base_url.to_string()));
        }
        // Url::join replaces the last segment unless the base ends in a slash.
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            base_url: url,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            refresh_timeout: None,
        })
    }

    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = path.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Upper bound for one refresh call. `None` waits indefinitely.
    #[must_use]
    pub fn with_refresh_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn logout_path(&self) -> &str {
        &self.logout_path
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub const fn refresh_timeout(&self) -> Option<Duration> {
        self.refresh_timeout
    }

    /// Resolve an API path against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }

    /// Whether `path` addresses the refresh endpoint. Query strings and
    /// leading/trailing slashes are ignored.
    #[must_use]
    pub fn is_refresh_path(&self, path: &str) -> bool {
        normalize_path(path) == normalize_path(&self.refresh_path)
    }
}

fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.trim_matches('/')
}
