//! `~/.backoffice/config.toml` loading.
//!
//! ```toml
//! [api]
//! base_url = "https://api.example.com/"
//! refresh_path = "/auth/refresh"
//! request_timeout_secs = 30
//! refresh_timeout_secs = 10
//!
//! [editor]
//! history_limit = 200
//! ```
//!
//! String values may reference environment variables as `${NAME}`. The
//! `BACKOFFICE_*` variables listed on [`BackofficeConfig::session_config`]
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use backoffice_editor::EditorSettings;
use backoffice_session::{SessionConfig, SessionConfigError};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_API_URL: &str = "BACKOFFICE_API_URL";
pub const ENV_REFRESH_PATH: &str = "BACKOFFICE_REFRESH_PATH";
pub const ENV_LOGIN_PATH: &str = "BACKOFFICE_LOGIN_PATH";
pub const ENV_LOGOUT_PATH: &str = "BACKOFFICE_LOGOUT_PATH";

#[derive(Debug, Default, Deserialize)]
pub struct BackofficeConfig {
    pub api: Option<ApiConfig>,
    pub editor: Option<EditorConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub refresh_path: Option<String>,
    pub login_path: Option<String>,
    pub logout_path: Option<String>,
    pub request_timeout_secs: Option<u64>,
    /// Upper bound on a single refresh attempt. Unset waits indefinitely.
    pub refresh_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditorConfig {
    /// Snapshots kept for undo. `0` keeps everything.
    pub history_limit: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("no API base URL configured (set [api].base_url or BACKOFFICE_API_URL)")]
    MissingBaseUrl,
    #[error(transparent)]
    Session(#[from] SessionConfigError),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => Some(path),
            Self::MissingBaseUrl | Self::Session(_) => None,
        }
    }
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find("${") {
        let after = &rest[open + 2..];
        let Some(close) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        let var = &after[..close];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

impl BackofficeConfig {
    /// Load the user config. `Ok(None)` when there is no config file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    /// `Ok(None)` when nothing exists at `path`.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        let content = match fs::read_to_string(path) {
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
            read => read.map_err(|source| {
                tracing::warn!(path = %path.display(), %source, "Config file unreadable");
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            })?,
        };
        let config = toml::from_str(&content).map_err(|source| {
            tracing::warn!(path = %path.display(), %source, "Config file is not valid TOML");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(Some(config))
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Session settings from the file and the process environment.
    ///
    /// `BACKOFFICE_API_URL`, `BACKOFFICE_REFRESH_PATH`,
    /// `BACKOFFICE_LOGIN_PATH` and `BACKOFFICE_LOGOUT_PATH` take precedence
    /// over the corresponding `[api]` keys.
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        self.session_config_with(|name| env::var(name).ok())
    }

    /// [`Self::session_config`] with an explicit environment lookup.
    pub fn session_config_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<SessionConfig, ConfigError> {
        let api = self.api.as_ref();
        let setting = |var: &str, key: Option<&String>| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| key.map(|v| expand_env_vars(v)))
                .filter(|v| !v.trim().is_empty())
        };

        let base_url = setting(ENV_API_URL, api.and_then(|a| a.base_url.as_ref()))
            .ok_or(ConfigError::MissingBaseUrl)?;
        let mut config = SessionConfig::new(base_url.trim())?;

        if let Some(path) = setting(ENV_REFRESH_PATH, api.and_then(|a| a.refresh_path.as_ref())) {
            config = config.with_refresh_path(path);
        }
        if let Some(path) = setting(ENV_LOGIN_PATH, api.and_then(|a| a.login_path.as_ref())) {
            config = config.with_login_path(path);
        }
        if let Some(path) = setting(ENV_LOGOUT_PATH, api.and_then(|a| a.logout_path.as_ref())) {
            config = config.with_logout_path(path);
        }
        if let Some(secs) = api.and_then(|a| a.request_timeout_secs) {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        let refresh_timeout = api
            .and_then(|a| a.refresh_timeout_secs)
            .map(Duration::from_secs);
        Ok(config.with_refresh_timeout(refresh_timeout))
    }

    #[must_use]
    pub fn editor_settings(&self) -> EditorSettings {
        let mut settings = EditorSettings::default();
        if let Some(limit) = self.editor.as_ref().and_then(|e| e.history_limit) {
            settings.history_limit = (limit > 0).then_some(limit);
        }
        settings
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".backoffice").join("config.toml"))
}
