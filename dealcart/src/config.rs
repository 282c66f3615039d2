//! Client configuration.
//!
//! Loaded from `~/.dealcart/config.json` when present. Every field has a
//! default, so a missing or partial file is fine. A few environment
//! variables override the file (see [`ClientConfig::apply_env`]).

use crate::error::{ConfigError, ConfigResult};
use crate::util::app_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default base URL of the shopping service.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/";

/// Default storage key holding the anonymous session id.
pub const DEFAULT_SESSION_KEY: &str = "dealSessionId";

/// Environment variable overriding [`ApiConfig::base_url`].
pub const ENV_BASE_URL: &str = "DEALCART_BASE_URL";

/// Environment variable carrying the bearer credential for queries.
pub const ENV_TOKEN: &str = "DEALCART_TOKEN";

/// Environment variable overriding [`StorageConfig::dir`].
pub const ENV_STATE_DIR: &str = "DEALCART_STATE_DIR";

/// Top-level client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote service settings.
    pub api: ApiConfig,
    /// Durable local storage settings.
    pub storage: StorageConfig,
    /// Transient feedback settings.
    pub feedback: FeedbackConfig,
    /// How assistant replies are ordered in the conversation.
    pub ordering: ResponseOrdering,
}

/// Remote service settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL; endpoint paths are joined onto it.
    pub base_url: String,
    /// Request timeout in seconds, `0` disables it.
    pub timeout_secs: u64,
    /// Bearer credential for `user-query`. Usually supplied by env.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            token: None,
        }
    }
}

impl ApiConfig {
    /// Request timeout, if enabled.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}

/// Durable local storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the key/value entries.
    pub dir: PathBuf,
    /// Key under which the session id is persisted.
    pub session_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: app_dir().join("state"),
            session_key: DEFAULT_SESSION_KEY.to_string(),
        }
    }
}

/// Transient feedback settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// How long success/error notices stay visible, in milliseconds.
    pub notice_window_ms: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            notice_window_ms: 2000,
        }
    }
}

impl FeedbackConfig {
    /// Notice window as a duration.
    #[must_use]
    pub const fn notice_window(&self) -> Duration {
        Duration::from_millis(self.notice_window_ms)
    }
}

/// Policy for appending replies that resolve out of order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrdering {
    /// Replies are appended in the order they resolve.
    #[default]
    LastResolved,
    /// Replies older than the latest appended one are dropped.
    DiscardStale,
}

impl ClientConfig {
    /// Apply environment overrides on top of the loaded values.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_BASE_URL)
            && !url.trim().is_empty()
        {
            self.api.base_url = url;
        }
        if let Ok(token) = std::env::var(ENV_TOKEN)
            && !token.trim().is_empty()
        {
            self.api.token = Some(token);
        }
        if let Ok(dir) = std::env::var(ENV_STATE_DIR)
            && !dir.trim().is_empty()
        {
            self.storage.dir = PathBuf::from(dir);
        }
    }

    /// Check the configuration for values the client cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        let url = reqwest::Url::parse(&self.api.base_url)
            .map_err(|e| ConfigError::invalid(format!("api.base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(format!(
                "api.base_url: unsupported scheme '{}'",
                url.scheme()
            )));
        }
        if self.feedback.notice_window_ms == 0 {
            return Err(ConfigError::invalid("feedback.notice_window_ms must be > 0"));
        }
        if self.storage.session_key.trim().is_empty() {
            return Err(ConfigError::invalid("storage.session_key is empty"));
        }
        Ok(())
    }
}

/// Default configuration file path (`~/.dealcart/config.json`).
#[must_use]
pub fn config_path() -> PathBuf {
    app_dir().join("config.json")
}

/// Load configuration from `path`, falling back to defaults if it is missing.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load_config(path: &Path) -> ConfigResult<ClientConfig> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let config = serde_json::from_str(&content)?;
            debug!(path = %path.display(), "loaded config");
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(ClientConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Write configuration as pretty JSON, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn save_config(path: &Path, config: &ClientConfig) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}
