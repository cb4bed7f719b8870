//! Client configuration handling.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use wecred_core::{AppCredentials, Secret};

pub const DEFAULT_BASE_API_URL: &str = "https://api.weixin.qq.com";
pub const DEFAULT_ACCESS_TOKEN_URL: &str = "https://api.weixin.qq.com/cgi-bin/token";
pub const DEFAULT_COMPONENT_TOKEN_URL: &str =
    "https://api.weixin.qq.com/cgi-bin/component/api_component_token";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const CONFIG_FILE_NAME: &str = "wecred.toml";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL that relative request paths are resolved against.
    pub base_api_url: String,

    /// Endpoint for the `client_credential` grant.
    pub access_token_url: String,

    /// Endpoint for third-party platform token exchange.
    pub component_token_url: String,

    /// Budget for one call, including a renewal and its retry.
    pub request_timeout_secs: u64,

    /// Query parameter carrying the access token.
    pub credential_param: String,

    pub app: AppConfig,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_api_url: DEFAULT_BASE_API_URL.to_string(),
            access_token_url: DEFAULT_ACCESS_TOKEN_URL.to_string(),
            component_token_url: DEFAULT_COMPONENT_TOKEN_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_param: "access_token".to_string(),
            app: AppConfig::default(),
            config_path: PathBuf::new(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// The `[app]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_id: String,
    pub app_secret: Secret,
}

impl AppConfig {
    pub fn credentials(&self) -> AppCredentials {
        AppCredentials::new(self.app_id.as_str(), self.app_secret.expose())
    }
}

/// Default config file location, `<config dir>/wecred.toml`.
pub fn default_config_path() -> PathBuf {
    ProjectDirs::from("com", "raibid-labs", "wecred")
        .map(|d| d.config_dir().join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Load configuration from the default location or use defaults.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from(default_config_path())
}

/// Load configuration from `path`; a missing file yields defaults.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();

    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        debug!("No config at {:?}, using defaults", path);
        ClientConfig::default()
    };

    config.config_path = path.to_path_buf();
    Ok(config)
}
