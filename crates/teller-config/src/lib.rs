//! Configuration for the teller wallet agent.
//!
//! Settings load from the user config file and can be overridden by
//! environment variables:
//!
//! - `TELLER_CONFIG_DIR` - directory holding `config.toml`, credentials, and logs
//! - `TELLER_DISCOVERY_URL` - OIDC discovery document URL
//! - `TELLER_CLIENT_ID` / `TELLER_CLIENT_SECRET` - client registration
//! - `TELLER_API_URL` - wallet backend base URL
//! - `TELLER_BIND_ADDRESS` - hosted-mode bind address
//! - `TELLER_CALLBACK_PORT` - loopback port for the login redirect

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Application name for platform config directory resolution.
const APP_NAME: &str = "teller";

/// Config filename within the teller config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The teller config directory.
///
/// Resolution order: `TELLER_CONFIG_DIR` env var, then the platform
/// config directory (`~/.config/teller` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("TELLER_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Path of the user config file, if a config directory can be resolved.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Settings for both deployment modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// OIDC discovery document URL.
    pub discovery_url: String,

    /// OAuth client identifier registered with the provider.
    pub client_id: String,

    /// Optional confidential-client secret.
    pub client_secret: Option<String>,

    /// Scopes requested at login.
    pub scopes: Vec<String>,

    /// Loopback port the registered redirect URI points at.
    pub callback_port: u16,

    /// Wallet backend base URL.
    pub api_base_url: String,

    /// Hosted-mode bind address.
    pub bind_address: String,

    /// Resource identifier advertised in protected-resource metadata
    /// (the hosted server's own public base URL).
    pub resource: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            discovery_url: "https://id.tellerwallet.dev/.well-known/openid-configuration"
                .to_string(),
            client_id: "teller-cli".to_string(),
            client_secret: None,
            scopes: vec![
                "wallet:read".to_string(),
                "wallet:write".to_string(),
                "offline_access".to_string(),
            ],
            callback_port: 8976,
            api_base_url: "https://api.tellerwallet.dev".to_string(),
            bind_address: "127.0.0.1:8080".to_string(),
            resource: "https://api.tellerwallet.dev".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the user config file (if present) with env-var
    /// overrides applied.
    pub fn load() -> Result<Self> {
        let mut settings = match config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Load settings from a specific file (no discovery, no overrides).
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// The authorization server base, derived by stripping the well-known
    /// suffix from the discovery URL. Advertised to hosted-mode callers.
    pub fn authorization_server(&self) -> String {
        self.discovery_url
            .trim_end_matches('/')
            .trim_end_matches("/.well-known/openid-configuration")
            .to_string()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("TELLER_DISCOVERY_URL") {
            self.discovery_url = value;
        }
        if let Ok(value) = std::env::var("TELLER_CLIENT_ID") {
            self.client_id = value;
        }
        if let Ok(value) = std::env::var("TELLER_CLIENT_SECRET") {
            self.client_secret = Some(value);
        }
        if let Ok(value) = std::env::var("TELLER_API_URL") {
            self.api_base_url = value;
        }
        if let Ok(value) = std::env::var("TELLER_BIND_ADDRESS") {
            self.bind_address = value;
        }
        if let Ok(value) = std::env::var("TELLER_CALLBACK_PORT")
            && let Ok(port) = value.parse()
        {
            self.callback_port = port;
        }
    }
}
