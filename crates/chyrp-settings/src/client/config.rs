//! Configuration for the settings HTTP client.

use crate::error::{Result, SettingsError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ENV_API_URL: &str = "CHYRP_API_URL";
pub const ENV_API_TOKEN: &str = "CHYRP_API_TOKEN";

/// Configuration for the settings HTTP client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, e.g. `https://blog.example.com/api`.
    pub base_url: String,
    /// Bearer token sent on every request.
    pub api_token: Option<String>,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Connection timeout in seconds.
    pub connection_timeout_secs: u64,
    pub user_agent: String,
    /// Proxy URL (empty for none).
    pub proxy_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: "http://localhost:8080/api".to_string(),
            api_token: None,
            request_timeout_ms: 30000,
            connection_timeout_secs: 10,
            user_agent: concat!("chyrp-settings/", env!("CARGO_PKG_VERSION")).to_string(),
            proxy_url: String::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Default location of the persisted config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("chyrp-admin").join("config.json"))
    }

    /// Defaults, overlaid by the config file (if any), overlaid by the
    /// environment.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SettingsError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = serde_json::from_str(&content).map_err(|e| {
            SettingsError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        debug!("Loaded client config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SettingsError::Config(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SettingsError::Config(e.to_string()))?;
        fs::write(path, json).map_err(|e| SettingsError::Config(e.to_string()))
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if url.trim().is_empty() {
                warn!("{} is set but empty, ignoring", ENV_API_URL);
            } else {
                self.base_url = url;
            }
        }
        if let Ok(token) = std::env::var(ENV_API_TOKEN) {
            if !token.trim().is_empty() {
                self.api_token = Some(token);
            }
        }
    }

    /// Parse and check `base_url`.
    pub fn api_url(&self) -> Result<url::Url> {
        let url = url::Url::parse(self.base_url.trim())
            .map_err(|e| {
                SettingsError::Config(format!("Invalid base_url {:?}: {}", self.base_url, e))
            })?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(SettingsError::Config(format!(
                    "Unsupported scheme {:?} in base_url",
                    other
                )))
            }
        }
        if url.cannot_be_a_base() {
            return Err(SettingsError::Config(format!(
                "base_url {:?} cannot be used as a base",
                self.base_url
            )));
        }
        Ok(url)
    }

    pub fn validate(&self) -> Result<()> {
        self.api_url()?;
        if self.request_timeout_ms == 0 {
            return Err(SettingsError::Config("request_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout_ms, 30000);
        assert_eq!(config.connection_timeout_secs, 10);
        assert!(config.api_token.is_none());
        assert_eq!(config.proxy_url, "");
        assert!(config.user_agent.starts_with("chyrp-settings/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let config = ClientConfig {
            request_timeout_ms: 500,
            ..ClientConfig::new("https://blog.example.com/api").with_token("t0k")
        };
        assert_eq!(config.request_timeout_ms, 500);
        assert_eq!(config.api_token.as_deref(), Some("t0k"));
        assert_eq!(config.base_url, "https://blog.example.com/api");
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let config = ClientConfig::new("ftp://example.com");
        assert!(matches!(config.validate(), Err(SettingsError::Config(_))));
    }

    #[test]
    fn test_rejects_relative_url() {
        assert!(ClientConfig::new("/api").validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = ClientConfig {
            request_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url": "https://a.example/api"}"#).unwrap();
        assert_eq!(config.base_url, "https://a.example/api");
        assert_eq!(config.request_timeout_ms, 30000);
    }
}
