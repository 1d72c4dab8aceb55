//! Configuration management for db-chat.
//!
//! Handles loading configuration from TOML files and environment variables.

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable overriding the backend URL.
pub const API_URL_ENV: &str = "DB_CHAT_API_URL";

/// Environment variable providing a pre-issued session token.
pub const TOKEN_ENV: &str = "DB_CHAT_TOKEN";

/// Main configuration structure for db-chat.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Backend API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Local transcript storage.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backend API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend, e.g. `http://localhost:8000`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Session token to use instead of logging in.
    #[serde(default)]
    pub token: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            token: None,
        }
    }
}

impl ApiConfig {
    /// Parses and validates the base URL.
    pub fn url(&self) -> Result<Url> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|e| ChatError::config(format!("Invalid API URL '{}': {e}", self.base_url)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ChatError::config(format!(
                "Invalid scheme '{}'. Expected 'http' or 'https'",
                url.scheme()
            )));
        }
        if url.cannot_be_a_base() {
            return Err(ChatError::config(format!(
                "Invalid API URL '{}'",
                self.base_url
            )));
        }
        Ok(url)
    }

    /// Applies `DB_CHAT_API_URL` and `DB_CHAT_TOKEN`.
    ///
    /// The URL variable wins over the file; the token only fills a missing value.
    pub fn apply_env_defaults(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        if self.token.is_none() {
            self.token = std::env::var(TOKEN_ENV)
                .ok()
                .filter(|t| !t.trim().is_empty());
        }
    }
}

/// Transcript storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// State database location. Defaults to the platform config directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Keep transcripts in memory only.
    #[serde(default)]
    pub in_memory: bool,
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-chat")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ChatError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ChatError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
[api]
base_url = "https://chat.example.com/api/"
timeout_secs = 10
token = "dev-token"

[storage]
path = "/var/lib/db-chat/state.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.api.base_url, "https://chat.example.com/api/");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.api.token.as_deref(), Some("dev-token"));
        assert_eq!(
            config.storage.path,
            Some(PathBuf::from("/var/lib/db-chat/state.db"))
        );
        assert!(!config.storage.in_memory);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.api.token, None);
        assert_eq!(config.storage.path, None);
    }

    #[test]
    fn test_url_validation() {
        let mut api = ApiConfig::default();
        assert_eq!(api.url().unwrap().as_str(), "http://localhost:8000/");

        api.base_url = "ftp://example.com".to_string();
        let err = api.url().unwrap_err();
        assert!(err.to_string().contains("Invalid scheme"));

        api.base_url = "not a url".to_string();
        assert!(matches!(api.url(), Err(ChatError::Config(_))));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_invalid_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\ntimeout_secs = \"soon\"\n").unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_default_path_location() {
        assert!(Config::default_path().ends_with("db-chat/config.toml"));
    }
}
