//! Server configuration.
//!
//! Sources are layered: built-in defaults, then an optional TOML file, then
//! `CHATRELAY__*` environment variables. The upstream credential additionally
//! falls back to `OPENAI_API_KEY`.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "chatrelay";

/// Conventional credential variable honoured when the config has no key.
pub const FALLBACK_API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the chat-completions API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API credential. Checked when a call is made, not at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Seconds allowed for establishing the upstream connection
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl UpstreamConfig {
    /// Configured credential, else the conventional environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| env::var(FALLBACK_API_KEY_VAR).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl AppConfig {
    /// Load configuration from `path` (or the default location) plus environment.
    ///
    /// A missing file is not an error; every field has a default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_file()?,
        };

        let built = Config::builder()
            .add_source(File::from(path.as_path()).format(FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix(&env_prefix()).separator("__"))
            .build()
            .with_context(|| format!("loading configuration from {}", path.display()))?;

        built
            .try_deserialize()
            .context("deserializing configuration")
    }

    /// Render the effective configuration with the credential masked.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut redacted = self.clone();
        if redacted.upstream.api_key.is_some() {
            redacted.upstream.api_key = Some("********".to_string());
        }
        toml::to_string_pretty(&redacted).context("serializing configuration to TOML")
    }
}

pub fn default_config_file() -> Result<PathBuf> {
    Ok(default_config_dir()?.join("config.toml"))
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

fn env_prefix() -> String {
    APP_NAME.to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upstream.base_url, "https://api.openai.com/v1");
        assert_eq!(config.upstream.connect_timeout_secs, 10);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 8088\n\n[upstream]\nbase_url = \"http://localhost:11434/v1\"\napi_key = \"sk-file\""
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.upstream.base_url, "http://localhost:11434/v1");
        assert_eq!(config.upstream.resolve_api_key().as_deref(), Some("sk-file"));
    }

    #[test]
    fn test_redacted_toml_masks_key() {
        let mut config = AppConfig::default();
        config.upstream.api_key = Some("sk-secret".to_string());
        let rendered = config.to_redacted_toml().unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("********"));
    }
}
