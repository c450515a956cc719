//! Server configuration.
//!
//! Layered: built-in defaults, then an optional TOML file, then `CHAMIE_*`
//! environment variables. The Gemini API key additionally honors the plain
//! `GEMINI_API_KEY` variable and is required before the server binds.

use std::env;
use std::path::Path;

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. Empty means permissive localhost defaults.
    pub allowed_origins: Vec<String>,
    pub gemini: GeminiSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8035,
            allowed_origins: Vec::new(),
            gemini: GeminiSettings::default(),
        }
    }
}

/// Upstream generation API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// API key. `GEMINI_API_KEY` in the environment takes precedence.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: i32,
    pub max_output_tokens: i32,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 4096,
        }
    }
}

impl ServerConfig {
    /// Load configuration, layering file and environment over defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&ServerConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        } else {
            builder = builder.add_source(File::with_name("chamie").required(false));
        }

        // CHAMIE_PORT=9000, CHAMIE_GEMINI__MODEL=..., etc.
        builder = builder.add_source(Environment::with_prefix("CHAMIE").separator("__"));

        builder
            .build()
            .context("failed to load configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    /// The upstream API key. Missing key is a startup-fatal condition; the
    /// server refuses to bind rather than fail every chat request later.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Ok(key) = env::var("GEMINI_API_KEY")
            && !key.trim().is_empty()
        {
            return Ok(key);
        }
        if let Some(key) = &self.gemini.api_key
            && !key.trim().is_empty()
        {
            return Ok(key.clone());
        }
        bail!("GEMINI_API_KEY is not set (environment or [gemini].api_key in the config file)")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_usable() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8035");
        assert_eq!(config.gemini.model, "gemini-1.5-flash");
        assert_eq!(config.gemini.max_output_tokens, 4096);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "port = 9001\n\n[gemini]\nmodel = \"gemini-pro\"").unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.gemini.model, "gemini-pro");
        // Untouched keys keep their defaults.
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_api_key_from_config_file() {
        let config = ServerConfig {
            gemini: GeminiSettings {
                api_key: Some("file-key".to_string()),
                ..GeminiSettings::default()
            },
            ..ServerConfig::default()
        };
        if env::var("GEMINI_API_KEY").is_err() {
            assert_eq!(config.resolve_api_key().unwrap(), "file-key");
        }
    }
}
