//! Application configuration loaded from a TOML file and environment variables.
//!
//! Environment variables override the file:
//! - `SHIPPY_SERVER_URL`: fulfillment server base URL
//! - `SHIPPY_SERVER_API_KEY`: fulfillment server API key
//! - `SHIPPY_POSTAGE_API_KEY`: postage provider API key
//! - `SHIPPY_GEOCODING_API_KEY`: geocoding provider API key
//!
//! `RUST_LOG`, when set, takes precedence over `log_level`. `log_format` is
//! `text` (default) or `json`.

use std::path::{Path, PathBuf};

use fulfillment::CompletionConfig;
use serde::Deserialize;
use thiserror::Error;

pub const ENV_SERVER_URL: &str = "SHIPPY_SERVER_URL";
pub const ENV_SERVER_API_KEY: &str = "SHIPPY_SERVER_API_KEY";
pub const ENV_POSTAGE_API_KEY: &str = "SHIPPY_POSTAGE_API_KEY";
pub const ENV_GEOCODING_API_KEY: &str = "SHIPPY_GEOCODING_API_KEY";

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting '{0}'")]
    Missing(&'static str),
}

/// Fulfillment server connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

/// Postage provider credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostageConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_postage_url")]
    pub base_url: String,
}

impl Default for PostageConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_postage_url(),
        }
    }
}

/// Geocoding provider and address completion tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeocodingConfig {
    /// Only required for manual shipping.
    pub api_key: Option<String>,
    #[serde(default = "default_geocoding_url")]
    pub base_url: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_min_length")]
    pub min_length: usize,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_geocoding_url(),
            country: default_country(),
            min_length: default_min_length(),
        }
    }
}

impl GeocodingConfig {
    pub fn completion(&self) -> CompletionConfig {
        CompletionConfig {
            min_length: self.min_length,
            country: self.country.clone(),
            ..CompletionConfig::default()
        }
    }
}

/// Label output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelConfig {
    /// Image pasted onto every label.
    pub logo: Option<PathBuf>,
    #[serde(default = "default_offset_x")]
    pub offset_x: i64,
    #[serde(default = "default_offset_y")]
    pub offset_y: i64,
    /// Save labels here instead of opening a viewer.
    pub output_dir: Option<PathBuf>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            logo: None,
            offset_x: default_offset_x(),
            offset_y: default_offset_y(),
            output_dir: None,
        }
    }
}

/// How log lines are rendered on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub postage: PostageConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub label: LabelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            server: ServerConfig::default(),
            postage: PostageConfig::default(),
            geocoding: GeocodingConfig::default(),
            label: LabelConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_postage_url() -> String {
    clients::easypost::DEFAULT_BASE_URL.to_string()
}

fn default_geocoding_url() -> String {
    clients::google_maps::DEFAULT_BASE_URL.to_string()
}

fn default_country() -> String {
    common::address::DEFAULT_COUNTRY.to_string()
}

fn default_min_length() -> usize {
    3
}

fn default_offset_x() -> i64 {
    450
}

fn default_offset_y() -> i64 {
    425
}

impl Config {
    /// Parses configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads the file, applies environment overrides and checks required settings.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&text)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overrides credentials from variables that `lookup` finds and are non-empty.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(url) = value(ENV_SERVER_URL) {
            self.server.url = url;
        }
        if let Some(key) = value(ENV_SERVER_API_KEY) {
            self.server.api_key = key;
        }
        if let Some(key) = value(ENV_POSTAGE_API_KEY) {
            self.postage.api_key = key;
        }
        if let Some(key) = value(ENV_GEOCODING_API_KEY) {
            self.geocoding.api_key = Some(key);
        }
    }

    /// Checks the settings every shipping mode needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.url.trim().is_empty() {
            return Err(ConfigError::Missing("server.url"));
        }
        if self.postage.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("postage.api_key"));
        }
        Ok(())
    }

    /// Returns the geocoding API key, which manual shipping requires.
    pub fn geocoding_api_key(&self) -> Result<&str, ConfigError> {
        self.geocoding
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("geocoding.api_key"))
    }
}
