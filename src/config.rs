//! Configuration management for the career recommender

use crate::models::loader::DEFAULT_BUNDLE_CANDIDATES;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model bundle location
#[derive(Debug, Clone, Deserialize)]
pub struct BundleConfig {
    /// Artifact paths, tried in order
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
}

fn default_candidates() -> Vec<String> {
    DEFAULT_BUNDLE_CANDIDATES.iter().map(|s| s.to_string()).collect()
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
        }
    }
}

/// NATS connection configuration (serve mode)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming prediction requests
    pub request_subject: String,
    /// Subject for results of requests that carry no reply inbox
    pub result_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            request_subject: "career.predict".to_string(),
            result_subject: "career.results".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path, which must exist.
    ///
    /// Environment variables prefixed `CAREER__` override file values,
    /// e.g. `CAREER__NATS__URL`.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(path.as_ref(), true)
    }

    /// Like [`AppConfig::load_from_path`], but a missing file yields the
    /// defaults. Environment overrides apply either way.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(path.as_ref(), false)
    }

    fn build(path: &Path, required: bool) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(Environment::with_prefix("CAREER").prefix_separator("__").separator("__"))
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path.display()))?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
