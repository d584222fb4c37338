//! Config file discovery and parsing.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use super::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config {path}: {message}")]
    Parse {
        path: String,
        format: &'static str,
        message: String,
    },
}

impl Config {
    /// Load from an explicit path, or discover a `dlproc` config file with
    /// prefer. Falls back to defaults (with env overrides) when nothing is found.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path).await;
        }

        match prefer::load("dlproc").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => {
                    debug!("Discovered config at {}", path.display());
                    Self::load_from_path(path).await
                }
                None => Ok(Self::default()),
            },
            Err(e) => {
                debug!("No config file discovered ({}), using defaults", e);
                Ok(Self::default())
            }
        }
    }

    /// Like [`load`](Self::load) but logs and falls back to defaults on error.
    pub async fn load_or_default(explicit: Option<&Path>) -> Self {
        match Self::load(explicit).await {
            Ok(config) => config,
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Format follows the extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        config.model = config.model.with_env_overrides();
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_error = |format: &'static str, message: String| ConfigError::Parse {
            path: path.display().to_string(),
            format,
            message,
        };

        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_error("TOML", e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| parse_error("YAML", e.to_string()))
            }
            _ => serde_json::from_str(contents).map_err(|e| parse_error("JSON", e.to_string())),
        }
    }
}
