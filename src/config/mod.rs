//! Configuration management using the prefer crate.
//!
//! Sections: `model` (provider and generation settings), `pipeline`
//! (concurrency and retry), plus optional `taxonomy` and `data_dir` paths.

mod loader;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use loader::ConfigError;

use crate::model::ModelConfig;

/// Data directory used when neither config nor flags name one.
pub const DEFAULT_DATA_DIR: &str = "./dlp-data";

/// Pipeline execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct PipelineConfig {
    /// Documents processed concurrently in a batch
    #[serde(default = "default_workers")]
    #[prefer(default = "4")]
    pub workers: usize,
    /// Attempts per model call; 1 means no retries
    #[serde(default = "default_max_attempts")]
    #[prefer(default = "1")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts
    #[serde(default = "default_retry_backoff_ms")]
    #[prefer(default = "1000")]
    pub retry_backoff_ms: u64,
    /// Drop extracted keys outside the schema instead of failing the document
    #[serde(default = "default_true")]
    #[prefer(default = "true")]
    pub prune_extra_fields: bool,
}

fn default_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            prune_extra_fields: true,
        }
    }
}

impl PipelineConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// Document model provider settings.
    #[serde(default, skip_serializing_if = "ModelConfig::is_default")]
    #[prefer(default)]
    pub model: ModelConfig,
    /// Pipeline execution settings.
    #[serde(default, skip_serializing_if = "PipelineConfig::is_default")]
    #[prefer(default)]
    pub pipeline: PipelineConfig,
    /// Taxonomy file (JSON, TOML or YAML); built-in lanes when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<String>,
    /// Data directory for raw files and records.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "target")]
    pub data_dir: Option<String>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    fn base_dir_or_cwd(&self) -> PathBuf {
        self.base_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Effective data directory. An explicit override (CLI flag) wins.
    pub fn data_dir_path(&self, override_dir: Option<&Path>) -> PathBuf {
        if let Some(dir) = override_dir {
            return self.resolve_path(&dir.to_string_lossy(), Path::new("."));
        }
        match self.data_dir {
            Some(ref dir) => self.resolve_path(dir, &self.base_dir_or_cwd()),
            None => PathBuf::from(DEFAULT_DATA_DIR),
        }
    }

    /// Taxonomy file path, if one is configured.
    pub fn taxonomy_path(&self) -> Option<PathBuf> {
        self.taxonomy
            .as_ref()
            .map(|t| self.resolve_path(t, &self.base_dir_or_cwd()))
    }
}
