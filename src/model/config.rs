//! Document model provider configuration.
//!
//! Env vars: DLP_PROVIDER, DLP_ENDPOINT, DLP_API_KEY (falls back to GEMINI_API_KEY),
//! DLP_TRIAGE_MODEL, DLP_ANALYST_MODEL, DLP_TEMPERATURE, DLP_MAX_TOKENS,
//! DLP_TIMEOUT_SECS

use serde::{Deserialize, Serialize};

/// Document model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Google Gemini generateContent API (default)
    #[default]
    Gemini,
    /// Ollama /api/generate with a local vision model
    Ollama,
}

impl prefer::FromValue for ModelProvider {
    fn from_value(value: &prefer::ConfigValue) -> prefer::Result<Self> {
        match value.as_str() {
            Some(s) => ModelProvider::from_str(s).ok_or_else(|| prefer::Error::ConversionError {
                key: String::new(),
                type_name: "ModelProvider".to_string(),
                source: format!("unknown provider: {}", s).into(),
            }),
            None => Err(prefer::Error::ConversionError {
                key: String::new(),
                type_name: "ModelProvider".to_string(),
                source: "expected string".into(),
            }),
        }
    }
}

impl ModelProvider {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }

    /// Endpoint used when none is configured.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::Ollama => "http://localhost:11434",
        }
    }
}

/// Connection and generation settings for the document model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct ModelConfig {
    /// Provider (gemini or ollama)
    #[serde(default)]
    #[prefer(default)]
    pub provider: ModelProvider,
    /// API endpoint; provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[prefer(default)]
    pub endpoint: Option<String>,
    /// API key (Gemini only)
    #[serde(default, skip_serializing)]
    #[prefer(default)]
    pub api_key: Option<String>,
    /// Fast model used for triage
    #[serde(default = "default_triage_model")]
    #[prefer(default = "gemini-1.5-flash")]
    pub triage_model: String,
    /// Capable model used for transcription
    #[serde(default = "default_analyst_model")]
    #[prefer(default = "gemini-1.5-pro")]
    pub analyst_model: String,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    #[prefer(default)]
    pub temperature: f32,
    /// Maximum output tokens per response
    #[serde(default = "default_max_output_tokens")]
    #[prefer(default = "8192")]
    pub max_output_tokens: u32,
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    #[prefer(default = "120")]
    pub timeout_secs: u64,
    /// Delay inserted before every request, in milliseconds
    #[serde(default)]
    #[prefer(default)]
    pub request_delay_ms: u64,
    /// Transport-level retries on HTTP 429. Off by default: a rate-limited
    /// call surfaces as `RateLimited` and the pipeline retry policy decides.
    #[serde(default)]
    #[prefer(default)]
    pub max_rate_limit_retries: u32,
}

fn default_triage_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_analyst_model() -> String {
    "gemini-1.5-pro".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl ModelConfig {
    /// Defaults without consulting the environment.
    pub fn base_default() -> Self {
        Self {
            provider: ModelProvider::default(),
            endpoint: None,
            api_key: None,
            triage_model: default_triage_model(),
            analyst_model: default_analyst_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: 0,
            max_rate_limit_retries: 0,
        }
    }

    /// Apply environment variable overrides. Env always wins over file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("DLP_PROVIDER") {
            if let Some(provider) = ModelProvider::from_str(&val) {
                self.provider = provider;
            }
        }
        if let Ok(val) = std::env::var("DLP_ENDPOINT") {
            self.endpoint = Some(val);
        }
        if let Ok(val) = std::env::var("DLP_API_KEY") {
            self.api_key = Some(val);
        } else if self.api_key.is_none() {
            self.api_key = std::env::var("GEMINI_API_KEY").ok();
        }
        if let Ok(val) = std::env::var("DLP_TRIAGE_MODEL") {
            self.triage_model = val;
        }
        if let Ok(val) = std::env::var("DLP_ANALYST_MODEL") {
            self.analyst_model = val;
        }
        if let Ok(val) = std::env::var("DLP_TEMPERATURE") {
            if let Ok(t) = val.parse() {
                self.temperature = t;
            }
        }
        if let Ok(val) = std::env::var("DLP_MAX_TOKENS") {
            if let Ok(n) = val.parse() {
                self.max_output_tokens = n;
            }
        }
        if let Ok(val) = std::env::var("DLP_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.timeout_secs = n;
            }
        }
        self
    }

    /// Configured endpoint or the provider's default, without a trailing slash.
    pub fn effective_endpoint(&self) -> String {
        self.endpoint
            .as_deref()
            .unwrap_or(self.provider.default_endpoint())
            .trim_end_matches('/')
            .to_string()
    }

    /// Check if the config equals the default (for skip_serializing_if).
    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_str() {
        assert_eq!(ModelProvider::from_str("Gemini"), Some(ModelProvider::Gemini));
        assert_eq!(ModelProvider::from_str("ollama"), Some(ModelProvider::Ollama));
        assert_eq!(ModelProvider::from_str("openai"), None);
    }

    #[test]
    fn base_defaults() {
        let config = ModelConfig::base_default();
        assert_eq!(config.provider, ModelProvider::Gemini);
        assert_eq!(config.triage_model, "gemini-1.5-flash");
        assert_eq!(config.analyst_model, "gemini-1.5-pro");
        assert_eq!(config.max_output_tokens, 8192);
        assert_eq!(config.max_rate_limit_retries, 0);
        assert!(config.is_default());
    }

    #[test]
    fn effective_endpoint_defaults_per_provider() {
        let mut config = ModelConfig::base_default();
        assert_eq!(
            config.effective_endpoint(),
            "https://generativelanguage.googleapis.com/v1beta"
        );
        config.provider = ModelProvider::Ollama;
        assert_eq!(config.effective_endpoint(), "http://localhost:11434");
        config.endpoint = Some("http://gpu-box:11434/".to_string());
        assert_eq!(config.effective_endpoint(), "http://gpu-box:11434");
    }

    #[test]
    fn deserializes_partial_toml() {
        let config: ModelConfig = toml::from_str(
            r#"
            provider = "ollama"
            triage_model = "llava:13b"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, ModelProvider::Ollama);
        assert_eq!(config.triage_model, "llava:13b");
        assert_eq!(config.analyst_model, "gemini-1.5-pro");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_rate_limit_retries, 0);
    }

    #[test]
    fn api_key_is_never_serialized() {
        let mut config = ModelConfig::base_default();
        config.api_key = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
