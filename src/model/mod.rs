//! Multimodal document-understanding service boundary.
//!
//! The pipeline only needs `infer(prompt, image) -> text`. Providers are
//! substitutable behind [`DocumentModel`]; Gemini and Ollama clients ship here.

mod backoff;
mod config;
mod gemini;
mod ollama;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use thiserror::Error;

pub use backoff::{backoff_delay, parse_retry_after};
pub use config::{ModelConfig, ModelProvider};
pub use gemini::GeminiModel;
pub use ollama::OllamaModel;

/// Errors from the document-understanding service call itself.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Model not configured: {0}")]
    NotConfigured(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Rate limited by {provider}, retry after {retry_after_secs:?}s")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Model returned no text")]
    EmptyResponse,
}

/// Raw document bytes plus their declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentImage {
    pub data: Vec<u8>,
    pub media_type: String,
}

impl DocumentImage {
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            data,
            media_type: media_type.into(),
        }
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Which pipeline phase a model serves. Triage uses a fast model, transcription
/// a more capable one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Triage,
    Analyst,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Triage => "triage",
            ModelRole::Analyst => "analyst",
        }
    }
}

/// A multimodal model that answers a text prompt about a document image.
///
/// One call is one request/response; implementations must not stream.
#[async_trait]
pub trait DocumentModel: Send + Sync {
    /// Identifier for logs (e.g. `gemini:gemini-1.5-flash`).
    fn name(&self) -> String;

    /// Whether the model has what it needs to run (API key, endpoint).
    fn is_available(&self) -> bool;

    /// Human-readable hint for making the model available.
    fn availability_hint(&self) -> String;

    /// Send the prompt and image, returning the model's free-form text.
    async fn infer(&self, prompt: &str, image: &DocumentImage) -> Result<String, ModelError>;
}

/// Construct the configured provider for a pipeline role.
pub fn build_model(config: &ModelConfig, role: ModelRole) -> Arc<dyn DocumentModel> {
    let model_name = match role {
        ModelRole::Triage => config.triage_model.clone(),
        ModelRole::Analyst => config.analyst_model.clone(),
    };
    match config.provider {
        ModelProvider::Gemini => Arc::new(GeminiModel::from_config(config, model_name)),
        ModelProvider::Ollama => Arc::new(OllamaModel::from_config(config, model_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_base64_encoding() {
        let image = DocumentImage::new(b"hello".to_vec(), "image/png");
        assert_eq!(image.to_base64(), "aGVsbG8=");
        assert_eq!(image.len(), 5);
        assert!(!image.is_empty());
    }

    #[test]
    fn build_model_uses_role_specific_model() {
        let mut config = ModelConfig::base_default();
        config.triage_model = "fast".to_string();
        config.analyst_model = "slow".to_string();

        let triage = build_model(&config, ModelRole::Triage);
        let analyst = build_model(&config, ModelRole::Analyst);
        assert_eq!(triage.name(), "gemini:fast");
        assert_eq!(analyst.name(), "gemini:slow");

        config.provider = ModelProvider::Ollama;
        let local = build_model(&config, ModelRole::Triage);
        assert_eq!(local.name(), "ollama:fast");
    }
}
