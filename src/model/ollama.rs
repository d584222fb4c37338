//! Ollama backend for local vision models (llava, llama3.2-vision, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backoff::{apply_request_delay, retry_on_rate_limit};
use super::{DocumentImage, DocumentModel, ModelConfig, ModelError};

/// Ollama client bound to one model name.
pub struct OllamaModel {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    request_delay_ms: u64,
    max_rate_limit_retries: u32,
    client_error: Option<String>,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    images: Vec<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaModel {
    pub fn from_config(config: &ModelConfig, model: impl Into<String>) -> Self {
        let (client, client_error) = match Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
        {
            Ok(client) => (client, None),
            Err(e) => (Client::new(), Some(e.to_string())),
        };
        Self {
            client,
            endpoint: config.effective_endpoint(),
            model: model.into(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            request_delay_ms: config.request_delay_ms,
            max_rate_limit_retries: config.max_rate_limit_retries,
            client_error,
        }
    }

    fn build_request(&self, prompt: &str, image: &DocumentImage) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            images: vec![image.to_base64()],
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl DocumentModel for OllamaModel {
    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn is_available(&self) -> bool {
        self.client_error.is_none()
    }

    fn availability_hint(&self) -> String {
        match self.client_error {
            Some(ref e) => format!("Failed to create HTTP client: {}", e),
            None => format!(
                "Ollama at {} (model: {}). Pull the model with `ollama pull {}`",
                self.endpoint, self.model, self.model
            ),
        }
    }

    async fn infer(&self, prompt: &str, image: &DocumentImage) -> Result<String, ModelError> {
        if let Some(ref e) = self.client_error {
            return Err(ModelError::NotConfigured(format!(
                "Failed to create HTTP client: {}",
                e
            )));
        }

        let request = self.build_request(prompt, image);
        let url = format!("{}/api/generate", self.endpoint);

        apply_request_delay(self.request_delay_ms, "Ollama").await;
        debug!("Sending {} bytes to {}", image.len(), self.name());

        let resp = retry_on_rate_limit("ollama", self.max_rate_limit_retries, || async {
            self.client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| ModelError::Connection(e.to_string()))
        })
        .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("HTTP {}: {}", status, body)));
        }

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::Api(format!("Failed to parse response: {}", e)))?;

        if ollama_resp.response.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(ollama_resp.response)
    }
}
