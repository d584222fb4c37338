//! Google Gemini multimodal backend.
//!
//! Requires an API key (`DLP_API_KEY` or `GEMINI_API_KEY`).
//!
//! Free tier limits (Gemini 1.5 Flash):
//! - 15 requests per minute
//! - 1,500 requests per day
//!
//! A 429 response becomes `ModelError::RateLimited` unless
//! `max_rate_limit_retries` opts into transport-level retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backoff::{apply_request_delay, retry_on_rate_limit};
use super::{DocumentImage, DocumentModel, ModelConfig, ModelError};

/// Header carrying the API key, so it never appears in request URLs.
const API_KEY_HEADER: &str = "x-goog-api-key";

const API_KEY_HINT: &str =
    "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/";

/// Gemini client bound to one model name.
pub struct GeminiModel {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    request_delay_ms: u64,
    max_rate_limit_retries: u32,
    client_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

impl GeminiModel {
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
            api_key: config.api_key.clone(),
            model: model.into(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            request_delay_ms: config.request_delay_ms,
            max_rate_limit_retries: config.max_rate_limit_retries,
            client_error,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn build_request(&self, prompt: &str, image: &DocumentImage) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text {
                        text: prompt.to_string(),
                    },
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: image.media_type.clone(),
                            data: image.to_base64(),
                        },
                    },
                ],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(response: GeminiResponse) -> Result<String, ModelError> {
    if let Some(error) = response.error {
        return Err(ModelError::Api(format!("Gemini API error: {}", error.message)));
    }

    let text: String = response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ModelError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl DocumentModel for GeminiModel {
    fn name(&self) -> String {
        format!("gemini:{}", self.model)
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some() && self.client_error.is_none()
    }

    fn availability_hint(&self) -> String {
        if let Some(ref e) = self.client_error {
            format!("Failed to create HTTP client: {}", e)
        } else if self.api_key.is_none() {
            format!(
                "{}\nFree tier: 15 req/min, 1,500 req/day with Gemini 1.5 Flash",
                API_KEY_HINT
            )
        } else {
            format!("Gemini is available (model: {})", self.model)
        }
    }

    async fn infer(&self, prompt: &str, image: &DocumentImage) -> Result<String, ModelError> {
        if let Some(ref e) = self.client_error {
            return Err(ModelError::NotConfigured(format!(
                "Failed to create HTTP client: {}",
                e
            )));
        }
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ModelError::NotConfigured(API_KEY_HINT.to_string()))?;

        let request = self.build_request(prompt, image);
        let url = self.generate_url();

        apply_request_delay(self.request_delay_ms, "Gemini").await;
        debug!(
            "Sending {} ({} bytes) to {}",
            image.media_type,
            image.len(),
            self.name()
        );

        let response = retry_on_rate_limit("gemini", self.max_rate_limit_retries, || async {
            self.client
                .post(&url)
                .header(API_KEY_HEADER, api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    ModelError::Connection(format!("HTTP request failed: {}", e.without_url()))
                })
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!(
                "Gemini API error ({}): {}",
                status, body
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| {
                ModelError::Api(format!("Failed to parse response: {}", e.without_url()))
            })?;

        response_text(gemini_response)
    }
}
