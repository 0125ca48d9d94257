//! Google Gemini provider.
//!
//! Calls `generateContent` with the API key in the `x-goog-api-key` header.

use super::{ChatRequest, ChatResponse, Provider, ProviderError};
use async_trait::async_trait;
use relay_common::GeminiConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const PROVIDER: &str = "gemini";

/// The key never appears in the URL, so transport errors cannot echo it.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider over the public REST API.
pub struct GeminiProvider {
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

// ══════════════════════════════════════════════════════════════════════════════
// API REQUEST/RESPONSE TYPES
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl GeminiProvider {
    /// Create a provider from explicit settings.
    pub fn new(api_key: Option<&str>, base_url: &str, timeout: Duration) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()).map(String::from),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Create a provider from the `gemini` config section.
    pub fn from_config(config: &GeminiConfig) -> Self {
        Self::new(
            config.api_key.as_deref(),
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, model: &str) -> String {
        let model_name = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!("{}/v1beta/{model_name}:generateContent", self.base_url)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();
        let model = request.model.as_str();

        let api_key = self.api_key.as_ref().ok_or_else(|| {
            ProviderError::new(
                PROVIDER,
                model,
                "Gemini API key not found. Set GEMINI_API_KEY or gemini.api_key.",
            )
        })?;

        let contents = request
            .messages
            .iter()
            .map(|msg| Content {
                role: msg.role.as_str(),
                parts: vec![Part {
                    text: msg.content.clone(),
                }],
            })
            .collect();

        let generation_config = (request.temperature.is_some() || request.max_tokens.is_some())
            .then(|| GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            });

        let body = GenerateContentRequest {
            contents,
            generation_config,
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(PROVIDER, model, format!("Request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError {
                status_code: Some(status.as_u16()),
                ..ProviderError::new(
                    PROVIDER,
                    model,
                    format!("API error ({}): {}", status.as_u16(), error_text),
                )
            });
        }

        let result: GenerateContentResponse = response.json().await.map_err(|e| {
            ProviderError::new(
                PROVIDER,
                model,
                format!("Failed to parse response: {}", e.without_url()),
            )
        })?;

        if let Some(err) = result.error {
            return Err(ProviderError::new(
                PROVIDER,
                model,
                format!("API error: {}", err.message),
            ));
        }

        let candidate = result
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| ProviderError::new(PROVIDER, model, "No response from Gemini"))?;

        let content: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::new(
                PROVIDER,
                model,
                "Gemini returned an empty response",
            ));
        }

        tracing::debug!(
            model = %model,
            latency_ms = start.elapsed().as_millis() as u64,
            "Gemini response received"
        );

        Ok(ChatResponse {
            provider: PROVIDER.into(),
            model: request.model,
            content,
            finish_reason: candidate.finish_reason,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
