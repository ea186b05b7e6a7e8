use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use chainrun_core::config::GenerationConfig;
use chainrun_core::error::{ChainError, Result};
use chainrun_core::traits::TextGenerator;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini native API client (single-shot `generateContent`).
pub struct GeminiClient {
    http: Client,
    config: GenerationConfig,
}

impl GeminiClient {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!(
            "{}/v1beta/models/{}:generateContent",
            base, self.config.model_id
        )
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationParams>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// ── Response types ───────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PromptFeedback {
    #[serde(default, rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Deserialize, Debug)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

fn build_request(prompt: String, config: &GenerationConfig) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart { text: Some(prompt) }],
        }],
        generation_config: Some(GenerationParams {
            max_output_tokens: Some(config.max_tokens),
            temperature: if config.temperature > 0.0 {
                Some(config.temperature)
            } else {
                None
            },
        }),
    }
}

/// Join the text parts of the first candidate.
fn extract_text(response: GeminiResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ChainError::Generation(format!(
            "prompt blocked by Gemini: {}",
            reason
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ChainError::Generation("Gemini returned no candidates".into()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".into());
        return Err(ChainError::Generation(format!(
            "Gemini returned no text (finish reason {})",
            reason
        )));
    }

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason != "STOP" {
            warn!(finish_reason = reason, "Gemini response finished early");
        }
    }

    Ok(text)
}

fn describe_http_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<GeminiErrorBody>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(kind) => format!("HTTP {} ({}): {}", status, kind, parsed.error.message),
            None => format!("HTTP {}: {}", status, parsed.error.message),
        },
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

impl TextGenerator for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let api_key = self.config.api_key.as_deref().ok_or_else(|| {
                ChainError::GeneratorNotConfigured("Gemini: api_key is required".into())
            })?;

            let body = build_request(prompt, &self.config);

            debug!(model = %self.config.model_id, "Sending Gemini request");
            let response = self
                .http
                .post(self.endpoint())
                .header("x-goog-api-key", api_key)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| ChainError::Generation(e.without_url().to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(ChainError::Generation(describe_http_error(status, &body)));
            }

            let parsed: GeminiResponse = response
                .json()
                .await
                .map_err(|e| {
                    ChainError::Generation(format!("invalid Gemini response: {}", e.without_url()))
                })?;

            extract_text(parsed)
        })
    }
}
