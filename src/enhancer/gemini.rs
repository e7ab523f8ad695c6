//! Google Gemini text generation over the public REST API.
//!
//! `POST {base_url}/v1beta/models/{model}:generateContent`, authenticated with
//! the `x-goog-api-key` header. Only the first candidate is used.

use super::TextGenerator;
use crate::api::{build_client, describe_transport_error, is_retryable_status, join_path};
use crate::config::{Credentials, Settings};
use crate::error::{EnhanceFailure, Error, Result};
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

pub struct GeminiClient {
    http: Client,
    endpoint: Url,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
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
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiClient {
    pub fn new(settings: &Settings, credentials: &Credentials) -> Result<Self> {
        let base = Url::parse(&settings.ai.base_url)
            .map_err(|e| Error::Config(format!("ai.base_url: {e}")))?;
        let endpoint = join_path(
            &base,
            &format!("v1beta/models/{}:generateContent", settings.ai.model),
        )
        .map_err(|e| Error::Config(format!("ai endpoint: {e}")))?;
        Ok(Self {
            http: build_client(settings.ai_timeout())?,
            endpoint,
            api_key: credentials.ai_api_key.clone(),
            temperature: settings.ai.temperature,
            max_output_tokens: settings.ai.max_output_tokens,
        })
    }
}

impl TextGenerator for GeminiClient {
    #[instrument(level = "info", skip_all)]
    async fn generate(&self, prompt: &str) -> std::result::Result<String, EnhanceFailure> {
        let t0 = Instant::now();
        let request = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EnhanceFailure::Retryable(describe_transport_error(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EnhanceFailure::Retryable(describe_transport_error(&e)))?;
        let elapsed_ms = t0.elapsed().as_millis();

        if !status.is_success() {
            warn!(status = status.as_u16(), elapsed_ms, body = %truncate_for_log(&body, 300), "Gemini call failed");
            if is_retryable_status(status) {
                return Err(EnhanceFailure::Retryable(format!(
                    "status {}: {}",
                    status.as_u16(),
                    truncate_for_log(&body, 300)
                )));
            }
            return Err(EnhanceFailure::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            EnhanceFailure::Rejected {
                status: status.as_u16(),
                body: format!("undecodable response: {e}"),
            }
        })?;
        debug!(elapsed_ms, candidates = parsed.candidates.len(), "Gemini call returned");

        extract_text(parsed)
    }
}

fn extract_text(response: GenerateContentResponse) -> std::result::Result<String, EnhanceFailure> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(EnhanceFailure::ContentFiltered(format!("prompt blocked: {reason}")));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(EnhanceFailure::EmptyGeneration);
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason.as_deref() {
            Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason) => Err(
                EnhanceFailure::ContentFiltered(format!("response blocked: {reason}")),
            ),
            _ => Err(EnhanceFailure::EmptyGeneration),
        };
    }

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if BLOCKING_FINISH_REASONS.contains(&reason) {
            return Err(EnhanceFailure::ContentFiltered(format!(
                "response blocked: {reason}"
            )));
        }
    }

    Ok(text)
}
