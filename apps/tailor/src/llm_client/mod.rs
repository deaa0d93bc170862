//! Generation client — the single point of entry for remote text generation.
//!
//! No other module talks to the generation service directly. The HTTP hop sits
//! behind [`GenerationTransport`] so everything above it (credential check,
//! status handling, candidate extraction, fence stripping) is exercised in tests
//! without a network.
//!
//! One request per call. No retries.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::PipelineError;

pub mod prompts;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const UNKNOWN_ERROR: &str = "Unknown error";

// ────────────────────────────────────────────────────────────────────────────
// Wire format
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

impl GenerateContentRequest {
    pub fn new(prompt: &str, system_prompt: &str) -> Self {
        Self {
            contents: vec![Content::text(prompt)],
            system_instruction: Content::text(system_prompt),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Raw status and body of one round trip.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Transport seam
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait GenerationTransport: Send + Sync {
    async fn post(
        &self,
        model_id: &str,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<TransportResponse, PipelineError>;
}

/// Posts to `{base}/models/{model}:generateContent?key={api_key}`.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, model_id: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model_id)
    }
}

#[async_trait]
impl GenerationTransport for HttpTransport {
    async fn post(
        &self,
        model_id: &str,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<TransportResponse, PipelineError> {
        let response = self
            .client
            .post(self.endpoint(model_id))
            .query(&[("key", api_key)])
            .json(request)
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_failure)?;

        Ok(TransportResponse { status, body })
    }
}

fn transport_failure(err: reqwest::Error) -> PipelineError {
    // reqwest puts the full URL, key included, into its messages.
    PipelineError::TransportFailure {
        message: err.without_url().to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct GenerationClient {
    transport: Arc<dyn GenerationTransport>,
}

impl GenerationClient {
    pub fn new(transport: Arc<dyn GenerationTransport>) -> Self {
        Self { transport }
    }

    /// Generates text and strips markdown fences from it.
    pub async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        model_id: &str,
        api_key: &str,
    ) -> Result<String, PipelineError> {
        let raw = self
            .generate_raw(prompt, system_prompt, model_id, api_key)
            .await?;

        let cleaned = strip_latex_fences(&raw);
        if cleaned.is_empty() {
            return Err(PipelineError::EmptyResponse);
        }
        Ok(cleaned)
    }

    /// Generates text and returns the first candidate untouched.
    pub async fn generate_raw(
        &self,
        prompt: &str,
        system_prompt: &str,
        model_id: &str,
        api_key: &str,
    ) -> Result<String, PipelineError> {
        if api_key.is_empty() {
            return Err(PipelineError::MissingCredential);
        }

        let request = GenerateContentRequest::new(prompt, system_prompt);
        let response = self.transport.post(model_id, api_key, &request).await?;

        if !(200..300).contains(&response.status) {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&response.body)
                .ok()
                .and_then(|e| e.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
            warn!(
                status = response.status,
                model_id, "Generation service rejected request: {message}"
            );
            return Err(PipelineError::RemoteFailure {
                status_code: response.status,
                message,
            });
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&response.body).map_err(|e| PipelineError::TransportFailure {
                message: format!("malformed response body: {e}"),
            })?;

        let text = parsed
            .first_text()
            .filter(|t| !t.is_empty())
            .ok_or(PipelineError::EmptyResponse)?;

        debug!(model_id, chars = text.chars().count(), "Generation call succeeded");
        Ok(text)
    }
}

/// Removes every ```` ```latex ```` and ```` ``` ```` delimiter, each with one
/// trailing newline if present, then trims the result.
pub fn strip_latex_fences(text: &str) -> String {
    let without_tagged = remove_fence(text, "```latex");
    remove_fence(&without_tagged, "```").trim().to_string()
}

fn remove_fence(text: &str, fence: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find(fence) {
        out.push_str(&rest[..idx]);
        rest = &rest[idx + fence.len()..];
        rest = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest);
    }
    out.push_str(rest);
    out
}
