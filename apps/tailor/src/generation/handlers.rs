//! Axum route handlers for the Generation API.

use std::path::PathBuf;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::generation::generator::{GenerateRequest, GenerateResponse};
use crate::models::Template;
use crate::state::AppState;
use crate::store::{self, LAST_KEYWORDS};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: String,
}

#[derive(Debug, Serialize)]
pub struct RawGenerateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct KeywordsResponse {
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoadTemplateRequest {
    pub path: PathBuf,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/documents/generate
///
/// Full pipeline: prompt → generate → compile → record → (résumé) keywords.
/// Always answers 200; failures are described in the body with their kind.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Json<GenerateResponse> {
    let run = state.pipeline.run(request).await;
    // Keyword extraction outlives the request; dropping the handle detaches it.
    Json(GenerateResponse::from(&run))
}

/// POST /api/v1/generate/raw
///
/// Passes a caller-built prompt straight to the generation service.
pub async fn handle_generate_raw(
    State(state): State<AppState>,
    Json(request): Json<RawGenerateRequest>,
) -> Result<Json<RawGenerateResponse>, AppError> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::Validation("prompt cannot be empty".to_string()));
    }

    let response = match state
        .pipeline
        .generate_raw(&request.prompt, &request.system_prompt)
        .await
    {
        Ok(text) => RawGenerateResponse {
            success: true,
            text: Some(text),
            error: None,
        },
        Err(e) => {
            warn!(error_kind = ?e.kind(), "Raw generation failed: {e}");
            RawGenerateResponse {
                success: false,
                text: None,
                error: Some(e.to_string()),
            }
        }
    };

    Ok(Json(response))
}

/// GET /api/v1/keywords
///
/// Returns the keyword list from the most recent résumé run, or an empty list.
pub async fn handle_get_keywords(
    State(state): State<AppState>,
) -> Result<Json<KeywordsResponse>, AppError> {
    let keywords: Vec<String> = store::get_typed(state.settings.as_ref(), LAST_KEYWORDS).await?;
    Ok(Json(KeywordsResponse { keywords }))
}

/// POST /api/v1/templates/load
///
/// Reads a `.tex` file from the server's filesystem and returns it as a template.
pub async fn handle_load_template(
    Json(request): Json<LoadTemplateRequest>,
) -> Result<Json<Template>, AppError> {
    let is_tex = request
        .path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tex"));
    if !is_tex {
        return Err(AppError::Validation(
            "path must point to a .tex file".to_string(),
        ));
    }

    let template = Template::load(&request.path).await.map_err(|e| {
        debug!(path = %request.path.display(), "Template load failed: {e}");
        match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::NotFound(format!("Template {} not found", request.path.display()))
            }
            _ => AppError::Internal(anyhow::Error::new(e).context("failed to read template")),
        }
    })?;

    Ok(Json(template))
}
