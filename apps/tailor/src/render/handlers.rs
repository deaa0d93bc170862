//! Axum route handlers for the Render API.

use std::path::PathBuf;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    pub latex_content: String,
    pub file_path: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /api/v1/render/compile
///
/// Compiles caller-supplied LaTeX to the given path. Compile failures are reported
/// in the body; only malformed requests are HTTP errors.
pub async fn handle_compile(
    State(state): State<AppState>,
    Json(request): Json<CompileRequest>,
) -> Result<Json<CompileResponse>, AppError> {
    if request.latex_content.trim().is_empty() {
        return Err(AppError::Validation("latexContent cannot be empty".to_string()));
    }
    if request.file_path.as_os_str().is_empty() {
        return Err(AppError::Validation("filePath cannot be empty".to_string()));
    }

    let response = match state
        .compiler
        .compile(&request.latex_content, &request.file_path)
        .await
    {
        Ok(compiled) => CompileResponse {
            success: true,
            file_path: Some(compiled.output_path.display().to_string()),
            error: None,
        },
        Err(e) => {
            warn!(path = %request.file_path.display(), "Standalone compile failed: {e}");
            CompileResponse {
                success: false,
                file_path: None,
                error: Some(e.to_string()),
            }
        }
    };

    Ok(Json(response))
}
