//! Axum route handlers for documents and settings.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::models::DocumentRecord;
use crate::state::AppState;
use crate::store::{self, API_KEY, DOCUMENTS, KNOWN_KEYS, LAST_KEYWORDS};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SettingResponse {
    Plain { key: String, value: Value },
    /// The API key is only ever reported as present or absent.
    Masked {
        key: String,
        #[serde(rename = "isSet")]
        is_set: bool,
    },
}

#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub value: Value,
}

/// GET /api/v1/documents
///
/// Every generated document, newest first.
pub async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentRecord>>, AppError> {
    Ok(Json(state.documents.list().await?))
}

/// GET /api/v1/settings/:key
pub async fn handle_get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<SettingResponse>, AppError> {
    ensure_known(&key)?;

    if key == API_KEY {
        let is_set = !store::get_string(state.settings.as_ref(), API_KEY)
            .await?
            .is_empty();
        return Ok(Json(SettingResponse::Masked { key, is_set }));
    }

    let value = state.settings.get(&key).await?.unwrap_or(Value::Null);
    Ok(Json(SettingResponse::Plain { key, value }))
}

/// PUT /api/v1/settings/:key
///
/// Pipeline-owned keys (`documents`, `lastKeywords`) are read-only here.
pub async fn handle_put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<SetSettingRequest>,
) -> Result<Json<SettingResponse>, AppError> {
    ensure_known(&key)?;
    if key == DOCUMENTS || key == LAST_KEYWORDS {
        return Err(AppError::Validation(format!("{key} is read-only")));
    }
    if !request.value.is_string() {
        return Err(AppError::Validation(format!("{key} must be a string")));
    }

    state.settings.set(&key, request.value.clone()).await?;
    info!(key, "Setting updated");

    if key == API_KEY {
        let is_set = request.value.as_str().is_some_and(|v| !v.is_empty());
        return Ok(Json(SettingResponse::Masked { key, is_set }));
    }
    Ok(Json(SettingResponse::Plain {
        key,
        value: request.value,
    }))
}

fn ensure_known(key: &str) -> Result<(), AppError> {
    if KNOWN_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Unknown setting '{key}'")))
    }
}
