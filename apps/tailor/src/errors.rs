use std::path::{Path, PathBuf};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Failure of one pipeline stage. Every variant is a returned value; none is fatal to the process.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("API key is not set.")]
    MissingCredential,

    #[error("API request failed with status {status_code}: {message}")]
    RemoteFailure { status_code: u16, message: String },

    #[error("Request to generation service failed: {message}")]
    TransportFailure { message: String },

    #[error("No content generated from API.")]
    EmptyResponse,

    #[error("LaTeX compilation failed: {detail}\nCheck the .tex file at: {}", debug_source_path.display())]
    CompileFailure {
        detail: String,
        debug_source_path: PathBuf,
    },

    #[error("File I/O failed for {}: {message}", path.display())]
    FileIoFailure {
        path: PathBuf,
        message: String,
        /// Set once the debug source has been written.
        debug_source_path: Option<PathBuf>,
    },

    #[error("Document was produced but could not be recorded: {0}")]
    PersistFailure(String),

    #[error("Settings are unavailable: {0}")]
    SettingsUnavailable(String),
}

/// Serializable discriminant of [`PipelineError`], reported to requesters and observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    MissingInput,
    MissingCredential,
    RemoteFailure,
    TransportFailure,
    EmptyResponse,
    CompileFailure,
    #[serde(rename = "FileIOFailure")]
    FileIoFailure,
    PersistFailure,
    SettingsUnavailable,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MissingInput(_) => ErrorKind::MissingInput,
            PipelineError::MissingCredential => ErrorKind::MissingCredential,
            PipelineError::RemoteFailure { .. } => ErrorKind::RemoteFailure,
            PipelineError::TransportFailure { .. } => ErrorKind::TransportFailure,
            PipelineError::EmptyResponse => ErrorKind::EmptyResponse,
            PipelineError::CompileFailure { .. } => ErrorKind::CompileFailure,
            PipelineError::FileIoFailure { .. } => ErrorKind::FileIoFailure,
            PipelineError::PersistFailure(_) => ErrorKind::PersistFailure,
            PipelineError::SettingsUnavailable(_) => ErrorKind::SettingsUnavailable,
        }
    }

    /// Debug LaTeX path to hand back to the user, present for any failure after
    /// the source was saved.
    pub fn debug_source_path(&self) -> Option<&PathBuf> {
        match self {
            PipelineError::CompileFailure {
                debug_source_path, ..
            } => Some(debug_source_path),
            PipelineError::FileIoFailure {
                debug_source_path, ..
            } => debug_source_path.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn file_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        PipelineError::FileIoFailure {
            path: path.into(),
            message: err.to_string(),
            debug_source_path: None,
        }
    }

    /// File I/O failure on the output side, once `debug_source_path` exists on disk.
    pub(crate) fn output_io(
        path: impl Into<PathBuf>,
        err: std::io::Error,
        debug_source_path: &Path,
    ) -> Self {
        PipelineError::FileIoFailure {
            path: path.into(),
            message: err.to_string(),
            debug_source_path: Some(debug_source_path.to_path_buf()),
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Settings error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Store(e) => {
                tracing::error!("Settings store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "A settings storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
