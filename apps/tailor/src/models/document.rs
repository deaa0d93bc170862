use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which kind of document a generation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    #[serde(rename = "resume")]
    Resume,
    #[serde(rename = "coverLetter", alias = "cover-letter")]
    CoverLetter,
}

impl DocumentKind {
    /// Human-readable label interpolated into prompts.
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::CoverLetter => "cover letter",
        }
    }

    /// File-name friendly slug used for debug sources and output PDFs.
    pub fn slug(self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::CoverLetter => "cover-letter",
        }
    }
}

/// A named LaTeX source blob selected by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub content: String,
}

impl Template {
    /// Loads a `.tex` file from disk, naming the template after the file.
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, content })
    }

    /// Template length in characters. This is the budget the generation service is asked to respect.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Persisted metadata row for one produced PDF. Never mutated after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub company: String,
    pub position: String,
    pub source_path: String,
    pub output_path: String,
    pub created_at: DateTime<Utc>,
}
