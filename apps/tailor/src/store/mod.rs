//! Key-value settings persistence and the document ledger built on top of it.
//!
//! Everything that survives a restart goes through [`SettingsStore`]: the API key,
//! the selected model, the generated-document list and the last keyword list.
//! Callers receive the store as `Arc<dyn SettingsStore>`; nothing reaches for a global.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;

pub mod documents;
pub mod handlers;
pub mod settings;

pub use documents::DocumentStore;
pub use settings::JsonFileStore;
#[cfg(test)]
pub use settings::MemoryStore;

pub const API_KEY: &str = "apiKey";
pub const MODEL_ID: &str = "modelId";
pub const DOCUMENTS: &str = "documents";
pub const LAST_KEYWORDS: &str = "lastKeywords";
pub const RESUME_TEMPLATE: &str = "resumeTemplate";
pub const COVER_LETTER_TEMPLATE: &str = "coverLetterTemplate";

pub const DEFAULT_MODEL_ID: &str = "gemini-2.5-flash";

/// Keys the HTTP settings surface is allowed to read and write.
pub const KNOWN_KEYS: [&str; 6] = [
    API_KEY,
    MODEL_ID,
    DOCUMENTS,
    LAST_KEYWORDS,
    RESUME_TEMPLATE,
    COVER_LETTER_TEMPLATE,
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Background write failed: {0}")]
    Background(String),
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Writes one key. Implementations flush before returning.
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Values every fresh store starts with.
pub fn defaults() -> Map<String, Value> {
    let mut values = Map::new();
    values.insert(API_KEY.to_string(), json!(""));
    values.insert(MODEL_ID.to_string(), json!(DEFAULT_MODEL_ID));
    values.insert(DOCUMENTS.to_string(), json!([]));
    values.insert(LAST_KEYWORDS.to_string(), json!([]));
    values.insert(RESUME_TEMPLATE.to_string(), json!(""));
    values.insert(COVER_LETTER_TEMPLATE.to_string(), json!(""));
    values
}

/// Reads a string key, treating a missing or non-string value as empty.
pub async fn get_string(store: &dyn SettingsStore, key: &str) -> Result<String, StoreError> {
    Ok(store
        .get(key)
        .await?
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default())
}

/// Reads and deserializes a key, falling back to `T::default()` when it is absent.
pub async fn get_typed<T>(store: &dyn SettingsStore, key: &str) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    match store.get(key).await? {
        Some(Value::Null) | None => Ok(T::default()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_string_defaults_to_empty() {
        let store = MemoryStore::new();
        assert_eq!(get_string(&store, API_KEY).await.unwrap(), "");

        store.set(API_KEY, json!(42)).await.unwrap();
        assert_eq!(get_string(&store, API_KEY).await.unwrap(), "");

        store.set(API_KEY, json!("secret")).await.unwrap();
        assert_eq!(get_string(&store, API_KEY).await.unwrap(), "secret");
    }

    #[tokio::test]
    async fn test_get_typed_falls_back_to_default() {
        let store = MemoryStore::new();
        let keywords: Vec<String> = get_typed(&store, LAST_KEYWORDS).await.unwrap();
        assert!(keywords.is_empty());

        store
            .set(LAST_KEYWORDS, json!(["Rust", "Tokio"]))
            .await
            .unwrap();
        let keywords: Vec<String> = get_typed(&store, LAST_KEYWORDS).await.unwrap();
        assert_eq!(keywords, vec!["Rust", "Tokio"]);
    }

    #[tokio::test]
    async fn test_get_typed_rejects_wrong_shape() {
        let store = MemoryStore::new();
        store.set(LAST_KEYWORDS, json!("not a list")).await.unwrap();
        let result: Result<Vec<String>, _> = get_typed(&store, LAST_KEYWORDS).await;
        assert!(matches!(result, Err(StoreError::Serde(_))));
    }

    #[test]
    fn test_defaults_cover_every_known_key() {
        let values = defaults();
        for key in KNOWN_KEYS {
            assert!(values.contains_key(key), "missing default for {key}");
        }
        assert_eq!(values[MODEL_ID], "gemini-2.5-flash");
    }
}
