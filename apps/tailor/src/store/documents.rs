use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::{get_typed, SettingsStore, StoreError, DOCUMENTS};
use crate::models::DocumentRecord;

/// Append-only ledger of generated documents, kept under the `documents` settings key.
///
/// `append` is a read-modify-write of the whole list, so it runs behind a
/// single-writer lock. Clones share the lock.
#[derive(Clone)]
pub struct DocumentStore {
    settings: Arc<dyn SettingsStore>,
    writer: Arc<Mutex<()>>,
}

impl DocumentStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            settings,
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub async fn append(&self, record: DocumentRecord) -> Result<(), StoreError> {
        let _guard = self.writer.lock().await;

        let mut records = self.read_all().await?;
        let id = record.id;
        records.push(record);
        let count = records.len();

        self.settings
            .set(DOCUMENTS, serde_json::to_value(&records)?)
            .await?;

        info!(%id, count, "Document record appended");
        Ok(())
    }

    /// All records, newest first.
    pub async fn list(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut records = self.read_all().await?;
        records.reverse();
        Ok(records)
    }

    async fn read_all(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        get_typed::<Vec<DocumentRecord>>(self.settings.as_ref(), DOCUMENTS).await
    }
}
