use crate::error::PipelineError;
use crate::models::{DocType, DocumentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub source: String,
    pub processed_at: DateTime<Utc>,
    pub doc_type: DocType,
    pub quality: f64,
    pub status: DocumentStatus,
}

/// Terminal processing state keyed by content hash. Read fully at
/// startup; upserted at commit time so a crash mid-pipeline never leaves
/// a phantom "completed" record.
#[derive(Clone)]
pub struct IntakeLedger {
    path: PathBuf,
    state: Arc<Mutex<HashMap<String, LedgerEntry>>>,
}

impl IntakeLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<(), PipelineError> {
        if !self.path.exists() {
            return Ok(());
        }
        let data = fs::read_to_string(&self.path).await?;
        let entries: HashMap<String, LedgerEntry> = serde_json::from_str(&data)?;
        let mut guard = self.state.lock().await;
        *guard = entries;
        Ok(())
    }

    pub async fn is_completed(&self, content_hash: &str) -> bool {
        let guard = self.state.lock().await;
        guard
            .get(content_hash)
            .is_some_and(|entry| entry.status == DocumentStatus::Completed)
    }

    pub async fn status(&self, content_hash: &str) -> Option<DocumentStatus> {
        let guard = self.state.lock().await;
        guard.get(content_hash).map(|entry| entry.status)
    }

    pub async fn upsert(
        &self,
        content_hash: &str,
        entry: LedgerEntry,
    ) -> Result<(), PipelineError> {
        let snapshot = {
            let mut guard = self.state.lock().await;
            guard.insert(content_hash.to_string(), entry);
            guard.clone()
        };
        self.persist(&snapshot).await
    }

    pub async fn flush(&self) -> Result<(), PipelineError> {
        let snapshot = self.state.lock().await.clone();
        self.persist(&snapshot).await
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn persist(&self, entries: &HashMap<String, LedgerEntry>) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let serialized = serde_json::to_string(entries)?;
        fs::write(&self.path, serialized).await?;
        Ok(())
    }
}
