use crate::error::PipelineError;
use crate::models::{Chunk, DocumentRecord, WorkActivity};
use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Durable local spool used when a graph or vector backend is
/// unreachable. Nothing is dropped: each record is replayable by a
/// reconciliation pass once the backend is back.
#[derive(Clone)]
pub struct ShadowWriter {
    dir: PathBuf,
}

impl ShadowWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn record(
        &self,
        document: &DocumentRecord,
        activities: &[WorkActivity],
        chunks: &[Chunk],
        reason: &str,
    ) -> Result<PathBuf, PipelineError> {
        fs::create_dir_all(&self.dir).await?;

        let payload = json!({
            "spooled_at": Utc::now().to_rfc3339(),
            "reason": reason,
            "document": document,
            "activities": activities,
            "chunks": chunks,
        });

        let path = self.dir.join(format!("{}.json", document.content_hash));
        fs::write(&path, serde_json::to_vec_pretty(&payload)?).await?;
        Ok(path)
    }

    /// Spooled records awaiting reconciliation.
    pub async fn pending(&self) -> Result<Vec<PathBuf>, PipelineError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if is_record {
                paths.push(path);
            }
        }

        paths.sort_unstable();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::ShadowWriter;
    use crate::models::{DocType, DocumentRecord, DocumentStatus, StructuralProfile};
    use tempfile::tempdir;

    fn record() -> DocumentRecord {
        DocumentRecord {
            content_hash: "abc123".to_string(),
            source_path: "/tmp/doc.txt".to_string(),
            bytes: 42,
            doc_type: DocType::RegulatoryNorms,
            subtype: None,
            confidence: 70.0,
            structure: StructuralProfile::default(),
            quality: 0.6,
            entities: Vec::new(),
            status: DocumentStatus::Completed,
            processed_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn spooled_records_are_listed_as_pending() {
        let dir = tempdir().expect("tempdir");
        let writer = ShadowWriter::new(dir.path().join("shadow"));

        assert!(writer.pending().await.expect("pending").is_empty());

        let path = writer
            .record(&record(), &[], &[], "backend unreachable")
            .await
            .expect("record");
        assert!(path.exists());

        let pending = writer.pending().await.expect("pending");
        assert_eq!(pending, vec![path]);
    }
}
