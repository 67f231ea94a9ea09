use crate::error::StoreError;
use crate::models::{Chunk, DocumentRecord, WorkActivity};
use async_trait::async_trait;

#[async_trait]
pub trait GraphSink {
    /// Idempotent upsert of the document node, its activity nodes, and
    /// the contains/depends-on edges between them.
    async fn upsert_document(
        &self,
        document: &DocumentRecord,
        activities: &[WorkActivity],
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait VectorSink {
    /// Idempotent upsert of one point per chunk, keyed by
    /// (document hash, chunk index).
    async fn upsert_chunks(
        &self,
        document: &DocumentRecord,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError>;
}
