use crate::error::StoreError;
use crate::models::{Chunk, DocumentRecord};
use crate::traits::VectorSink;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        }
    }

    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(format!("{}/collections/{}", self.endpoint, self.collection))
            .send()
            .await
            .map_err(connection_aware)?;

        if response.status().is_success() {
            return Ok(());
        }

        if !response.status().is_client_error() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(format!("{}/collections/{}", self.endpoint, self.collection))
            .json(&json!({
                "vectors": {
                    "size": self.vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await
            .map_err(connection_aware)?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl VectorSink for QdrantStore {
    async fn upsert_chunks(
        &self,
        document: &DocumentRecord,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: format!(
                    "embedding count {} doesn't match chunk count {}",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                if embedding.len() != self.vector_size {
                    return Err(StoreError::BackendResponse {
                        backend: "qdrant".to_string(),
                        details: format!(
                            "embedding dimension {} != {}",
                            embedding.len(),
                            self.vector_size
                        ),
                    });
                }

                let category_tags: Vec<&str> = [
                    Some(document.doc_type.label()),
                    Some(chunk.strategy.label()),
                    document.subtype.as_deref(),
                ]
                .into_iter()
                .flatten()
                .collect();

                let payload = json!({
                    "document_hash": chunk.document_hash,
                    "chunk_index": chunk.chunk_index,
                    "text": chunk.text,
                    "quality": chunk.quality,
                    "strategy": chunk.strategy.label(),
                    "has_numbers": chunk.has_numbers,
                    "has_lists": chunk.has_lists,
                    "has_tables": chunk.has_tables,
                    "truncated": chunk.truncated,
                    "section": chunk.section,
                    "doc_type": document.doc_type.label(),
                    "subtype": document.subtype,
                    "category_tags": category_tags,
                });

                Ok(json!({
                    "id": point_id(&chunk.document_hash, chunk.chunk_index),
                    "vector": embedding,
                    "payload": payload,
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, self.collection
            ))
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(connection_aware)?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let _: Value = response.json().await?;
        Ok(())
    }
}

// Deterministic point id from (document hash, chunk index), so re-runs
// upsert the same points.
fn point_id(document_hash: &str, chunk_index: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(document_hash.as_bytes());
    hasher.update(chunk_index.to_le_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[..8].try_into().unwrap_or_default())
}

fn connection_aware(error: reqwest::Error) -> StoreError {
    if error.is_connect() || error.is_timeout() {
        StoreError::Unavailable(error.to_string())
    } else {
        StoreError::Http(error)
    }
}
