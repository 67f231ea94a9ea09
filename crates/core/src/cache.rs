use crate::chunking::normalize_whitespace;
use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

// Rough per-entry overhead on top of the vector payload.
const ENTRY_OVERHEAD_BYTES: u64 = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub vector: Vec<f32>,
    pub bytes: u64,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    access_seq: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    clock: u64,
}

/// Content-addressed store of embedding vectors, shared across workers.
/// Loaded once at startup, flushed at shutdown; every in-between write
/// touches only keys derived from the caller's own text.
#[derive(Clone)]
pub struct EmbeddingCache {
    path: PathBuf,
    budget_bytes: u64,
    state: Arc<Mutex<CacheState>>,
}

impl EmbeddingCache {
    pub fn new(path: impl Into<PathBuf>, budget_bytes: u64) -> Self {
        Self {
            path: path.into(),
            budget_bytes,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cache_key(text: &str, model_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalize_whitespace(text).as_bytes());
        hasher.update([0x1f]);
        hasher.update(model_id.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub async fn load(&self) -> Result<(), PipelineError> {
        if !self.path.exists() {
            return Ok(());
        }

        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "cache file unreadable, starting empty");
                return Ok(());
            }
        };

        // A corrupt file or a corrupt entry is just a miss.
        let parsed: HashMap<String, serde_json::Value> = match serde_json::from_str(&data) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "cache file corrupt, starting empty");
                return Ok(());
            }
        };

        let mut guard = self.state.lock().await;
        guard.entries.clear();
        for (key, value) in parsed {
            match serde_json::from_value::<CacheEntry>(value) {
                Ok(entry) => {
                    guard.entries.insert(key, entry);
                }
                Err(error) => {
                    warn!(key = %key, %error, "dropping corrupt cache entry");
                }
            }
        }
        guard.clock = guard
            .entries
            .values()
            .map(|entry| entry.access_seq)
            .max()
            .unwrap_or(0);

        Ok(())
    }

    pub async fn flush(&self) -> Result<(), PipelineError> {
        let guard = self.state.lock().await;
        let serialized = serde_json::to_string(&guard.entries)?;
        drop(guard);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&self.path, serialized).await?;
        Ok(())
    }

    pub async fn get(&self, text: &str, model_id: &str) -> Option<Vec<f32>> {
        let key = Self::cache_key(text, model_id);
        let mut guard = self.state.lock().await;
        guard.clock += 1;
        let clock = guard.clock;

        let entry = guard.entries.get_mut(&key)?;
        entry.last_access = Utc::now();
        entry.access_seq = clock;
        Some(entry.vector.clone())
    }

    pub async fn set(&self, text: &str, model_id: &str, vector: Vec<f32>) {
        let key = Self::cache_key(text, model_id);
        let bytes = vector.len() as u64 * 4 + ENTRY_OVERHEAD_BYTES;
        let now = Utc::now();

        let mut guard = self.state.lock().await;
        guard.clock += 1;
        let entry = CacheEntry {
            vector,
            bytes,
            created_at: now,
            last_access: now,
            access_seq: guard.clock,
        };
        guard.entries.insert(key, entry);

        let total: u64 = guard.entries.values().map(|entry| entry.bytes).sum();
        if total > self.budget_bytes {
            evict_oldest_fifth(&mut guard.entries);
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// Oldest-access-first, about a fifth of the entries at a time.
fn evict_oldest_fifth(entries: &mut HashMap<String, CacheEntry>) {
    let evict_count = entries.len().div_ceil(5);
    let mut ranked: Vec<(String, u64)> = entries
        .iter()
        .map(|(key, entry)| (key.clone(), entry.access_seq))
        .collect();
    ranked.sort_by_key(|(_, seq)| *seq);

    for (key, _) in ranked.into_iter().take(evict_count) {
        entries.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::EmbeddingCache;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trip_returns_identical_vector() {
        let dir = tempdir().expect("tempdir");
        let cache = EmbeddingCache::new(dir.path().join("cache.json"), 1024 * 1024);

        let vector = vec![0.25f32, -0.5, 1.0];
        cache.set("text", "model-x", vector.clone()).await;

        let resolved = cache.get("text", "model-x").await.expect("cached vector");
        assert_eq!(resolved, vector);
        assert!(cache.get("text", "model-y").await.is_none());
    }

    #[tokio::test]
    async fn eviction_removes_least_recently_accessed() {
        let dir = tempdir().expect("tempdir");
        // Three ~80-byte entries fit, the fourth forces eviction.
        let cache = EmbeddingCache::new(dir.path().join("cache.json"), 300);

        cache.set("first", "m", vec![1.0; 4]).await;
        cache.set("second", "m", vec![2.0; 4]).await;
        cache.set("third", "m", vec![3.0; 4]).await;

        // Touch the oldest entry so "second" becomes the eviction victim.
        assert!(cache.get("first", "m").await.is_some());

        cache.set("fourth", "m", vec![4.0; 4]).await;

        assert!(cache.get("second", "m").await.is_none());
        assert!(cache.get("first", "m").await.is_some());
        assert!(cache.get("third", "m").await.is_some());
        assert!(cache.get("fourth", "m").await.is_some());
    }

    #[tokio::test]
    async fn state_survives_flush_and_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");

        let cache = EmbeddingCache::new(&path, 1024 * 1024);
        cache.set("persisted", "m", vec![0.5f32; 8]).await;
        cache.flush().await.expect("flush");

        let reloaded = EmbeddingCache::new(&path, 1024 * 1024);
        reloaded.load().await.expect("load");
        assert_eq!(
            reloaded.get("persisted", "m").await,
            Some(vec![0.5f32; 8])
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_empty() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"{not valid json").expect("write");

        let cache = EmbeddingCache::new(&path, 1024);
        cache.load().await.expect("load should not fail");
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn identical_text_maps_to_one_key() {
        let key_a = EmbeddingCache::cache_key("  some   text ", "m");
        let key_b = EmbeddingCache::cache_key("some text", "m");
        assert_eq!(key_a, key_b);

        let other_model = EmbeddingCache::cache_key("some text", "n");
        assert_ne!(key_a, other_model);
    }
}
