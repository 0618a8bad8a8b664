//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{rank_by_similarity, summarize_videos, IndexedVideo, StoredFragment, VectorStore};
use crate::error::{LecternError, Result};
use crate::fragment::{Fragment, ScoredResult};
use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store. Keeps insertion order.
pub struct MemoryVectorStore {
    fragments: RwLock<Vec<StoredFragment>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            fragments: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<StoredFragment>>> {
        self.fragments
            .read()
            .map_err(|e| LecternError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<StoredFragment>>> {
        self.fragments
            .write()
            .map_err(|e| LecternError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, fragments: &[StoredFragment]) -> Result<usize> {
        let mut store = self.write()?;
        for stored in fragments {
            match store.iter_mut().find(|s| s.id == stored.id) {
                Some(existing) => *existing = stored.clone(),
                None => store.push(stored.clone()),
            }
        }
        Ok(fragments.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredResult>> {
        let store = self.read()?;
        Ok(rank_by_similarity(store.iter(), query_embedding, limit))
    }

    async fn delete_by_video_id(&self, video_id: &str) -> Result<usize> {
        let mut store = self.write()?;
        let initial_len = store.len();
        store.retain(|s| s.fragment.video_id != video_id);
        Ok(initial_len - store.len())
    }

    async fn list_videos(&self) -> Result<Vec<IndexedVideo>> {
        let store = self.read()?;
        Ok(summarize_videos(store.iter()))
    }

    async fn all_fragments(&self) -> Result<Vec<Fragment>> {
        let store = self.read()?;
        Ok(store.iter().map(|s| s.fragment.clone()).collect())
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}
