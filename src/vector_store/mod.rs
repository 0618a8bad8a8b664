//! Vector store abstraction for Lectern.
//!
//! Provides a trait-based interface for different vector database backends.
//! The store doubles as the fragment corpus provider: the keyword index is
//! rebuilt from `all_fragments` so both sources share fragment ids.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::Result;
use crate::fragment::{Fragment, ScoredResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fragment stored with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFragment {
    /// Unique fragment ID, shared with the keyword index.
    pub id: String,
    pub fragment: Fragment,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this fragment was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl StoredFragment {
    /// Assign a fresh id to `fragment` and wrap it with its embedding.
    pub fn new(fragment: Fragment, embedding: Vec<f32>) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            fragment: fragment.with_id(id.clone()),
            id,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// Summary information about an indexed video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedVideo {
    pub video_id: String,
    pub title: String,
    /// Number of indexed fragments.
    pub fragment_count: u32,
    /// Known duration, or the end of the last fragment.
    pub duration_seconds: f64,
    /// When the video was last indexed.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Bulk upsert fragments.
    async fn upsert_batch(&self, fragments: &[StoredFragment]) -> Result<usize>;

    /// Top `limit` fragments by cosine similarity, best first.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredResult>>;

    /// Delete fragments by video ID.
    async fn delete_by_video_id(&self, video_id: &str) -> Result<usize>;

    /// List all indexed videos.
    async fn list_videos(&self) -> Result<Vec<IndexedVideo>>;

    /// Every stored fragment (with its id set), in a stable order.
    async fn all_fragments(&self) -> Result<Vec<Fragment>>;

    /// Get total fragment count.
    async fn document_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Rank stored fragments against a query embedding.
pub(crate) fn rank_by_similarity<'a>(
    candidates: impl Iterator<Item = &'a StoredFragment>,
    query_embedding: &[f32],
    limit: usize,
) -> Vec<ScoredResult> {
    let mut results: Vec<ScoredResult> = candidates
        .map(|stored| {
            ScoredResult::vector(
                stored.fragment.clone(),
                cosine_similarity(query_embedding, &stored.embedding),
            )
        })
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(limit);
    results
}

/// Summarize fragments per video, most recently indexed first.
pub(crate) fn summarize_videos<'a>(
    fragments: impl Iterator<Item = &'a StoredFragment>,
) -> Vec<IndexedVideo> {
    let mut videos: Vec<IndexedVideo> = Vec::new();

    for stored in fragments {
        let fragment = &stored.fragment;
        let position = videos.iter().position(|v| v.video_id == fragment.video_id);
        let entry = match position {
            Some(pos) => &mut videos[pos],
            None => {
                videos.push(IndexedVideo {
                    video_id: fragment.video_id.clone(),
                    title: fragment.video.title.clone(),
                    fragment_count: 0,
                    duration_seconds: fragment.video.duration,
                    indexed_at: stored.indexed_at,
                });
                let last = videos.len() - 1;
                &mut videos[last]
            }
        };

        entry.fragment_count += 1;
        if fragment.end > entry.duration_seconds {
            entry.duration_seconds = fragment.end;
        }
        if stored.indexed_at > entry.indexed_at {
            entry.indexed_at = stored.indexed_at;
            entry.title = fragment.video.title.clone();
        }
    }

    videos.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
    videos
}
