//! Composition root for Lectern.
//!
//! Builds the keyword index, preprocessor, fusion, clip merger and the
//! embedding/vector collaborators once, and runs the search and indexing
//! flows on top of them.

use crate::chunking::{TranscriptChunker, VideoTranscript};
use crate::clips::{Clip, ClipMerger};
use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{LecternError, Result};
use crate::fusion::{FusedResult, ResultFusion, SourceOutcome};
use crate::keyword::{KeywordIndex, SaveOutcome};
use crate::query::QueryPreprocessor;
use crate::vector_store::{
    IndexedVideo, MemoryVectorStore, SqliteVectorStore, StoredFragment, VectorStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Summary of an indexing run.
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub videos_indexed: usize,
    /// Video ids skipped for having no usable transcript.
    pub videos_skipped: Vec<String>,
    pub fragments_indexed: usize,
    /// Persistence outcome of the keyword rebuild, `None` if it was cleared.
    pub keyword_index: Option<SaveOutcome>,
}

/// The main orchestrator for Lectern.
pub struct Orchestrator {
    settings: Settings,
    keyword_index: Arc<KeywordIndex>,
    preprocessor: QueryPreprocessor,
    fusion: ResultFusion,
    merger: ClipMerger,
    chunker: TranscriptChunker,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    /// Serializes keyword index builds.
    index_lock: Mutex<()>,
}

impl Orchestrator {
    /// Create an orchestrator from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let keyword_index = Arc::new(KeywordIndex::open(
            settings.keyword_index_path(),
            settings.keyword_index.params(),
        ));

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
            Duration::from_secs(settings.embedding.timeout_seconds),
        )?);

        let vector_store: Arc<dyn VectorStore> = match settings.vector_store.provider.as_str() {
            "sqlite" => Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?),
            "memory" => Arc::new(MemoryVectorStore::new()),
            other => {
                return Err(LecternError::Config(format!(
                    "Unknown vector store provider: {}",
                    other
                )))
            }
        };

        Ok(Self::with_components(
            settings,
            keyword_index,
            embedder,
            vector_store,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        keyword_index: Arc<KeywordIndex>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        let fusion =
            ResultFusion::new(settings.fusion.weights()).with_boosts(settings.fusion.boosts());
        let merger = ClipMerger::new(settings.clips.config());
        let chunker =
            TranscriptChunker::new(settings.chunking.max_chars, settings.chunking.overlap_words);

        Self {
            settings,
            keyword_index,
            preprocessor: QueryPreprocessor::new(),
            fusion,
            merger,
            chunker,
            embedder,
            vector_store,
            index_lock: Mutex::new(()),
        }
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn keyword_index(&self) -> Arc<KeywordIndex> {
        self.keyword_index.clone()
    }

    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    /// Search for the `top_k` best clips for `query`.
    ///
    /// Keyword and vector retrieval run concurrently. Either may fail on its
    /// own; the query only comes back empty when neither yields anything.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Clip>> {
        if top_k == 0 {
            return Err(LecternError::InvalidInput(
                "top_k must be at least 1".to_string(),
            ));
        }

        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self.settings.search.candidate_count(top_k);
        let expanded = self.preprocessor.preprocess(query);
        debug!("Expanded query: {}", expanded);

        let (keyword, vector) = tokio::join!(
            async { SourceOutcome::from(self.keyword_index.search(&expanded, candidates)) },
            self.vector_search(query, candidates),
        );

        let fused = self.fusion.merge(keyword, vector, query);
        let durations = video_durations(&fused);

        let mut clips = self.merger.merge(&fused, &durations);
        clips.truncate(top_k);

        info!("Returning {} clips", clips.len());
        Ok(clips)
    }

    async fn vector_search(&self, query: &str, limit: usize) -> SourceOutcome {
        let embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => return SourceOutcome::Failed(e.to_string()),
        };
        self.vector_store.search(&embedding, limit).await.into()
    }

    /// Chunk, embed and store `videos`, replacing their previous fragments,
    /// then rebuild the keyword index from the full corpus.
    #[instrument(skip_all, fields(videos = videos.len()))]
    pub async fn index_videos(&self, videos: &[VideoTranscript]) -> Result<IndexReport> {
        let _guard = self.index_lock.lock().await;

        let mut batches: Vec<(&str, Vec<_>)> = Vec::new();
        let mut videos_skipped = Vec::new();

        for video in videos {
            let fragments = self.chunker.chunk(video);
            if fragments.is_empty() {
                warn!("Skipping video {}: no transcript text", video.video_id);
                videos_skipped.push(video.video_id.clone());
            } else {
                batches.push((video.video_id.as_str(), fragments));
            }
        }

        if batches.is_empty() {
            return Err(LecternError::InvalidInput(
                "No transcript fragments to index".to_string(),
            ));
        }

        // Embed everything before the store is touched, so an embedding
        // failure leaves both indexes as they were.
        let mut prepared: Vec<(&str, Vec<StoredFragment>)> = Vec::with_capacity(batches.len());
        for (video_id, fragments) in &batches {
            let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != fragments.len() {
                return Err(LecternError::Embedding(format!(
                    "Expected {} embeddings for video {}, got {}",
                    fragments.len(),
                    video_id,
                    embeddings.len()
                )));
            }

            let stored = fragments
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(fragment, embedding)| StoredFragment::new(fragment, embedding))
                .collect();
            prepared.push((*video_id, stored));
        }

        // The keyword index must follow the store even after a partial write.
        let fragments_indexed = match self.store_batches(&prepared).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Vector store write failed, resyncing keyword index: {}", e);
                if let Err(rebuild) = self.rebuild_locked().await {
                    warn!("Keyword index resync failed: {}", rebuild);
                }
                return Err(e);
            }
        };

        let keyword_index = self.rebuild_locked().await?;

        Ok(IndexReport {
            videos_indexed: batches.len(),
            videos_skipped,
            fragments_indexed,
            keyword_index,
        })
    }

    async fn store_batches(&self, prepared: &[(&str, Vec<StoredFragment>)]) -> Result<usize> {
        let mut fragments_indexed = 0;
        for (video_id, stored) in prepared {
            let replaced = self.vector_store.delete_by_video_id(video_id).await?;
            if replaced > 0 {
                debug!("Replaced {} fragments of video {}", replaced, video_id);
            }
            fragments_indexed += self.vector_store.upsert_batch(stored).await?;
            info!("Indexed {} fragments for video {}", stored.len(), video_id);
        }
        Ok(fragments_indexed)
    }

    /// Rebuild the keyword index from the vector store's corpus.
    /// Returns `None` when the corpus is empty and the index was cleared.
    pub async fn rebuild_keyword_index(&self) -> Result<Option<SaveOutcome>> {
        let _guard = self.index_lock.lock().await;
        self.rebuild_locked().await
    }

    async fn rebuild_locked(&self) -> Result<Option<SaveOutcome>> {
        let fragments = self.vector_store.all_fragments().await?;
        if fragments.is_empty() {
            info!("Corpus is empty, clearing keyword index");
            self.keyword_index.clear()?;
            return Ok(None);
        }

        let ids: Vec<String> = fragments
            .iter()
            .map(|f| f.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()))
            .collect();

        let outcome = self.keyword_index.build(fragments, ids)?;
        Ok(Some(outcome))
    }

    /// List all indexed videos.
    pub async fn list_videos(&self) -> Result<Vec<IndexedVideo>> {
        self.vector_store.list_videos().await
    }

    /// Remove a video's fragments and rebuild the keyword index.
    /// Returns the number of fragments removed.
    #[instrument(skip(self))]
    pub async fn remove_video(&self, video_id: &str) -> Result<usize> {
        let _guard = self.index_lock.lock().await;

        let removed = self.vector_store.delete_by_video_id(video_id).await?;
        if removed == 0 {
            return Ok(0);
        }

        self.rebuild_locked().await?;
        Ok(removed)
    }
}

/// Known video durations among the fused candidates.
fn video_durations(results: &[FusedResult]) -> HashMap<String, f64> {
    let mut durations = HashMap::new();
    for result in results {
        if let Some(duration) = result.fragment.video.known_duration() {
            durations
                .entry(result.fragment.video_id.clone())
                .or_insert(duration);
        }
    }
    durations
}
