//! Persistent BM25 keyword index over transcript fragments.
//!
//! The index is built once from the full fragment corpus and persisted as a
//! single JSON blob holding the ranking structure, the id list, and the
//! id-ordered fragment table. A missing or unreadable blob means "not indexed".

mod bm25;

pub use bm25::{Bm25, Bm25Params};

use crate::error::{LecternError, Result};
use crate::fragment::{Fragment, ScoredResult};
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, instrument, warn};

/// The unit persisted to disk.
#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    bm25: Bm25,
    ids: Vec<String>,
    fragments: Vec<Fragment>,
}

/// Outcome of loading the persisted index.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The blob was read and the index is ready.
    Loaded { fragments: usize },
    /// No blob exists at the configured path.
    Missing,
    /// The blob exists but could not be read or decoded.
    Corrupt(String),
}

/// Outcome of persisting the index.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved { path: PathBuf },
    Failed(String),
}

/// BM25 keyword index with on-disk persistence.
///
/// Search takes a shared lock and never mutates, so concurrent readers are
/// fine. Builds take the write lock but callers must still serialize builds
/// against the same path.
pub struct KeywordIndex {
    path: PathBuf,
    params: Bm25Params,
    snapshot: RwLock<Option<IndexSnapshot>>,
}

impl KeywordIndex {
    /// Create an empty index persisted at `path`, without touching disk.
    pub fn new(path: impl Into<PathBuf>, params: Bm25Params) -> Self {
        Self {
            path: path.into(),
            params,
            snapshot: RwLock::new(None),
        }
    }

    /// Create an index and try to load a previously persisted blob.
    pub fn open(path: impl Into<PathBuf>, params: Bm25Params) -> Self {
        let index = Self::new(path, params);
        index.load();
        index
    }

    /// Path of the persisted blob.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a built or loaded index is available.
    pub fn is_indexed(&self) -> bool {
        self.read().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Number of indexed fragments.
    pub fn len(&self) -> usize {
        self.read()
            .map(|s| s.as_ref().map_or(0, |snap| snap.ids.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the index from `fragments`, assigning `ids[i]` to `fragments[i]`,
    /// and persist it. A failed save is logged and reported in the outcome;
    /// the in-memory index stays usable.
    #[instrument(skip_all, fields(count = fragments.len()))]
    pub fn build(&self, fragments: Vec<Fragment>, ids: Vec<String>) -> Result<SaveOutcome> {
        if fragments.is_empty() || ids.is_empty() {
            return Err(LecternError::InvalidInput(
                "Fragments and ids cannot be empty".to_string(),
            ));
        }
        if fragments.len() != ids.len() {
            return Err(LecternError::InvalidInput(format!(
                "Fragments and ids must have the same length ({} vs {})",
                fragments.len(),
                ids.len()
            )));
        }

        info!("Building keyword index for {} fragments", fragments.len());

        let fragments: Vec<Fragment> = fragments
            .into_iter()
            .zip(&ids)
            .map(|(fragment, id)| fragment.with_id(id.clone()))
            .collect();

        let corpus: Vec<Vec<String>> = fragments
            .iter()
            .map(|f| tokenize(&f.searchable_text()))
            .collect();

        let snapshot = IndexSnapshot {
            bm25: Bm25::new(&corpus, self.params),
            ids,
            fragments,
        };

        let outcome = self.save(&snapshot);
        *self.write()? = Some(snapshot);

        Ok(outcome)
    }

    /// Return up to `k` fragments with positive BM25 score, best first.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredResult>> {
        let guard = self.read()?;
        let snapshot = guard.as_ref().ok_or(LecternError::NotIndexed)?;

        let tokens = tokenize(query);
        if tokens.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let scores = snapshot.bm25.scores(&tokens);
        let top = top_k_indices(&scores, k);

        let results: Vec<ScoredResult> = top
            .into_iter()
            .filter(|&idx| scores[idx] > 0.0)
            .map(|idx| ScoredResult::keyword(snapshot.fragments[idx].clone(), scores[idx] as f32))
            .collect();

        debug!("Keyword search returned {} results", results.len());
        Ok(results)
    }

    /// Try to load the persisted blob. Any failure leaves the index unbuilt.
    pub fn load(&self) -> LoadOutcome {
        let outcome = match std::fs::read(&self.path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LoadOutcome::Missing,
            Err(e) => LoadOutcome::Corrupt(e.to_string()),
            Ok(bytes) => match serde_json::from_slice::<IndexSnapshot>(&bytes) {
                Ok(snapshot) if snapshot.ids.len() == snapshot.fragments.len()
                    && snapshot.ids.len() == snapshot.bm25.len() =>
                {
                    let count = snapshot.ids.len();
                    match self.write() {
                        Ok(mut guard) => {
                            *guard = Some(snapshot);
                            LoadOutcome::Loaded { fragments: count }
                        }
                        Err(e) => LoadOutcome::Corrupt(e.to_string()),
                    }
                }
                Ok(_) => LoadOutcome::Corrupt("inconsistent index tables".to_string()),
                Err(e) => LoadOutcome::Corrupt(e.to_string()),
            },
        };

        match &outcome {
            LoadOutcome::Loaded { fragments } => {
                info!("Keyword index loaded from {:?} ({} fragments)", self.path, fragments)
            }
            LoadOutcome::Missing => debug!("No keyword index at {:?}", self.path),
            LoadOutcome::Corrupt(reason) => {
                warn!("Could not load keyword index from {:?}: {}", self.path, reason);
                if let Ok(mut guard) = self.write() {
                    *guard = None;
                }
            }
        }

        outcome
    }

    /// Drop the in-memory index and remove the persisted blob.
    pub fn clear(&self) -> Result<()> {
        *self.write()? = None;

        if self.path.exists() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => info!("Keyword index file removed: {:?}", self.path),
                Err(e) => warn!("Could not remove keyword index file {:?}: {}", self.path, e),
            }
        }

        Ok(())
    }

    fn save(&self, snapshot: &IndexSnapshot) -> SaveOutcome {
        let result = (|| -> Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let bytes = serde_json::to_vec(snapshot)?;
            std::fs::write(&self.path, bytes)?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                info!("Keyword index saved to {:?}", self.path);
                SaveOutcome::Saved {
                    path: self.path.clone(),
                }
            }
            Err(e) => {
                warn!("Could not save keyword index to {:?}: {}", self.path, e);
                SaveOutcome::Failed(e.to_string())
            }
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Option<IndexSnapshot>>> {
        self.snapshot
            .read()
            .map_err(|e| LecternError::KeywordIndex(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Option<IndexSnapshot>>> {
        self.snapshot
            .write()
            .map_err(|e| LecternError::KeywordIndex(format!("Failed to acquire lock: {}", e)))
    }
}

/// Descending by score, ascending by corpus position on ties.
fn rank(scores: &[f64], a: usize, b: usize) -> Ordering {
    scores[b].total_cmp(&scores[a]).then(a.cmp(&b))
}

/// Indices of the `k` best scores, sorted best first.
///
/// Uses a partial selection so only the selected subset gets sorted.
fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    if k < indices.len() {
        indices.select_nth_unstable_by(k - 1, |&a, &b| rank(scores, a, b));
        indices.truncate(k);
    }
    indices.sort_by(|&a, &b| rank(scores, a, b));
    indices
}
