//! Configuration settings for Lectern.

use crate::clips::ClipConfig;
use crate::error::{LecternError, Result};
use crate::fusion::{
    BoostWeights, FusionWeights, DESCRIPTION_BOOST, POPULARITY_BOOST, TEXT_START_BOOST,
    TITLE_BOOST,
};
use crate::keyword::Bm25Params;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub keyword_index: KeywordIndexSettings,
    pub fusion: FusionSettings,
    pub clips: ClipSettings,
    pub search: SearchSettings,
    pub chunking: ChunkingSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.lectern".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            timeout_seconds: crate::openai::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.lectern/vectors.db".to_string(),
        }
    }
}

/// Keyword index location and BM25 parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordIndexSettings {
    /// Path of the persisted index.
    pub path: String,
    pub k1: f64,
    pub b: f64,
    pub epsilon: f64,
}

impl Default for KeywordIndexSettings {
    fn default() -> Self {
        let params = Bm25Params::default();
        Self {
            path: "~/.lectern/keyword_index.json".to_string(),
            k1: params.k1,
            b: params.b,
            epsilon: params.epsilon,
        }
    }
}

impl KeywordIndexSettings {
    pub fn params(&self) -> Bm25Params {
        Bm25Params {
            k1: self.k1,
            b: self.b,
            epsilon: self.epsilon,
        }
    }
}

/// Source weights and metadata boosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    pub bm25_weight: f32,
    pub semantic_weight: f32,
    pub title_boost: f32,
    pub description_boost: f32,
    pub text_start_boost: f32,
    pub popularity_boost: f32,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            bm25_weight: 0.4,
            semantic_weight: 0.6,
            title_boost: TITLE_BOOST,
            description_boost: DESCRIPTION_BOOST,
            text_start_boost: TEXT_START_BOOST,
            popularity_boost: POPULARITY_BOOST,
        }
    }
}

impl FusionSettings {
    /// Normalized source weights.
    pub fn weights(&self) -> FusionWeights {
        FusionWeights::new(self.bm25_weight, self.semantic_weight)
    }

    /// Boost increments. Negative values are clamped to zero.
    pub fn boosts(&self) -> BoostWeights {
        BoostWeights {
            title: self.title_boost.max(0.0),
            description: self.description_boost.max(0.0),
            text_start: self.text_start_boost.max(0.0),
            popularity: self.popularity_boost.max(0.0),
        }
    }
}

/// Clip merging settings, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipSettings {
    pub merge_threshold_seconds: f64,
    pub min_clip_duration_seconds: f64,
    pub context_before_seconds: f64,
    pub context_after_seconds: f64,
}

impl Default for ClipSettings {
    fn default() -> Self {
        let config = ClipConfig::default();
        Self {
            merge_threshold_seconds: config.merge_threshold,
            min_clip_duration_seconds: config.min_duration,
            context_before_seconds: config.context_before,
            context_after_seconds: config.context_after,
        }
    }
}

impl ClipSettings {
    pub fn config(&self) -> ClipConfig {
        ClipConfig {
            merge_threshold: self.merge_threshold_seconds.max(0.0),
            min_duration: self.min_clip_duration_seconds.max(0.0),
            context_before: self.context_before_seconds.max(0.0),
            context_after: self.context_after_seconds.max(0.0),
        }
    }
}

/// Candidate retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Candidates fetched per source, as a multiple of top_k.
    pub candidate_multiplier: usize,
    /// Minimum candidates fetched per source.
    pub min_candidates: usize,
    /// Result count when the caller does not specify one.
    pub default_top_k: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            candidate_multiplier: 3,
            min_candidates: 20,
            default_top_k: 5,
        }
    }
}

impl SearchSettings {
    /// Candidates to request from each source for `top_k` results.
    pub fn candidate_count(&self, top_k: usize) -> usize {
        top_k
            .saturating_mul(self.candidate_multiplier)
            .max(self.min_candidates)
            .max(top_k)
    }
}

/// Transcript chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum characters per fragment.
    pub max_chars: usize,
    /// Words carried over between split chunks.
    pub overlap_words: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chars: 500,
            overlap_words: 10,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render settings as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LecternError::Config(e.to_string()))
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lectern")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    /// Get the expanded keyword index path.
    pub fn keyword_index_path(&self) -> PathBuf {
        Self::expand_path(&self.keyword_index.path)
    }
}
