//! Configuration module for Lectern.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    ChunkingSettings, ClipSettings, EmbeddingSettings, FusionSettings, GeneralSettings,
    KeywordIndexSettings, SearchSettings, Settings, VectorStoreSettings,
};
