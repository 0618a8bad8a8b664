//! Lectern - hybrid search over video lecture transcripts
//!
//! Lectern indexes time-coded transcript fragments of video lectures and
//! answers queries with merged, context-expanded clips.
//!
//! # Overview
//!
//! A query flows through:
//! - `query` - abbreviation and synonym expansion for keyword recall
//! - `keyword` - a persisted BM25 index over fragment titles and text
//! - `vector_store` / `embedding` - semantic retrieval by cosine similarity
//! - `fusion` - min-max normalization, weighted combination and metadata boosts
//! - `clips` - per-video merging, context expansion and position re-scoring
//!
//! The `orchestrator` wires these together once and also runs indexing:
//! transcripts are chunked (`chunking`), embedded, stored, and the keyword
//! index is rebuilt from the stored corpus so both sources share ids.
//!
//! # Example
//!
//! ```rust,no_run
//! use lectern::config::Settings;
//! use lectern::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     for clip in orchestrator.search("binary search tree", 5).await? {
//!         println!("{} @ {}: {}", clip.video.title, clip.format_timestamp(), clip.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod clips;
pub mod config;
pub mod embedding;
pub mod error;
pub mod fragment;
pub mod fusion;
pub mod keyword;
pub mod openai;
pub mod orchestrator;
pub mod query;
pub mod tokenizer;
pub mod vector_store;

pub use error::{LecternError, Result};
