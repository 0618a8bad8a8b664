//! Transcript ingestion and chunking.
//!
//! Videos arrive as JSON with timed transcript segments. Each segment becomes
//! one or more [`Fragment`]s, the indexed unit of retrieval.

use crate::error::{LecternError, Result};
use crate::fragment::{Fragment, VideoMetadata};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// A timed span of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// A video with its metadata and transcript, as read from an ingestion file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTranscript {
    pub video_id: String,
    #[serde(flatten)]
    pub metadata: VideoMetadata,
    #[serde(default)]
    pub transcript: Vec<TranscriptSegment>,
}

impl VideoTranscript {
    /// Read a JSON array of videos from `path`.
    pub fn load_file(path: &Path) -> Result<Vec<Self>> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a JSON array of videos. A single object is accepted too.
    pub fn parse(content: &str) -> Result<Vec<Self>> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let videos = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)?,
            serde_json::Value::Object(_) => vec![serde_json::from_value(value)?],
            _ => {
                return Err(LecternError::InvalidInput(
                    "Expected a JSON array of videos".to_string(),
                ))
            }
        };
        Ok(videos)
    }

    /// Fill in a missing duration from the last transcript segment.
    pub fn resolved_metadata(&self) -> VideoMetadata {
        let mut metadata = self.metadata.clone();
        if metadata.duration <= 0.0 {
            metadata.duration = self
                .transcript
                .iter()
                .map(|s| s.end)
                .fold(0.0, f64::max);
        }
        metadata
    }
}

/// Splits transcript segments into fragments of bounded length.
#[derive(Debug, Clone, Copy)]
pub struct TranscriptChunker {
    max_chars: usize,
    overlap_words: usize,
}

impl TranscriptChunker {
    pub fn new(max_chars: usize, overlap_words: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            overlap_words,
        }
    }

    /// Fragments for every non-blank segment of `video`, in transcript order.
    pub fn chunk(&self, video: &VideoTranscript) -> Vec<Fragment> {
        if video.transcript.is_empty() {
            warn!("Video {} has no transcript", video.video_id);
            return Vec::new();
        }

        let metadata = video.resolved_metadata();
        let mut fragments = Vec::new();

        for segment in &video.transcript {
            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }

            if text.chars().count() <= self.max_chars {
                fragments.push(Fragment::new(
                    &video.video_id,
                    text,
                    segment.start,
                    segment.end,
                    metadata.clone(),
                ));
                continue;
            }

            for (chunk_text, start, end) in self.split_segment(text, segment.start, segment.end) {
                fragments.push(Fragment::new(
                    &video.video_id,
                    chunk_text,
                    start,
                    end,
                    metadata.clone(),
                ));
            }
        }

        debug!(
            "Chunked video {} into {} fragments",
            video.video_id,
            fragments.len()
        );
        fragments
    }

    /// Split one long segment on word boundaries. End times are interpolated
    /// by word position; the trailing words of each chunk open the next one.
    fn split_segment(&self, text: &str, start: f64, end: f64) -> Vec<(String, f64, f64)> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let total = words.len() as f64;

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0;
        let mut fresh_words = 0;
        let mut chunk_start = start;

        for (i, word) in words.iter().copied().enumerate() {
            current.push(word);
            current_len += word.chars().count() + 1;
            fresh_words += 1;

            if current_len >= self.max_chars {
                let chunk_end = start + (end - start) * (i + 1) as f64 / total;
                chunks.push((current.join(" "), chunk_start, chunk_end));

                let keep = self.overlap_words.min(current.len());
                current.drain(..current.len() - keep);
                current_len = current.iter().map(|w| w.chars().count() + 1).sum();
                fresh_words = 0;
                chunk_start = chunk_end;
            }
        }

        // Only overlap words left means the last chunk already covered them
        if fresh_words > 0 {
            chunks.push((current.join(" "), chunk_start, end));
        }

        chunks
    }
}

impl Default for TranscriptChunker {
    fn default() -> Self {
        Self::new(500, 10)
    }
}
