//! Indexed transcript fragments and their video-level metadata.

use serde::{Deserialize, Serialize};

/// Video-level metadata carried by every fragment of a video.
///
/// Missing values deserialize to empty strings and zeros, so an absent field
/// and an empty one are treated the same everywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoMetadata {
    pub title: String,
    pub url: String,
    pub description: String,
    /// Total video duration in seconds (0 when unknown).
    pub duration: f64,
    pub view_count: u64,
    pub channel: String,
    pub channel_id: String,
    pub thumbnail: String,
    pub like_count: u64,
}

impl VideoMetadata {
    /// Known video duration, if any.
    pub fn known_duration(&self) -> Option<f64> {
        (self.duration > 0.0).then_some(self.duration)
    }

    /// Overlay `preferred` on top of `self`: every non-empty field of
    /// `preferred` wins, empty ones fall back to the current value.
    pub fn overlay(&mut self, preferred: &VideoMetadata) {
        fn pick(current: &mut String, preferred: &str) {
            if !preferred.is_empty() {
                *current = preferred.to_string();
            }
        }

        pick(&mut self.title, &preferred.title);
        pick(&mut self.url, &preferred.url);
        pick(&mut self.description, &preferred.description);
        pick(&mut self.channel, &preferred.channel);
        pick(&mut self.channel_id, &preferred.channel_id);
        pick(&mut self.thumbnail, &preferred.thumbnail);
        if preferred.duration > 0.0 {
            self.duration = preferred.duration;
        }
        if preferred.view_count > 0 {
            self.view_count = preferred.view_count;
        }
        if preferred.like_count > 0 {
            self.like_count = preferred.like_count;
        }
    }
}

/// A time-bounded transcript unit: the indexed unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Explicit id assigned at index time (shared by keyword and vector stores).
    #[serde(default)]
    pub id: Option<String>,
    pub video_id: String,
    pub text: String,
    /// Start offset in seconds.
    pub start: f64,
    /// End offset in seconds.
    pub end: f64,
    #[serde(default)]
    pub video: VideoMetadata,
}

impl Fragment {
    /// Create a fragment without an explicit id.
    pub fn new(
        video_id: impl Into<String>,
        text: impl Into<String>,
        start: f64,
        end: f64,
        video: VideoMetadata,
    ) -> Self {
        Self {
            id: None,
            video_id: video_id.into(),
            text: text.into(),
            start,
            end,
            video,
        }
    }

    /// Set the explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Identity used to merge the same fragment surfaced by different sources.
    pub fn key(&self) -> FragmentKey {
        match &self.id {
            Some(id) if !id.is_empty() => FragmentKey::Id(id.clone()),
            _ => FragmentKey::Span {
                video_id: self.video_id.clone(),
                start_centis: to_centis(self.start),
                end_centis: to_centis(self.end),
            },
        }
    }

    /// Text used for keyword indexing: title followed by the fragment text.
    pub fn searchable_text(&self) -> String {
        if self.video.title.is_empty() {
            self.text.clone()
        } else {
            format!("{} {}", self.video.title, self.text)
        }
    }

    /// Format the start offset for display.
    pub fn format_timestamp(&self) -> String {
        format_timestamp(self.start)
    }
}

/// Which retrieval source surfaced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Keyword,
    Vector,
    Both,
}

/// A fragment with the raw relevance score from one retrieval source.
#[derive(Debug, Clone)]
pub struct ScoredResult {
    pub fragment: Fragment,
    /// Raw score (BM25 for keyword results, cosine similarity for vector results).
    pub score: f32,
    pub source: ResultSource,
}

impl ScoredResult {
    pub fn keyword(fragment: Fragment, score: f32) -> Self {
        Self {
            fragment,
            score,
            source: ResultSource::Keyword,
        }
    }

    pub fn vector(fragment: Fragment, score: f32) -> Self {
        Self {
            fragment,
            score,
            source: ResultSource::Vector,
        }
    }
}

/// Fragment identity: explicit id, or video plus times rounded to hundredths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FragmentKey {
    Id(String),
    Span {
        video_id: String,
        start_centis: i64,
        end_centis: i64,
    },
}

fn to_centis(seconds: f64) -> i64 {
    (seconds * 100.0).round() as i64
}

/// Format seconds as `MM:SS` or `HH:MM:SS`.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefers_explicit_id() {
        let a = Fragment::new("v1", "text", 1.0, 2.0, VideoMetadata::default()).with_id("abc");
        let b = Fragment::new("v2", "other", 9.0, 12.0, VideoMetadata::default()).with_id("abc");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_rounds_times_to_hundredths() {
        let a = Fragment::new("v1", "x", 1.004, 2.0, VideoMetadata::default());
        let b = Fragment::new("v1", "y", 1.0, 2.001, VideoMetadata::default());
        let c = Fragment::new("v1", "z", 1.02, 2.0, VideoMetadata::default());
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_overlay_keeps_existing_when_preferred_is_empty() {
        let mut base = VideoMetadata {
            title: "Keyword title".to_string(),
            description: "Keyword description".to_string(),
            view_count: 10,
            ..Default::default()
        };
        let preferred = VideoMetadata {
            title: "Vector title".to_string(),
            ..Default::default()
        };
        base.overlay(&preferred);
        assert_eq!(base.title, "Vector title");
        assert_eq!(base.description, "Keyword description");
        assert_eq!(base.view_count, 10);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(125.0), "02:05");
        assert_eq!(format_timestamp(3725.0), "01:02:05");
    }
}
