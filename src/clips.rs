//! Merging fused fragment hits into temporally coherent clips.
//!
//! Hits from the same video that lie close together are merged into one clip,
//! the clip is widened with surrounding context and padded to a minimum
//! duration, and its score is adjusted by where it sits in the video.

use crate::fragment::{format_timestamp, VideoMetadata};
use crate::fusion::FusedResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Share of a duration deficit recovered by moving the start backward.
pub const BACKWARD_EXPANSION_SHARE: f64 = 0.6;
/// Maximum number of distinct fragment texts joined into a clip.
pub const MAX_CLIP_TEXTS: usize = 3;
/// Maximum characters of joined clip text before truncation.
pub const MAX_CLIP_TEXT_CHARS: usize = 500;
/// Texts this short (after trimming) are dropped from clip text.
pub const MIN_TEXT_CHARS: usize = 10;

/// Score multiplier for clips whose text reads like a conclusion.
pub const CONCLUSION_PENALTY: f32 = 0.3;
/// Multiplier for clips centered in the last 15% of the video.
pub const OUTRO_MULTIPLIER: f32 = 0.4;
/// Multiplier for clips centered between 75% and 85% of the video.
pub const LATE_MULTIPLIER: f32 = 0.7;
/// Multiplier for clips centered in the first 5% of the video.
pub const INTRO_MULTIPLIER: f32 = 0.85;
/// Multiplier for clips centered between 5% and 75% of the video.
pub const BODY_MULTIPLIER: f32 = 1.15;

const CONCLUSION_PHRASES: &[&str] = &[
    "hope you have understood",
    "hope you understood",
    "that's all",
    "thank you for watching",
    "see you in the next",
    "in the next video",
    "subscribe",
    "like and subscribe",
    "this is how",
    "this is the end",
    "conclusion",
    "summary",
    "wrap up",
    "wrap-up",
];

/// Clip shaping parameters, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipConfig {
    /// Maximum gap between hits that still merges them.
    pub merge_threshold: f64,
    /// Minimum clip duration after finalization.
    pub min_duration: f64,
    /// Context added before the first hit.
    pub context_before: f64,
    /// Context added after the last hit.
    pub context_after: f64,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            merge_threshold: 30.0,
            min_duration: 10.0,
            context_before: 5.0,
            context_after: 5.0,
        }
    }
}

/// A merged, context-expanded search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub video_id: String,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub score: f32,
    #[serde(flatten)]
    pub video: VideoMetadata,
    /// Whether the clip text reads like a closing remark.
    #[serde(skip)]
    pub is_conclusion: bool,
}

impl Clip {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Format the start offset for display.
    pub fn format_timestamp(&self) -> String {
        format_timestamp(self.start)
    }

    /// Link to the clip start when the video URL is known.
    pub fn timestamped_url(&self) -> Option<String> {
        if self.video.url.is_empty() {
            return None;
        }
        let separator = if self.video.url.contains('?') { '&' } else { '?' };
        Some(format!(
            "{}{}t={}s",
            self.video.url, separator, self.start as u64
        ))
    }
}

/// A clip still collecting hits.
#[derive(Debug)]
struct PendingClip {
    video_id: String,
    start: f64,
    end: f64,
    /// Score of the hit whose metadata the clip currently carries.
    lead_score: f32,
    video: VideoMetadata,
    texts: Vec<String>,
    scores: Vec<f32>,
}

impl PendingClip {
    fn seed(result: &FusedResult) -> Self {
        Self {
            video_id: result.fragment.video_id.clone(),
            start: result.fragment.start,
            end: result.fragment.end,
            lead_score: result.combined_score,
            video: result.fragment.video.clone(),
            texts: vec![result.fragment.text.clone()],
            scores: vec![result.combined_score],
        }
    }

    fn absorb(&mut self, result: &FusedResult) {
        self.end = self.end.max(result.fragment.end);

        let text = &result.fragment.text;
        if !text.trim().is_empty() && !self.contains_text(text) {
            self.texts.push(text.clone());
        }

        self.scores.push(result.combined_score);

        if result.combined_score > self.lead_score {
            self.lead_score = result.combined_score;
            self.video.overlay(&result.fragment.video);
        }
    }

    /// Case- and whitespace-insensitive containment in any collected text.
    fn contains_text(&self, text: &str) -> bool {
        let needle = normalize_text(text);
        self.texts
            .iter()
            .any(|existing| normalize_text(existing).contains(&needle))
    }
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Groups fused hits per video and turns them into clips.
#[derive(Debug, Clone, Default)]
pub struct ClipMerger {
    config: ClipConfig,
}

impl ClipMerger {
    pub fn new(config: ClipConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClipConfig {
        &self.config
    }

    /// Merge `results` into clips, re-score them by position, and sort best
    /// first. `video_durations` maps video ids to known durations.
    pub fn merge(
        &self,
        results: &[FusedResult],
        video_durations: &HashMap<String, f64>,
    ) -> Vec<Clip> {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<&FusedResult>> = HashMap::new();
        for result in results {
            let video_id = result.fragment.video_id.as_str();
            groups
                .entry(video_id)
                .or_insert_with(|| {
                    order.push(video_id);
                    Vec::new()
                })
                .push(result);
        }

        let mut clips = Vec::new();
        for video_id in order {
            let Some(mut group) = groups.remove(video_id) else {
                continue;
            };
            group.sort_by(|a, b| a.fragment.start.total_cmp(&b.fragment.start));
            let duration = video_durations.get(video_id).copied().filter(|d| *d > 0.0);
            self.merge_video(&group, duration, &mut clips);
        }

        for clip in &mut clips {
            let duration = video_durations.get(&clip.video_id).copied();
            clip.score = rescore_position(clip, duration);
        }

        clips.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!("Merged {} hits into {} clips", results.len(), clips.len());
        clips
    }

    fn merge_video(&self, group: &[&FusedResult], duration: Option<f64>, out: &mut Vec<Clip>) {
        let Some((first, rest)) = group.split_first() else {
            return;
        };

        let mut current = PendingClip::seed(first);
        for next in rest {
            let gap = next.fragment.start - current.end;
            if gap <= self.config.merge_threshold {
                current.absorb(next);
            } else {
                out.push(self.finalize(current, duration));
                current = PendingClip::seed(next);
            }
        }
        out.push(self.finalize(current, duration));
    }

    fn finalize(&self, pending: PendingClip, duration: Option<f64>) -> Clip {
        let (start, end) = self.expand_bounds(pending.start, pending.end, duration);

        let text = assemble_text(&pending.texts)
            .or_else(|| pending.texts.first().cloned())
            .unwrap_or_default();
        let is_conclusion = is_conclusion(&text);
        let score = pending.scores.iter().sum::<f32>() / pending.scores.len().max(1) as f32;

        Clip {
            video_id: pending.video_id,
            start,
            end,
            text,
            score: score.max(0.0),
            video: pending.video,
            is_conclusion,
        }
    }

    /// Add context and pad to the minimum duration, within `[0, duration]`.
    fn expand_bounds(&self, start: f64, end: f64, duration: Option<f64>) -> (f64, f64) {
        let cap = |t: f64| match duration {
            Some(d) => t.min(d),
            None => t,
        };
        let min = self.config.min_duration;

        let mut start = (start - self.config.context_before).max(0.0);
        let mut end = cap(end + self.config.context_after);

        let span = end - start;
        if span < min {
            let deficit = min - span;
            start = (start - deficit * BACKWARD_EXPANSION_SHARE).max(0.0);
            end = cap(end + deficit * (1.0 - BACKWARD_EXPANSION_SHARE));

            if start == 0.0 && end - start < min {
                end = cap(start + min);
            }
            // Symmetric case: the video end stopped forward growth
            if duration.is_some_and(|d| end >= d) && end - start < min {
                start = (end - min).max(0.0);
            }
        }

        (start, end.max(start))
    }
}

/// Deduplicate, keep the longest few texts, join, and truncate.
fn assemble_text(texts: &[String]) -> Option<String> {
    let mut seen = std::collections::HashSet::new();
    let mut unique: Vec<&str> = texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| t.chars().count() > MIN_TEXT_CHARS)
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect();

    if unique.is_empty() {
        return None;
    }

    unique.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    let joined = unique
        .into_iter()
        .take(MAX_CLIP_TEXTS)
        .collect::<Vec<_>>()
        .join(" ");

    if joined.chars().count() > MAX_CLIP_TEXT_CHARS {
        let truncated: String = joined.chars().take(MAX_CLIP_TEXT_CHARS).collect();
        Some(format!("{}...", truncated))
    } else {
        Some(joined)
    }
}

fn is_conclusion(text: &str) -> bool {
    let lower = text.to_lowercase();
    CONCLUSION_PHRASES.iter().any(|p| lower.contains(p))
}

/// Adjust a clip's score by its position in the video. Clips of videos with
/// unknown duration keep their score.
pub fn rescore_position(clip: &Clip, video_duration: Option<f64>) -> f32 {
    let Some(duration) = video_duration.filter(|d| *d > 0.0) else {
        return clip.score;
    };

    let mut score = clip.score;
    if clip.is_conclusion {
        score *= CONCLUSION_PENALTY;
    }

    let ratio = (clip.start + clip.end) / 2.0 / duration;
    let multiplier = if ratio > 0.85 {
        OUTRO_MULTIPLIER
    } else if ratio > 0.75 {
        LATE_MULTIPLIER
    } else if ratio < 0.05 {
        INTRO_MULTIPLIER
    } else if ratio <= 0.75 {
        BODY_MULTIPLIER
    } else {
        1.0
    };

    (score * multiplier).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{Fragment, ResultSource};

    fn hit(video_id: &str, start: f64, end: f64, text: &str, score: f32) -> FusedResult {
        FusedResult {
            fragment: Fragment::new(video_id, text, start, end, VideoMetadata::default()),
            bm25_score: 0.0,
            semantic_score: score,
            combined_score: score,
            boost: 1.0,
            source: ResultSource::Vector,
        }
    }

    fn no_durations() -> HashMap<String, f64> {
        HashMap::new()
    }

    fn durations(video_id: &str, duration: f64) -> HashMap<String, f64> {
        HashMap::from([(video_id.to_string(), duration)])
    }

    #[test]
    fn test_close_hits_merge_with_context() {
        let merger = ClipMerger::default();
        let clips = merger.merge(
            &[
                hit("video1", 0.0, 10.0, "intro text here", 0.5),
                hit("video1", 15.0, 25.0, "core content text", 0.7),
            ],
            &no_durations(),
        );

        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].start, 0.0);
        assert_eq!(clips[0].end, 30.0);
        assert!((clips[0].score - 0.6).abs() < 1e-6);
        assert!(clips[0].text.contains("intro text here"));
        assert!(clips[0].text.contains("core content text"));
    }

    #[test]
    fn test_gap_above_threshold_splits() {
        let merger = ClipMerger::default();
        let clips = merger.merge(
            &[
                hit("v", 100.0, 110.0, "first fragment text", 0.5),
                hit("v", 140.5, 150.0, "second fragment text", 0.4),
            ],
            &no_durations(),
        );
        assert_eq!(clips.len(), 2);
    }

    #[test]
    fn test_gap_equal_to_threshold_merges() {
        let merger = ClipMerger::default();
        let clips = merger.merge(
            &[
                hit("v", 100.0, 110.0, "first fragment text", 0.5),
                hit("v", 140.0, 150.0, "second fragment text", 0.4),
            ],
            &no_durations(),
        );
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].start, 95.0);
        assert_eq!(clips[0].end, 155.0);
    }

    #[test]
    fn test_videos_are_merged_independently() {
        let merger = ClipMerger::default();
        let clips = merger.merge(
            &[
                hit("a", 50.0, 60.0, "first video fragment", 0.9),
                hit("b", 55.0, 65.0, "second video fragment", 0.8),
            ],
            &no_durations(),
        );
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].video_id, "a");
    }

    #[test]
    fn test_unsorted_input_is_sorted_by_start() {
        let merger = ClipMerger::default();
        let clips = merger.merge(
            &[
                hit("v", 200.0, 210.0, "later fragment text", 0.9),
                hit("v", 100.0, 110.0, "earlier fragment text", 0.1),
                hit("v", 120.0, 130.0, "middle fragment text", 0.2),
            ],
            &no_durations(),
        );
        assert_eq!(clips.len(), 2);
        let early = clips.iter().find(|c| c.start < 150.0).unwrap();
        assert_eq!(early.start, 95.0);
        assert_eq!(early.end, 135.0);
    }

    #[test]
    fn test_minimum_duration_splits_deficit() {
        let merger = ClipMerger::new(ClipConfig {
            merge_threshold: 30.0,
            min_duration: 20.0,
            context_before: 2.0,
            context_after: 2.0,
        });
        let clips = merger.merge(&[hit("v", 100.0, 104.0, "short fragment text", 0.5)], &no_durations());
        // span 8 -> deficit 12 -> 7.2 back, 4.8 forward
        assert!((clips[0].start - 90.8).abs() < 1e-9);
        assert!((clips[0].end - 110.8).abs() < 1e-9);
    }

    #[test]
    fn test_minimum_duration_pushes_forward_at_video_start() {
        let merger = ClipMerger::new(ClipConfig {
            merge_threshold: 30.0,
            min_duration: 30.0,
            context_before: 5.0,
            context_after: 5.0,
        });
        let clips = merger.merge(&[hit("v", 1.0, 3.0, "opening words here", 0.5)], &no_durations());
        assert_eq!(clips[0].start, 0.0);
        assert!((clips[0].end - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_respect_video_duration() {
        let merger = ClipMerger::default();
        let clips = merger.merge(
            &[hit("v", 97.0, 99.0, "closing fragment text", 0.5)],
            &durations("v", 100.0),
        );
        assert_eq!(clips[0].end, 100.0);
        assert!(clips[0].start <= clips[0].end);
        assert!(clips[0].duration() >= 10.0 - 1e-9);
    }

    #[test]
    fn test_duration_invariant_holds() {
        let merger = ClipMerger::default();
        let hits = vec![
            hit("v", 0.0, 1.0, "very first words", 0.3),
            hit("v", 300.0, 300.5, "half second fragment", 0.4),
            hit("v", 599.0, 600.0, "final second of video", 0.2),
            hit("w", 12.0, 12.0, "zero length fragment", 0.9),
        ];
        let clips = merger.merge(&hits, &durations("v", 600.0));
        for clip in &clips {
            assert!(clip.start <= clip.end);
            assert!(clip.duration() >= 10.0 - 1e-9 || clip.start == 0.0);
        }
    }

    #[test]
    fn test_text_assembly_dedups_and_prefers_long_texts() {
        let merger = ClipMerger::default();
        let clips = merger.merge(
            &[
                hit("v", 10.0, 12.0, "short", 0.5),
                hit("v", 12.0, 14.0, "a medium length sentence", 0.5),
                hit("v", 14.0, 16.0, "A MEDIUM   length sentence", 0.5),
                hit("v", 16.0, 18.0, "the longest sentence of them all by far", 0.5),
                hit("v", 18.0, 20.0, "another fairly long one", 0.5),
                hit("v", 20.0, 22.0, "fourth distinct text entry", 0.5),
            ],
            &no_durations(),
        );
        let text = &clips[0].text;
        assert!(text.starts_with("the longest sentence of them all by far"));
        assert!(!text.contains("short"));
        assert_eq!(text.matches("medium").count(), 1);
        assert!(!text.contains("another fairly long one"));
    }

    #[test]
    fn test_long_text_is_truncated() {
        let merger = ClipMerger::default();
        let long = "word ".repeat(200);
        let clips = merger.merge(&[hit("v", 10.0, 20.0, &long, 0.5)], &no_durations());
        assert_eq!(clips[0].text.chars().count(), MAX_CLIP_TEXT_CHARS + 3);
        assert!(clips[0].text.ends_with("..."));
    }

    #[test]
    fn test_short_texts_fall_back_to_seed_text() {
        let merger = ClipMerger::default();
        let clips = merger.merge(&[hit("v", 10.0, 20.0, "tiny", 0.5)], &no_durations());
        assert_eq!(clips[0].text, "tiny");
    }

    #[test]
    fn test_higher_scoring_hit_supplies_metadata() {
        let merger = ClipMerger::default();
        let mut low = hit("v", 10.0, 20.0, "first fragment text", 0.2);
        low.fragment.video.title = "Low".to_string();
        let mut high = hit("v", 25.0, 35.0, "second fragment text", 0.9);
        high.fragment.video.title = "High".to_string();
        let mut mid = hit("v", 40.0, 50.0, "third fragment text", 0.5);
        mid.fragment.video.title = "Mid".to_string();

        let clips = merger.merge(&[low, high, mid], &no_durations());
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].video.title, "High");
    }

    #[test]
    fn test_conclusion_penalty_applies_before_position() {
        let merger = ClipMerger::default();
        let clips = merger.merge(
            &[hit("v", 500.0, 510.0, "and thank you for watching this lecture", 1.0)],
            &durations("v", 1000.0),
        );
        assert!(clips[0].is_conclusion);
        // midpoint 505 / 1000 sits in the body section
        assert!((clips[0].score - 0.3 * 1.15).abs() < 1e-6);
    }

    #[test]
    fn test_position_multipliers() {
        let clip = |start: f64, end: f64| Clip {
            video_id: "v".to_string(),
            start,
            end,
            text: String::new(),
            score: 1.0,
            video: VideoMetadata::default(),
            is_conclusion: false,
        };
        let d = Some(100.0);
        assert!((rescore_position(&clip(90.0, 100.0), d) - 0.4).abs() < 1e-6);
        assert!((rescore_position(&clip(75.0, 85.0), d) - 0.7).abs() < 1e-6);
        assert!((rescore_position(&clip(0.0, 8.0), d) - 0.85).abs() < 1e-6);
        assert!((rescore_position(&clip(40.0, 50.0), d) - 1.15).abs() < 1e-6);
        assert!((rescore_position(&clip(70.0, 80.0), d) - 1.15).abs() < 1e-6);
        assert_eq!(rescore_position(&clip(90.0, 100.0), None), 1.0);
    }

    #[test]
    fn test_unknown_duration_skips_conclusion_penalty() {
        let merger = ClipMerger::default();
        let clips = merger.merge(
            &[hit("v", 10.0, 20.0, "please like and subscribe to the channel", 0.8)],
            &no_durations(),
        );
        assert!(clips[0].is_conclusion);
        assert!((clips[0].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_clips_sorted_by_adjusted_score() {
        let merger = ClipMerger::default();
        let clips = merger.merge(
            &[
                hit("v", 950.0, 960.0, "late fragment in the video", 0.9),
                hit("v", 400.0, 410.0, "middle fragment in the video", 0.6),
                hit("v", 100.0, 110.0, "early fragment in the video", 0.5),
            ],
            &durations("v", 1000.0),
        );
        assert!(clips.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(clips[0].start, 395.0);
        assert!(clips.iter().all(|c| c.score >= 0.0));
    }

    #[test]
    fn test_timestamped_url() {
        let clip = Clip {
            video_id: "abc".to_string(),
            start: 75.4,
            end: 90.0,
            text: String::new(),
            score: 1.0,
            video: VideoMetadata {
                url: "https://www.youtube.com/watch?v=abc".to_string(),
                ..Default::default()
            },
            is_conclusion: false,
        };
        assert_eq!(
            clip.timestamped_url().as_deref(),
            Some("https://www.youtube.com/watch?v=abc&t=75s")
        );
    }
}
