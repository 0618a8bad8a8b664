//! Fusion of keyword and vector rankings with metadata boosting.

use crate::fragment::{Fragment, FragmentKey, ResultSource, ScoredResult};
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Boost per query term found in the video title.
pub const TITLE_BOOST: f32 = 0.20;
/// Boost per query term found in the video description.
pub const DESCRIPTION_BOOST: f32 = 0.10;
/// Boost per query term found in the opening words of the fragment.
pub const TEXT_START_BOOST: f32 = 0.08;
/// Maximum boost for the most viewed video among the candidates.
pub const POPULARITY_BOOST: f32 = 0.05;
/// Number of leading fragment words checked for query terms.
pub const TEXT_START_WORDS: usize = 10;

/// Relative weight of the two retrieval sources. Always sums to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    bm25: f32,
    semantic: f32,
}

impl FusionWeights {
    /// Normalize the pair to sum to 1. Negative, non-finite or all-zero
    /// input falls back to an even split.
    pub fn new(bm25: f32, semantic: f32) -> Self {
        let valid = bm25.is_finite() && semantic.is_finite() && bm25 >= 0.0 && semantic >= 0.0;
        let total = bm25 + semantic;
        if !valid || total <= 0.0 {
            return Self {
                bm25: 0.5,
                semantic: 0.5,
            };
        }
        Self {
            bm25: bm25 / total,
            semantic: semantic / total,
        }
    }

    pub fn bm25(&self) -> f32 {
        self.bm25
    }

    pub fn semantic(&self) -> f32 {
        self.semantic
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self::new(0.4, 0.6)
    }
}

/// Multiplier increments used by metadata boosting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostWeights {
    pub title: f32,
    pub description: f32,
    pub text_start: f32,
    pub popularity: f32,
}

impl Default for BoostWeights {
    fn default() -> Self {
        Self {
            title: TITLE_BOOST,
            description: DESCRIPTION_BOOST,
            text_start: TEXT_START_BOOST,
            popularity: POPULARITY_BOOST,
        }
    }
}

/// Result of one retrieval source, success or failure.
#[derive(Debug)]
pub enum SourceOutcome {
    Succeeded(Vec<ScoredResult>),
    Failed(String),
}

impl SourceOutcome {
    fn into_results(self, source: &str) -> Vec<ScoredResult> {
        match self {
            SourceOutcome::Succeeded(results) => results,
            SourceOutcome::Failed(reason) => {
                warn!("{} search failed, continuing without it: {}", source, reason);
                Vec::new()
            }
        }
    }
}

impl<E: std::fmt::Display> From<std::result::Result<Vec<ScoredResult>, E>> for SourceOutcome {
    fn from(result: std::result::Result<Vec<ScoredResult>, E>) -> Self {
        match result {
            Ok(results) => SourceOutcome::Succeeded(results),
            Err(e) => SourceOutcome::Failed(e.to_string()),
        }
    }
}

/// A fragment after fusion.
#[derive(Debug, Clone)]
pub struct FusedResult {
    pub fragment: Fragment,
    /// Normalized keyword score (0 when absent from keyword results).
    pub bm25_score: f32,
    /// Normalized vector score (0 when absent from vector results).
    pub semantic_score: f32,
    /// Weighted, boosted score used for ranking. Never negative.
    pub combined_score: f32,
    /// Metadata multiplier applied to the weighted score (always >= 1).
    pub boost: f32,
    pub source: ResultSource,
}

/// Combines keyword and vector results into one ranking.
#[derive(Debug, Clone, Default)]
pub struct ResultFusion {
    weights: FusionWeights,
    boosts: BoostWeights,
}

impl ResultFusion {
    pub fn new(weights: FusionWeights) -> Self {
        Self {
            weights,
            boosts: BoostWeights::default(),
        }
    }

    pub fn with_boosts(mut self, boosts: BoostWeights) -> Self {
        self.boosts = boosts;
        self
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Fuse both sources for `query`, best first.
    ///
    /// A failed source is logged and treated as empty. When neither source
    /// yields anything the result is empty.
    pub fn merge(
        &self,
        keyword: SourceOutcome,
        vector: SourceOutcome,
        query: &str,
    ) -> Vec<FusedResult> {
        let keyword = keyword.into_results("Keyword");
        let vector = vector.into_results("Vector");

        if keyword.is_empty() && vector.is_empty() {
            debug!("No results from either source");
            return Vec::new();
        }

        let keyword_norm = normalize(&keyword);
        let vector_norm = normalize(&vector);

        let mut fused: Vec<FusedResult> = Vec::with_capacity(keyword.len() + vector.len());
        let mut positions: HashMap<FragmentKey, usize> = HashMap::new();

        for (result, norm) in keyword.into_iter().zip(keyword_norm) {
            let key = result.fragment.key();
            if positions.contains_key(&key) {
                continue;
            }
            positions.insert(key, fused.len());
            fused.push(FusedResult {
                fragment: result.fragment,
                bm25_score: norm,
                semantic_score: 0.0,
                combined_score: norm * self.weights.bm25,
                boost: 1.0,
                source: ResultSource::Keyword,
            });
        }

        for (result, norm) in vector.into_iter().zip(vector_norm) {
            let key = result.fragment.key();
            match positions.get(&key) {
                Some(&pos) if fused[pos].source == ResultSource::Keyword => {
                    let entry = &mut fused[pos];
                    entry.semantic_score = norm;
                    entry.combined_score =
                        entry.bm25_score * self.weights.bm25 + norm * self.weights.semantic;
                    entry.source = ResultSource::Both;
                    prefer_vector_copy(&mut entry.fragment, result.fragment);
                }
                Some(_) => {}
                None => {
                    positions.insert(key, fused.len());
                    fused.push(FusedResult {
                        fragment: result.fragment,
                        bm25_score: 0.0,
                        semantic_score: norm,
                        combined_score: norm * self.weights.semantic,
                        boost: 1.0,
                        source: ResultSource::Vector,
                    });
                }
            }
        }

        self.apply_boosts(&mut fused, query);

        fused.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));

        debug!(
            "Fused {} results ({} from both sources)",
            fused.len(),
            fused.iter().filter(|r| r.source == ResultSource::Both).count()
        );

        fused
    }

    fn apply_boosts(&self, fused: &mut [FusedResult], query: &str) {
        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        let max_views = fused
            .iter()
            .map(|r| r.fragment.video.view_count)
            .max()
            .unwrap_or(0);

        for result in fused.iter_mut() {
            let boost = self.boost_for(&result.fragment, &terms, max_views);
            result.boost = boost;
            result.combined_score = (result.combined_score * boost).max(0.0);
        }
    }

    /// Metadata multiplier for one fragment. Starts at 1 and only grows.
    fn boost_for(&self, fragment: &Fragment, terms: &HashSet<String>, max_views: u64) -> f32 {
        let title = fragment.video.title.to_lowercase();
        let description = fragment.video.description.to_lowercase();
        let text_start = fragment
            .text
            .split_whitespace()
            .take(TEXT_START_WORDS)
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let count = |haystack: &str| terms.iter().filter(|t| haystack.contains(t.as_str())).count();

        let mut boost = 1.0;
        boost += self.boosts.title * count(title.as_str()) as f32;
        boost += self.boosts.description * count(description.as_str()) as f32;
        boost += self.boosts.text_start * count(text_start.as_str()) as f32;

        let views = fragment.video.view_count;
        if views > 0 && max_views > 0 {
            let ratio = (views as f64 / max_views as f64).min(1.0) as f32;
            boost += self.boosts.popularity * ratio;
        }

        boost.max(1.0)
    }
}

/// Min-max rescale raw scores to [0, 1]. A list with zero score range
/// keeps its raw values.
fn normalize(results: &[ScoredResult]) -> Vec<f32> {
    let Some(first) = results.first() else {
        return Vec::new();
    };

    let (min, max) = results
        .iter()
        .fold((first.score, first.score), |(lo, hi), r| (lo.min(r.score), hi.max(r.score)));
    let range = max - min;

    results
        .iter()
        .map(|r| if range > 0.0 { (r.score - min) / range } else { r.score })
        .collect()
}

/// Descriptive fields come from the vector copy, falling back to the
/// keyword copy where the vector copy is empty.
fn prefer_vector_copy(current: &mut Fragment, vector: Fragment) {
    if !vector.text.is_empty() {
        current.text = vector.text;
    }
    if !vector.video_id.is_empty() {
        current.video_id = vector.video_id;
    }
    current.start = vector.start;
    current.end = vector.end;
    current.video.overlay(&vector.video);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::VideoMetadata;

    fn fragment(id: &str, video_id: &str, text: &str, start: f64) -> Fragment {
        Fragment::new(video_id, text, start, start + 10.0, VideoMetadata::default()).with_id(id)
    }

    fn kw(id: &str, score: f32) -> ScoredResult {
        ScoredResult::keyword(fragment(id, "v1", "plain words", 0.0), score)
    }

    fn vec_hit(id: &str, score: f32) -> ScoredResult {
        ScoredResult::vector(fragment(id, "v1", "plain words", 0.0), score)
    }

    fn find<'a>(results: &'a [FusedResult], id: &str) -> &'a FusedResult {
        results
            .iter()
            .find(|r| r.fragment.id.as_deref() == Some(id))
            .unwrap()
    }

    #[test]
    fn test_weights_normalize_and_fall_back() {
        let w = FusionWeights::new(2.0, 6.0);
        assert!((w.bm25() - 0.25).abs() < 1e-6);
        assert!((w.semantic() - 0.75).abs() < 1e-6);

        assert_eq!(FusionWeights::new(0.0, 0.0), FusionWeights::new(1.0, 1.0));
        assert_eq!(FusionWeights::new(-1.0, 2.0).bm25(), 0.5);
        assert_eq!(FusionWeights::new(f32::NAN, 1.0).semantic(), 0.5);

        let d = FusionWeights::default();
        assert!((d.bm25() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_fragment_in_both_sources_combines_weighted_scores() {
        let fusion = ResultFusion::default();
        // Normalized keyword score for "a" is 0.8, vector score is 0.6
        let keyword = vec![kw("top", 10.0), kw("a", 8.0), kw("low", 0.0)];
        let vector = vec![vec_hit("top", 1.0), vec_hit("a", 0.6), vec_hit("low", 0.0)];

        let fused = fusion.merge(
            SourceOutcome::Succeeded(keyword),
            SourceOutcome::Succeeded(vector),
            "",
        );

        let a = find(&fused, "a");
        assert_eq!(a.source, ResultSource::Both);
        assert!((a.bm25_score - 0.8).abs() < 1e-6);
        assert!((a.semantic_score - 0.6).abs() < 1e-6);
        assert!((a.combined_score - 0.68).abs() < 1e-5);
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn test_single_source_results_use_only_their_weight() {
        let fusion = ResultFusion::default();
        let fused = fusion.merge(
            SourceOutcome::Succeeded(vec![kw("k1", 4.0), kw("k2", 2.0)]),
            SourceOutcome::Succeeded(vec![vec_hit("v1", 0.9), vec_hit("v2", 0.3)]),
            "",
        );

        assert!((find(&fused, "k1").combined_score - 0.4).abs() < 1e-6);
        assert!((find(&fused, "v1").combined_score - 0.6).abs() < 1e-6);
        assert_eq!(find(&fused, "k2").combined_score, 0.0);
        assert_eq!(fused[0].fragment.id.as_deref(), Some("v1"));
    }

    #[test]
    fn test_zero_range_keeps_raw_scores() {
        let fusion = ResultFusion::default();
        let fused = fusion.merge(
            SourceOutcome::Succeeded(Vec::new()),
            SourceOutcome::Succeeded(vec![vec_hit("only", 0.7)]),
            "",
        );
        assert!((fused[0].semantic_score - 0.7).abs() < 1e-6);
        assert!((fused[0].combined_score - 0.42).abs() < 1e-6);
    }

    #[test]
    fn test_identity_falls_back_to_rounded_span() {
        let fusion = ResultFusion::default();
        let keyword = vec![ScoredResult::keyword(
            Fragment::new("v1", "text", 12.001, 20.0, VideoMetadata::default()),
            3.0,
        )];
        let vector = vec![ScoredResult::vector(
            Fragment::new("v1", "text", 12.0, 20.004, VideoMetadata::default()),
            0.5,
        )];
        let fused = fusion.merge(
            SourceOutcome::Succeeded(keyword),
            SourceOutcome::Succeeded(vector),
            "",
        );
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].source, ResultSource::Both);
    }

    #[test]
    fn test_vector_copy_supplies_metadata() {
        let fusion = ResultFusion::default();
        let mut keyword_copy = fragment("x", "v1", "keyword text", 0.0);
        keyword_copy.video.title = "Old title".to_string();
        keyword_copy.video.channel = "Channel".to_string();
        let mut vector_copy = fragment("x", "v1", "vector text", 0.0);
        vector_copy.video.title = "New title".to_string();

        let fused = fusion.merge(
            SourceOutcome::Succeeded(vec![ScoredResult::keyword(keyword_copy, 1.0)]),
            SourceOutcome::Succeeded(vec![ScoredResult::vector(vector_copy, 0.9)]),
            "",
        );

        assert_eq!(fused[0].fragment.text, "vector text");
        assert_eq!(fused[0].fragment.video.title, "New title");
        assert_eq!(fused[0].fragment.video.channel, "Channel");
    }

    #[test]
    fn test_metadata_boosts() {
        let fusion = ResultFusion::default();
        let mut boosted = fragment("b", "v1", "recursion explained with examples", 0.0);
        boosted.video.title = "Recursion basics".to_string();
        boosted.video.description = "All about recursion".to_string();
        boosted.video.view_count = 1000;
        let mut plain = fragment("p", "v2", "unrelated content", 0.0);
        plain.video.view_count = 500;

        let fused = fusion.merge(
            SourceOutcome::Failed("index offline".to_string()),
            SourceOutcome::Succeeded(vec![
                ScoredResult::vector(boosted, 0.5),
                ScoredResult::vector(plain, 0.5),
            ]),
            "Recursion",
        );

        let b = find(&fused, "b");
        // 1 + 0.20 title + 0.10 description + 0.08 text start + 0.05 views
        assert!((b.boost - 1.43).abs() < 1e-5);
        let p = find(&fused, "p");
        assert!((p.boost - 1.025).abs() < 1e-5);
        assert!((p.combined_score - 0.5 * 0.6 * 1.025).abs() < 1e-5);
        assert_eq!(fused[0].fragment.id.as_deref(), Some("b"));
    }

    #[test]
    fn test_boost_never_below_one() {
        let fusion = ResultFusion::default();
        let fused = fusion.merge(
            SourceOutcome::Succeeded(vec![kw("a", 3.0), kw("b", 1.0)]),
            SourceOutcome::Succeeded(vec![vec_hit("c", 0.2)]),
            "nothing matches here",
        );
        assert!(fused.iter().all(|r| r.boost >= 1.0));
        assert!(fused.iter().all(|r| r.combined_score >= 0.0));
    }

    #[test]
    fn test_one_source_down_uses_the_other() {
        let fusion = ResultFusion::default();
        let fused = fusion.merge(
            SourceOutcome::Succeeded(vec![kw("a", 3.0), kw("b", 1.0)]),
            SourceOutcome::Failed("connection refused".to_string()),
            "",
        );
        assert_eq!(fused.len(), 2);
        assert!(fused.iter().all(|r| r.source == ResultSource::Keyword));
    }

    #[test]
    fn test_both_sources_down_is_empty() {
        let fusion = ResultFusion::default();
        assert!(fusion
            .merge(
                SourceOutcome::Failed("a".to_string()),
                SourceOutcome::Failed("b".to_string()),
                "query",
            )
            .is_empty());
        assert!(fusion
            .merge(
                SourceOutcome::Succeeded(Vec::new()),
                SourceOutcome::Succeeded(Vec::new()),
                "query",
            )
            .is_empty());
    }

    #[test]
    fn test_output_sorted_descending() {
        let fusion = ResultFusion::default();
        let fused = fusion.merge(
            SourceOutcome::Succeeded(vec![kw("a", 5.0), kw("b", 3.0), kw("c", 1.0)]),
            SourceOutcome::Succeeded(vec![vec_hit("c", 0.9), vec_hit("d", 0.4), vec_hit("e", 0.1)]),
            "",
        );
        assert!(fused
            .windows(2)
            .all(|w| w[0].combined_score >= w[1].combined_score));
    }
}
