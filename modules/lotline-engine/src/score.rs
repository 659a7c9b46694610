//! Composite relevance scoring: independent [0,1] sub-signals blended by
//! configured weights.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lotline_common::{FilterConfig, Post, ScoreWeights};

use crate::normalize::canonical_text;
use crate::similarity::{cosine, term_vector};

/// Neutral value for sub-signals with no configured reference: neither
/// penalizes nor rewards.
const NEUTRAL_SIGNAL: f64 = 0.5;

/// Boost per optional term present, capped by the signal ceiling.
const OPTIONAL_TERM_BOOST: f64 = 0.1;

/// Recency decay scale in days: a post 30 days behind the window end scores
/// half the freshest post.
const RECENCY_SCALE_DAYS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceScore {
    pub keyword: f64,
    pub quality: f64,
    pub semantic: f64,
    pub geographic: f64,
    pub recency: f64,
    pub composite: f64,
}

/// Scores posts against one filtering request. Built once per pipeline;
/// all term lists and the reference vector are canonicalized up front.
#[derive(Debug)]
pub struct RelevanceScorer {
    required: Vec<String>,
    optional: Vec<String>,
    excluded: Vec<String>,
    weights: ScoreWeights,
    quality_ceiling: f64,
    reference: Option<HashMap<String, f64>>,
    target_metros: BTreeSet<String>,
    nearby_metros: BTreeSet<String>,
    nearby_credit: f64,
    window_end: DateTime<Utc>,
}

impl RelevanceScorer {
    pub fn new(config: &FilterConfig) -> Self {
        let reference = if config.reference_topic.is_empty() {
            None
        } else {
            Some(term_vector(&config.reference_topic.join(" ")))
        };
        Self {
            required: canonical_terms(&config.required_terms),
            optional: canonical_terms(&config.optional_terms),
            excluded: canonical_terms(&config.excluded_terms),
            weights: config.weights,
            quality_ceiling: config.quality_ceiling,
            reference,
            target_metros: config.target_metros.clone(),
            nearby_metros: config.nearby_metros.clone(),
            nearby_credit: config.nearby_metro_credit,
            window_end: config.window_end,
        }
    }

    /// True if any excluded term appears in the post text. Drives the hard
    /// keyword stage as well as the keyword sub-signal zero rule.
    pub fn contains_excluded(&self, post: &Post) -> bool {
        let canonical = canonical_text(&post.text);
        self.excluded.iter().any(|t| canonical.contains(t.as_str()))
    }

    pub fn score(&self, post: &Post) -> RelevanceScore {
        let canonical = canonical_text(&post.text);

        let keyword = self.keyword_signal(&canonical);
        let quality = self.quality_signal(post.quality_score);
        let semantic = self.semantic_signal(&canonical);
        let geographic = self.geographic_signal(&post.geo_tags);
        let recency = self.recency_signal(post.created_at);

        let w = &self.weights;
        let composite = (keyword * w.keyword
            + quality * w.quality
            + semantic * w.semantic
            + geographic * w.geographic
            + recency * w.recency)
            .clamp(0.0, 1.0);

        RelevanceScore {
            keyword,
            quality,
            semantic,
            geographic,
            recency,
            composite,
        }
    }

    /// Fraction of required terms present, plus a capped boost for optional
    /// terms. Exactly 0.0 when any excluded term is present.
    fn keyword_signal(&self, canonical: &str) -> f64 {
        if self.excluded.iter().any(|t| canonical.contains(t.as_str())) {
            return 0.0;
        }
        let base = if self.required.is_empty() {
            1.0
        } else {
            let matched = self
                .required
                .iter()
                .filter(|t| canonical.contains(t.as_str()))
                .count();
            matched as f64 / self.required.len() as f64
        };
        let boost = self
            .optional
            .iter()
            .filter(|t| canonical.contains(t.as_str()))
            .count() as f64
            * OPTIONAL_TERM_BOOST;
        (base + boost).min(1.0)
    }

    /// Log-scaled saturating normalization: 0 at quality 0, 1 at the ceiling.
    fn quality_signal(&self, quality_score: f64) -> f64 {
        let q = quality_score.max(0.0);
        ((1.0 + q).ln() / (1.0 + self.quality_ceiling).ln()).min(1.0)
    }

    fn semantic_signal(&self, canonical: &str) -> f64 {
        match &self.reference {
            Some(reference) => cosine(&term_vector(canonical), reference),
            None => NEUTRAL_SIGNAL,
        }
    }

    fn geographic_signal(&self, geo_tags: &BTreeSet<String>) -> f64 {
        if self.target_metros.is_empty() {
            return NEUTRAL_SIGNAL;
        }
        if geo_tags.intersection(&self.target_metros).next().is_some() {
            return 1.0;
        }
        if geo_tags.intersection(&self.nearby_metros).next().is_some() {
            return self.nearby_credit;
        }
        0.0
    }

    /// Decay against the request window end, not wall clock, so re-running a
    /// request scores identically.
    fn recency_signal(&self, created_at: DateTime<Utc>) -> f64 {
        let days = ((self.window_end - created_at).num_seconds().max(0)) as f64 / 86_400.0;
        1.0 / (1.0 + days / RECENCY_SCALE_DAYS)
    }
}

fn canonical_terms(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| canonical_text(t))
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lotline_common::RawRecord;

    use crate::normalize::Normalizer;

    fn config() -> FilterConfig {
        FilterConfig::builder()
            .window_start(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .window_end(Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap())
            .required_terms(vec!["lease".to_string(), "office".to_string()])
            .optional_terms(vec!["sublease".to_string()])
            .excluded_terms(vec!["residential".to_string()])
            .build()
    }

    fn post(text: &str, quality: f64) -> Post {
        let raw = RawRecord {
            id: Some("t3_1".to_string()),
            subreddit: Some("commercialrealestate".to_string()),
            title: Some(text.to_string()),
            created_utc: Some(lotline_common::EpochSeconds::Int(1_705_000_000)),
            score: Some(quality),
            ..Default::default()
        };
        Normalizer::with_defaults().normalize(&raw).unwrap()
    }

    #[test]
    fn composite_stays_in_unit_interval() {
        let scorer = RelevanceScorer::new(&config());
        for text in ["office lease sublease downtown", "", "unrelated words only"] {
            for quality in [0.0, 1.0, 1e9] {
                let s = scorer.score(&post(text, quality));
                assert!((0.0..=1.0).contains(&s.composite), "composite {s:?}");
            }
        }
    }

    #[test]
    fn excluded_term_zeroes_keyword_signal() {
        let scorer = RelevanceScorer::new(&config());
        let s = scorer.score(&post("office lease but residential building", 10.0));
        assert_eq!(s.keyword, 0.0);
    }

    #[test]
    fn required_terms_fraction() {
        let scorer = RelevanceScorer::new(&config());
        let half = scorer.score(&post("office space downtown", 10.0));
        let full = scorer.score(&post("office lease downtown", 10.0));
        assert!((half.keyword - 0.5).abs() < 1e-9);
        assert!((full.keyword - 1.0).abs() < 1e-9);
    }

    #[test]
    fn optional_terms_boost_but_cap_at_one() {
        let scorer = RelevanceScorer::new(&config());
        let s = scorer.score(&post("office lease sublease", 10.0));
        assert_eq!(s.keyword, 1.0);
    }

    #[test]
    fn no_required_terms_is_vacuously_satisfied() {
        let mut cfg = config();
        cfg.required_terms.clear();
        let scorer = RelevanceScorer::new(&cfg);
        let s = scorer.score(&post("anything at all", 10.0));
        assert_eq!(s.keyword, 1.0);
    }

    #[test]
    fn quality_signal_saturates_at_ceiling() {
        let scorer = RelevanceScorer::new(&config());
        let below = scorer.score(&post("office lease", 10.0));
        let at = scorer.score(&post("office lease", 500.0));
        let above = scorer.score(&post("office lease", 50_000.0));
        assert!(below.quality < at.quality);
        assert!((at.quality - 1.0).abs() < 1e-6);
        assert_eq!(above.quality, 1.0);
    }

    #[test]
    fn zero_quality_scores_zero() {
        let scorer = RelevanceScorer::new(&config());
        assert_eq!(scorer.score(&post("office lease", 0.0)).quality, 0.0);
    }

    #[test]
    fn missing_reference_vector_is_neutral() {
        let scorer = RelevanceScorer::new(&config());
        assert_eq!(scorer.score(&post("office lease", 10.0)).semantic, 0.5);
    }

    #[test]
    fn reference_vector_rewards_overlap() {
        let mut cfg = config();
        cfg.reference_topic = vec!["office lease downtown vacancy".to_string()];
        let scorer = RelevanceScorer::new(&cfg);
        let on_topic = scorer.score(&post("office lease downtown", 10.0));
        let off_topic = scorer.score(&post("boat rental marina", 10.0));
        assert!(on_topic.semantic > 0.7);
        assert_eq!(off_topic.semantic, 0.0);
    }

    #[test]
    fn geographic_signal_neutral_without_targets() {
        let scorer = RelevanceScorer::new(&config());
        assert_eq!(scorer.score(&post("office lease", 10.0)).geographic, 0.5);
    }

    #[test]
    fn geographic_signal_full_on_target_match() {
        let mut cfg = config();
        cfg.target_metros = ["nyc".to_string()].into();
        let scorer = RelevanceScorer::new(&cfg);
        let s = scorer.score(&post("office lease in manhattan", 10.0));
        assert_eq!(s.geographic, 1.0);
    }

    #[test]
    fn geographic_signal_partial_credit_for_nearby() {
        let mut cfg = config();
        cfg.target_metros = ["nyc".to_string()].into();
        cfg.nearby_metros = ["chicago".to_string()].into();
        cfg.nearby_metro_credit = 0.4;
        let scorer = RelevanceScorer::new(&cfg);
        let s = scorer.score(&post("office lease in chicago", 10.0));
        assert_eq!(s.geographic, 0.4);
    }

    #[test]
    fn geographic_signal_zero_when_unmatched() {
        let mut cfg = config();
        cfg.target_metros = ["nyc".to_string()].into();
        let scorer = RelevanceScorer::new(&cfg);
        let s = scorer.score(&post("office lease somewhere quiet", 10.0));
        assert_eq!(s.geographic, 0.0);
    }

    #[test]
    fn recency_full_at_window_end_and_decays() {
        let mut cfg = config();
        cfg.weights = ScoreWeights {
            keyword: 0.0,
            quality: 0.0,
            semantic: 0.0,
            geographic: 0.0,
            recency: 1.0,
        };
        let scorer = RelevanceScorer::new(&cfg);
        let mut fresh = post("office lease", 10.0);
        fresh.created_at = cfg.window_end;
        let mut stale = post("office lease", 10.0);
        stale.created_at = cfg.window_start;
        let s_fresh = scorer.score(&fresh);
        let s_stale = scorer.score(&stale);
        assert!((s_fresh.recency - 1.0).abs() < 1e-9);
        assert!(s_stale.recency < s_fresh.recency);
        assert_eq!(s_fresh.composite, s_fresh.recency);
    }

    #[test]
    fn contains_excluded_drives_hard_stage() {
        let scorer = RelevanceScorer::new(&config());
        assert!(scorer.contains_excluded(&post("nice Residential tower", 1.0)));
        assert!(!scorer.contains_excluded(&post("office lease", 1.0)));
    }
}
