use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::LotlineError;
use crate::types::SortStrategy;

/// Tolerance when checking that score weights sum to 1.0.
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Weights for the composite relevance score. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub keyword: f64,
    pub quality: f64,
    pub semantic: f64,
    pub geographic: f64,
    /// Recency component measured against the request window end. Defaults
    /// to 0.0 so the composite stays a four-signal blend unless opted in.
    pub recency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            keyword: 0.3,
            quality: 0.3,
            semantic: 0.2,
            geographic: 0.2,
            recency: 0.0,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.keyword + self.quality + self.semantic + self.geographic + self.recency
    }

    pub fn validate(&self) -> Result<(), LotlineError> {
        let all = [
            ("keyword", self.keyword),
            ("quality", self.quality),
            ("semantic", self.semantic),
            ("geographic", self.geographic),
            ("recency", self.recency),
        ];
        for (name, w) in all {
            if !(0.0..=1.0).contains(&w) {
                return Err(LotlineError::Config(format!(
                    "score weight '{name}' must be in [0, 1], got {w}"
                )));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(LotlineError::Config(format!(
                "score weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Configuration for one filtering request: the collection window, term
/// lists, thresholds, scoring weights, and geographic targets.
///
/// Validated once at pipeline construction, never per post.
#[derive(Debug, Clone, TypedBuilder)]
pub struct FilterConfig {
    /// Inclusive collection window.
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,

    /// Terms that drive the keyword sub-signal (fraction present).
    #[builder(default)]
    pub required_terms: Vec<String>,
    /// Terms that boost the keyword sub-signal when present.
    #[builder(default)]
    pub optional_terms: Vec<String>,
    /// Any match is a hard rejection and zeroes the keyword sub-signal.
    #[builder(default)]
    pub excluded_terms: Vec<String>,

    /// Posts below this upstream quality score are rejected outright.
    #[builder(default = 0.0)]
    pub min_quality_score: f64,
    /// Text length bounds enforced by the quality stage.
    #[builder(default = 50)]
    pub min_text_length: usize,
    #[builder(default = 10_000)]
    pub max_text_length: usize,

    /// Composite score below this is rejected at the relevance stage.
    #[builder(default = 0.3)]
    pub accept_threshold: f64,
    #[builder(default)]
    pub weights: ScoreWeights,
    /// Quality scores at or above this saturate the quality sub-signal.
    #[builder(default = 500.0)]
    pub quality_ceiling: f64,
    /// Reference topic terms for the semantic sub-signal. Empty means no
    /// reference is configured and the sub-signal is a neutral 0.5.
    #[builder(default)]
    pub reference_topic: Vec<String>,

    /// Target metro set for the geographic stage and sub-signal. Empty
    /// disables the hard geographic stage.
    #[builder(default)]
    pub target_metros: BTreeSet<String>,
    /// Metros treated as "nearby" for partial geographic credit.
    #[builder(default)]
    pub nearby_metros: BTreeSet<String>,
    #[builder(default = 0.5)]
    pub nearby_metro_credit: f64,

    /// Fuzzy dedup similarity threshold over token-frequency vectors.
    #[builder(default = 0.85)]
    pub similarity_threshold: f64,
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), LotlineError> {
        if self.window_end < self.window_start {
            return Err(LotlineError::Config(format!(
                "window end {} precedes window start {}",
                self.window_end, self.window_start
            )));
        }
        self.weights.validate()?;
        if !(0.0..=1.0).contains(&self.accept_threshold) {
            return Err(LotlineError::Config(format!(
                "accept threshold must be in [0, 1], got {}",
                self.accept_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(LotlineError::Config(format!(
                "similarity threshold must be in [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.nearby_metro_credit) {
            return Err(LotlineError::Config(format!(
                "nearby metro credit must be in [0, 1], got {}",
                self.nearby_metro_credit
            )));
        }
        if self.min_quality_score < 0.0 {
            return Err(LotlineError::Config(format!(
                "minimum quality score must be non-negative, got {}",
                self.min_quality_score
            )));
        }
        if self.max_text_length < self.min_text_length {
            return Err(LotlineError::Config(format!(
                "max text length {} below min text length {}",
                self.max_text_length, self.min_text_length
            )));
        }
        if self.quality_ceiling <= 0.0 {
            return Err(LotlineError::Config(format!(
                "quality ceiling must be positive, got {}",
                self.quality_ceiling
            )));
        }
        Ok(())
    }
}

/// Coverage bucketing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct CoverageConfig {
    /// Fixed bucket width in seconds. Default: one day.
    #[builder(default = 86_400)]
    pub bucket_width_secs: i64,
    /// Buckets with a gap ratio above this are reported as gaps.
    #[builder(default = 0.25)]
    pub gap_threshold: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CoverageConfig {
    pub fn validate(&self) -> Result<(), LotlineError> {
        if self.bucket_width_secs <= 0 {
            return Err(LotlineError::Config(format!(
                "bucket width must be positive, got {}s",
                self.bucket_width_secs
            )));
        }
        if !(0.0..1.0).contains(&self.gap_threshold) {
            return Err(LotlineError::Config(format!(
                "gap threshold must be in [0, 1), got {}",
                self.gap_threshold
            )));
        }
        Ok(())
    }
}

/// Backfill scheduler configuration.
#[derive(Debug, Clone, TypedBuilder)]
pub struct BackfillConfig {
    /// Bounded worker pool size.
    #[builder(default = 4)]
    pub workers: usize,
    /// Collector attempts per task before it is marked failed.
    #[builder(default = 3)]
    pub max_attempts: u32,
    /// Base delay for exponential retry backoff.
    #[builder(default = 500)]
    pub backoff_base_ms: u64,
    /// Sort strategies fanned out per gap window.
    #[builder(default = vec![SortStrategy::New, SortStrategy::Relevance])]
    pub sort_strategies: Vec<SortStrategy>,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl BackfillConfig {
    pub fn validate(&self) -> Result<(), LotlineError> {
        if self.workers == 0 {
            return Err(LotlineError::Config(
                "worker pool size must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(LotlineError::Config(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if self.sort_strategies.is_empty() {
            return Err(LotlineError::Config(
                "at least one sort strategy is required".to_string(),
            ));
        }
        Ok(())
    }
}
