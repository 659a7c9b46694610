//! FilterPipeline — the fixed-order stage orchestrator.
//!
//! Stages 1–5 are pure per-post decisions; stage 6 routes survivors through
//! the deduplicator and applies the representative-only acceptance rule.
//! Re-running an identical batch yields identical status and score
//! assignments: there are no random tie-breaks and all transitions are
//! compare-and-set against the ledger.

use std::sync::Arc;

use tracing::info;

use lotline_common::{
    CoverageConfig, FilterConfig, LotlineError, Post, PostStatus, RawRecord, RejectStage,
};

use crate::coverage::CoverageTracker;
use crate::dedup::Deduplicator;
use crate::ledger::PostLedger;
use crate::normalize::Normalizer;
use crate::score::{RelevanceScore, RelevanceScorer};
use crate::stats::FilterStats;

/// Outcome of the pure filter stages (1–5) for one post.
#[derive(Debug, Clone, PartialEq)]
pub enum StageVerdict {
    Reject(RejectStage),
    Pass(RelevanceScore),
}

#[derive(Debug)]
pub struct FilterPipeline {
    config: FilterConfig,
    normalizer: Normalizer,
    scorer: RelevanceScorer,
    ledger: Arc<PostLedger>,
    dedup: Arc<Deduplicator>,
    coverage: Arc<CoverageTracker>,
}

impl FilterPipeline {
    /// Build a pipeline, validating all configuration up front. No post is
    /// ever processed with invalid weights or thresholds.
    pub fn new(config: FilterConfig, coverage: CoverageConfig) -> Result<Self, LotlineError> {
        config.validate()?;
        coverage.validate()?;
        let scorer = RelevanceScorer::new(&config);
        let dedup = Arc::new(Deduplicator::new(config.similarity_threshold));
        Ok(Self {
            scorer,
            dedup,
            config,
            normalizer: Normalizer::with_defaults(),
            ledger: Arc::new(PostLedger::new()),
            coverage: Arc::new(CoverageTracker::new(coverage)),
        })
    }

    /// Replace the default tagging lexicons.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn ledger(&self) -> &PostLedger {
        &self.ledger
    }

    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn coverage(&self) -> &CoverageTracker {
        &self.coverage
    }

    /// Run stages 1–5 for one post. Pure: no shared state is touched.
    pub fn evaluate(&self, post: &Post) -> StageVerdict {
        // Stage 1: temporal — inclusive window.
        if post.created_at < self.config.window_start || post.created_at > self.config.window_end {
            return StageVerdict::Reject(RejectStage::Temporal);
        }

        // Stage 2: keyword exclusion.
        if self.scorer.contains_excluded(post) {
            return StageVerdict::Reject(RejectStage::Keyword);
        }

        // Stage 3: quality floor and text length bounds.
        if post.quality_score < self.config.min_quality_score
            || post.text.len() < self.config.min_text_length
            || post.text.len() > self.config.max_text_length
        {
            return StageVerdict::Reject(RejectStage::Quality);
        }

        // Stage 4: composite relevance score.
        let score = self.scorer.score(post);
        if score.composite < self.config.accept_threshold {
            return StageVerdict::Reject(RejectStage::Relevance);
        }

        // Stage 5: geographic — only when a target set is configured.
        // Nearby metros count as matching when partial credit is enabled.
        if !self.config.target_metros.is_empty() {
            let matches_target = post
                .geo_tags
                .intersection(&self.config.target_metros)
                .next()
                .is_some();
            let matches_nearby = self.config.nearby_metro_credit > 0.0
                && post
                    .geo_tags
                    .intersection(&self.config.nearby_metros)
                    .next()
                    .is_some();
            if !matches_target && !matches_nearby {
                return StageVerdict::Reject(RejectStage::Geographic);
            }
        }

        StageVerdict::Pass(score)
    }

    /// Normalize and filter a batch of raw records, updating the ledger,
    /// duplicate clusters, and coverage counts.
    pub fn process(&self, records: &[RawRecord]) -> FilterStats {
        let mut stats = FilterStats::default();
        stats.received = records.len() as u32;

        let (posts, dropped) = self.normalizer.normalize_batch(records);
        stats.invalid = dropped;

        for post in posts {
            let record = self.ledger.upsert(post);
            // The ledger copy is canonical: a re-fetch of a known id keeps
            // the first normalization.
            let post = &record.post;

            match self.evaluate(post) {
                StageVerdict::Reject(stage) => {
                    record.compare_and_set(&PostStatus::Pending, PostStatus::Rejected { stage });
                    stats.bump_rejection(stage);
                }
                StageVerdict::Pass(score) => {
                    record.set_score(score);
                    let outcome = self.dedup.insert(post);

                    let mut representative = outcome.representative;
                    if representative == post.id {
                        if record.compare_and_set(&PostStatus::Pending, PostStatus::Accepted) {
                            self.coverage.record_accept(post);
                        }
                        // A concurrent batch may have merged in a better
                        // representative between the insert and the status
                        // transition; the cluster is the source of truth.
                        if let Some(cluster) = self.dedup.cluster(&post.id) {
                            representative = cluster.representative;
                        }
                    }

                    if representative == post.id {
                        stats.accepted += 1;
                    } else {
                        let demoted_self = record.compare_and_set(
                            &PostStatus::Accepted,
                            PostStatus::DuplicateOf {
                                representative: representative.clone(),
                            },
                        );
                        if demoted_self {
                            self.coverage.record_demotion(post);
                        }
                        record.compare_and_set(
                            &PostStatus::Pending,
                            PostStatus::DuplicateOf { representative },
                        );
                        stats.duplicates += 1;
                    }

                    for demotion in outcome.demoted {
                        let Some(demoted) = self.ledger.get(&demotion.post_id) else {
                            continue;
                        };
                        let took = demoted.compare_and_set(
                            &PostStatus::Accepted,
                            PostStatus::DuplicateOf {
                                representative: demotion.new_representative.clone(),
                            },
                        );
                        if took {
                            self.coverage.record_demotion(&demoted.post);
                            stats.demoted += 1;
                        }
                    }
                }
            }
        }

        info!(
            received = stats.received,
            invalid = stats.invalid,
            rejected = stats.rejected_total(),
            duplicates = stats.duplicates,
            accepted = stats.accepted,
            "filter batch complete"
        );
        stats
    }
}
