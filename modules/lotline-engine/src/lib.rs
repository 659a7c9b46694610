//! Reconciliation pipeline core: normalize raw post records, run them
//! through the fixed-order filter stages, deduplicate across collection
//! passes, and track per-(subreddit, window) coverage.
//!
//! Everything here is synchronous and stateless per call so any
//! orchestrator can drive it without session affinity; shared state lives
//! behind the ledger, deduplicator, and coverage tracker.

pub mod coverage;
pub mod dedup;
pub mod ledger;
pub mod normalize;
pub mod pipeline;
pub mod score;
mod similarity;
pub mod stats;

pub use coverage::{CoverageBucket, CoverageTracker};
pub use dedup::{ClusterView, DedupOutcome, Deduplicator, Demotion};
pub use ledger::{AuditEntry, PostLedger, PostRecord};
pub use normalize::{canonical_text, content_hash, Normalizer};
pub use pipeline::{FilterPipeline, StageVerdict};
pub use score::{RelevanceScore, RelevanceScorer};
pub use stats::FilterStats;
