//! Coverage tracking: expected-vs-actual accepted-representative counts per
//! (subreddit, fixed-width time window). Per-bucket atomic counters keep
//! updates to different buckets contention-free; the map itself is
//! read-mostly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use lotline_common::{CoverageConfig, Post};

#[derive(Debug)]
struct BucketCell {
    expected: AtomicU64,
    actual: AtomicI64,
}

/// One (subreddit, window) coverage cell as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageBucket {
    pub subreddit: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub expected_count: u64,
    pub actual_count: u64,
    pub gap_ratio: f64,
}

#[derive(Debug)]
pub struct CoverageTracker {
    bucket_width_secs: i64,
    gap_threshold: f64,
    buckets: RwLock<HashMap<(String, i64), Arc<BucketCell>>>,
}

impl CoverageTracker {
    pub fn new(config: CoverageConfig) -> Self {
        Self {
            bucket_width_secs: config.bucket_width_secs,
            gap_threshold: config.gap_threshold,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Floor a timestamp to its window start (epoch seconds).
    fn align(&self, at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(self.bucket_width_secs) * self.bucket_width_secs
    }

    fn cell(&self, subreddit: &str, window_start: i64) -> Arc<BucketCell> {
        let key = (subreddit.to_string(), window_start);
        if let Some(cell) = self.buckets.read().unwrap().get(&key) {
            return cell.clone();
        }
        let mut buckets = self.buckets.write().unwrap();
        buckets
            .entry(key)
            .or_insert_with(|| {
                Arc::new(BucketCell {
                    expected: AtomicU64::new(0),
                    actual: AtomicI64::new(0),
                })
            })
            .clone()
    }

    /// Record the externally-supplied baseline for a window. Materializes
    /// the bucket so an entirely-missed window still shows up as a gap.
    pub fn set_expected(&self, subreddit: &str, window_start: DateTime<Utc>, expected: u64) {
        let aligned = self.align(window_start);
        self.cell(subreddit, aligned)
            .expected
            .store(expected, Ordering::Relaxed);
    }

    /// A post became an accepted representative.
    pub(crate) fn record_accept(&self, post: &Post) {
        let aligned = self.align(post.created_at);
        self.cell(&post.subreddit, aligned)
            .actual
            .fetch_add(1, Ordering::Relaxed);
        debug!(subreddit = %post.subreddit, window_start = aligned, "coverage increment");
    }

    /// A previously-accepted representative was demoted by a cluster merge.
    pub(crate) fn record_demotion(&self, post: &Post) {
        let aligned = self.align(post.created_at);
        self.cell(&post.subreddit, aligned)
            .actual
            .fetch_sub(1, Ordering::Relaxed);
        debug!(subreddit = %post.subreddit, window_start = aligned, "coverage decrement");
    }

    fn to_bucket(&self, key: &(String, i64), cell: &BucketCell) -> CoverageBucket {
        let expected = cell.expected.load(Ordering::Relaxed);
        let actual = cell.actual.load(Ordering::Relaxed).max(0) as u64;
        let gap_ratio = if expected == 0 {
            0.0
        } else {
            (1.0 - actual as f64 / expected as f64).max(0.0)
        };
        let window_start = DateTime::from_timestamp(key.1, 0).expect("aligned window start");
        CoverageBucket {
            subreddit: key.0.clone(),
            window_start,
            window_end: window_start + Duration::seconds(self.bucket_width_secs),
            expected_count: expected,
            actual_count: actual,
            gap_ratio,
        }
    }

    /// The bucket a timestamp falls into, if it exists yet.
    pub fn bucket(&self, subreddit: &str, at: DateTime<Utc>) -> Option<CoverageBucket> {
        let key = (subreddit.to_string(), self.align(at));
        let buckets = self.buckets.read().unwrap();
        buckets.get(&key).map(|cell| self.to_bucket(&key, cell))
    }

    /// Full coverage table, sorted by subreddit then window.
    pub fn snapshot(&self) -> Vec<CoverageBucket> {
        let buckets = self.buckets.read().unwrap();
        let mut all: Vec<CoverageBucket> = buckets
            .iter()
            .map(|(key, cell)| self.to_bucket(key, cell))
            .collect();
        all.sort_by(|a, b| {
            a.subreddit
                .cmp(&b.subreddit)
                .then_with(|| a.window_start.cmp(&b.window_start))
        });
        all
    }

    /// Buckets whose gap ratio exceeds the configured threshold, ordered by
    /// descending gap ratio then ascending window start.
    pub fn gaps(&self) -> Vec<CoverageBucket> {
        let mut gaps: Vec<CoverageBucket> = self
            .snapshot()
            .into_iter()
            .filter(|b| b.gap_ratio > self.gap_threshold)
            .collect();
        gaps.sort_by(|a, b| {
            b.gap_ratio
                .total_cmp(&a.gap_ratio)
                .then_with(|| a.window_start.cmp(&b.window_start))
                .then_with(|| a.subreddit.cmp(&b.subreddit))
        });
        gaps
    }

    /// Total accepted representatives across all buckets. Conserved by
    /// cluster merges (a demotion in one bucket pairs with an acceptance in
    /// another or the same).
    pub fn total_actual(&self) -> u64 {
        self.buckets
            .read()
            .unwrap()
            .values()
            .map(|c| c.actual.load(Ordering::Relaxed).max(0) as u64)
            .sum()
    }
}
