//! Scheduler integration: gap-driven planning, prioritized execution,
//! retry exhaustion, and safe re-collection — all against in-process
//! collectors, no network.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use lotline_backfill::{BackfillScheduler, Collector, TaskStatus};
use lotline_common::{
    BackfillConfig, CoverageConfig, EpochSeconds, FilterConfig, RawRecord, SortStrategy,
};
use lotline_engine::{CoverageBucket, FilterPipeline};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn pipeline() -> Arc<FilterPipeline> {
    let config = FilterConfig::builder()
        .window_start(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .window_end(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap())
        .min_text_length(1)
        .build();
    Arc::new(FilterPipeline::new(config, CoverageConfig::default()).unwrap())
}

fn scheduler_config(sorts: Vec<SortStrategy>) -> BackfillConfig {
    BackfillConfig::builder()
        .workers(1)
        .max_attempts(3)
        .backoff_base_ms(1)
        .sort_strategies(sorts)
        .build()
}

fn record(id: &str, subreddit: &str, title: &str, epoch: i64) -> RawRecord {
    RawRecord {
        id: Some(id.to_string()),
        subreddit: Some(subreddit.to_string()),
        title: Some(title.to_string()),
        created_utc: Some(EpochSeconds::Int(epoch)),
        score: Some(10.0),
        ..Default::default()
    }
}

fn gap(subreddit: &str, window_start: DateTime<Utc>, ratio: f64) -> CoverageBucket {
    CoverageBucket {
        subreddit: subreddit.to_string(),
        window_start,
        window_end: window_start + Duration::days(1),
        expected_count: 10,
        actual_count: (10.0 * (1.0 - ratio)) as u64,
        gap_ratio: ratio,
    }
}

// 2024-01-01 00:00:00 UTC.
const JAN_1: i64 = 1_704_067_200;

/// Returns canned records per subreddit and remembers the call order.
struct ScriptedCollector {
    responses: Mutex<std::collections::HashMap<String, Vec<RawRecord>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedCollector {
    fn new(responses: Vec<(&str, Vec<RawRecord>)>) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_order(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Collector for ScriptedCollector {
    async fn collect(
        &self,
        subreddit: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _sort: SortStrategy,
    ) -> Result<Vec<RawRecord>> {
        self.calls.lock().unwrap().push(subreddit.to_string());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(subreddit)
            .cloned()
            .unwrap_or_default())
    }
}

/// Fails the first `failures` calls, then succeeds with `records`.
struct FlakyCollector {
    failures: u32,
    calls: AtomicU32,
    records: Vec<RawRecord>,
}

#[async_trait]
impl Collector for FlakyCollector {
    async fn collect(
        &self,
        _subreddit: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _sort: SortStrategy,
    ) -> Result<Vec<RawRecord>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(anyhow!("upstream actor timed out"))
        } else {
            Ok(self.records.clone())
        }
    }
}

#[tokio::test]
async fn backfill_closes_a_coverage_gap() {
    init_logging();
    let pipeline = pipeline();
    let window = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    pipeline.coverage().set_expected("nyc", window, 2);
    assert_eq!(pipeline.coverage().gaps().len(), 1);

    let collector = Arc::new(ScriptedCollector::new(vec![(
        "nyc",
        vec![
            record("a", "nyc", "Office tower sublease in the financial district", JAN_1),
            record("b", "nyc", "Warehouse with rail served cold storage", JAN_1 + 3_600),
        ],
    )]));
    let scheduler = BackfillScheduler::new(
        scheduler_config(vec![SortStrategy::New]),
        pipeline.clone(),
        collector,
    )
    .unwrap();

    let created = scheduler.plan(&pipeline.coverage().gaps());
    assert_eq!(created, 1);
    let report = scheduler.run().await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.posts_accepted, 2);
    let bucket = pipeline.coverage().bucket("nyc", window).unwrap();
    assert_eq!(bucket.actual_count, 2);
    assert!(pipeline.coverage().gaps().is_empty(), "gap closed");
}

#[tokio::test]
async fn wider_gaps_are_collected_first() {
    init_logging();
    let pipeline = pipeline();
    let collector = Arc::new(ScriptedCollector::new(vec![
        ("lowgap", Vec::new()),
        ("highgap", Vec::new()),
    ]));
    let scheduler = BackfillScheduler::new(
        scheduler_config(vec![SortStrategy::New]),
        pipeline,
        collector.clone(),
    )
    .unwrap();

    let window = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    // Planned low-priority first; execution order must still favor the
    // wider gap.
    scheduler.plan(&[gap("lowgap", window, 0.1), gap("highgap", window, 0.6)]);
    scheduler.run().await;

    assert_eq!(collector.call_order(), vec!["highgap", "lowgap"]);
}

#[tokio::test]
async fn collector_failures_exhaust_into_failed_state() {
    init_logging();
    let pipeline = pipeline();
    let collector = Arc::new(FlakyCollector {
        failures: u32::MAX,
        calls: AtomicU32::new(0),
        records: Vec::new(),
    });
    let scheduler = BackfillScheduler::new(
        scheduler_config(vec![SortStrategy::New]),
        pipeline,
        collector.clone(),
    )
    .unwrap();

    let window = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    scheduler.plan(&[gap("nyc", window, 0.6)]);
    let report = scheduler.run().await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 0);
    assert_eq!(
        collector.calls.load(Ordering::SeqCst),
        3,
        "exactly max_attempts collector calls, no further retries"
    );
    let task = &scheduler.tasks()[0];
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempt, 3);
    assert!(task.last_error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn transient_failure_retries_to_success() {
    init_logging();
    let pipeline = pipeline();
    let collector = Arc::new(FlakyCollector {
        failures: 1,
        calls: AtomicU32::new(0),
        records: vec![record("a", "nyc", "Office sublease near the park", JAN_1)],
    });
    let scheduler = BackfillScheduler::new(
        scheduler_config(vec![SortStrategy::New]),
        pipeline.clone(),
        collector,
    )
    .unwrap();

    let window = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    scheduler.plan(&[gap("nyc", window, 0.6)]);
    let report = scheduler.run().await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
    let task = &scheduler.tasks()[0];
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.attempt, 2, "one failure then one success");
    assert_eq!(pipeline.coverage().total_actual(), 1);
}

#[tokio::test]
async fn retriggering_a_succeeded_window_cannot_double_count() {
    init_logging();
    let pipeline = pipeline();
    let window = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    pipeline.coverage().set_expected("nyc", window, 4);

    let records = vec![
        record("a", "nyc", "Office tower sublease in the financial district", JAN_1),
        record("b", "nyc", "Warehouse with rail served cold storage", JAN_1 + 3_600),
    ];
    let collector = Arc::new(ScriptedCollector::new(vec![("nyc", records)]));
    let scheduler = BackfillScheduler::new(
        scheduler_config(vec![SortStrategy::New, SortStrategy::Top]),
        pipeline.clone(),
        collector,
    )
    .unwrap();

    // Both sort passes return the same posts; dedup collapses them.
    assert_eq!(scheduler.plan(&pipeline.coverage().gaps()), 2);
    scheduler.run().await;
    assert_eq!(pipeline.coverage().total_actual(), 2);

    // Manual re-trigger of the already-collected window.
    assert_eq!(
        scheduler.plan(&pipeline.coverage().gaps()),
        2,
        "terminal tasks do not block a manual re-trigger"
    );
    let report = scheduler.run().await;
    assert_eq!(report.succeeded, 4);
    assert_eq!(
        pipeline.coverage().total_actual(),
        2,
        "re-collection never double counts representatives"
    );
}
