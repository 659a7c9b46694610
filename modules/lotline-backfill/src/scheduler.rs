//! BackfillScheduler — a bounded worker pool over an explicit task queue.
//!
//! Each task is a finite state machine (`Pending → Running → Succeeded /
//! Failed`, with `Running → Pending` on transient failure) rather than a
//! long-lived retry loop, so cancellation and testing stay tractable.
//! Workers pull pending tasks by priority (gap ratio, then earliest
//! window), call the collector, and re-feed results through the filter
//! pipeline; the deduplicator makes re-collection of an already-covered
//! window safe.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use lotline_common::BackfillConfig;
use lotline_engine::{CoverageBucket, FilterPipeline};

use crate::collector::Collector;
use crate::task::{BackfillTask, TaskStatus};

/// Poll interval while waiting on running peers or backoff timers.
const IDLE_WAIT_MS: u64 = 10;

struct QueueEntry {
    task_id: Uuid,
    /// Earliest eligibility time; pushed into the future by retry backoff.
    not_before: DateTime<Utc>,
}

#[derive(Default)]
struct SchedulerState {
    tasks: HashMap<Uuid, BackfillTask>,
    queue: Vec<QueueEntry>,
    running: usize,
    records_collected: u64,
    posts_accepted: u64,
}

enum Next {
    Run(BackfillTask),
    Wait(u64),
    Done,
}

/// Summary of one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackfillRunReport {
    pub succeeded: u32,
    pub failed: u32,
    /// Tasks never attempted (drained by cancellation).
    pub pending_remaining: u32,
    pub records_collected: u64,
    pub posts_accepted: u64,
}

pub struct BackfillScheduler {
    config: BackfillConfig,
    pipeline: Arc<FilterPipeline>,
    collector: Arc<dyn Collector>,
    state: Mutex<SchedulerState>,
    cancelled: AtomicBool,
}

/// Deterministic execution order: highest gap ratio first, then earliest
/// window, then subreddit and sort for a total order.
fn task_order(a: &BackfillTask, b: &BackfillTask) -> CmpOrdering {
    b.priority
        .total_cmp(&a.priority)
        .then_with(|| a.window_start.cmp(&b.window_start))
        .then_with(|| a.subreddit.cmp(&b.subreddit))
        .then_with(|| a.sort.cmp(&b.sort))
}

impl BackfillScheduler {
    pub fn new(
        config: BackfillConfig,
        pipeline: Arc<FilterPipeline>,
        collector: Arc<dyn Collector>,
    ) -> Result<Self, lotline_common::LotlineError> {
        config.validate()?;
        Ok(Self {
            config,
            pipeline,
            collector,
            state: Mutex::new(SchedulerState::default()),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Spawn pending tasks for coverage gaps: one per (subreddit, window,
    /// sort) cell not already pending or running. Terminal tasks do not
    /// block re-planning — re-collecting a covered window is safe.
    /// Returns the number of tasks created.
    pub fn plan(&self, gaps: &[CoverageBucket]) -> usize {
        let mut state = self.state.lock().unwrap();
        let mut created = 0;
        for gap in gaps {
            for sort in &self.config.sort_strategies {
                let occupied = state.tasks.values().any(|t| {
                    t.cell() == (gap.subreddit.as_str(), gap.window_start, *sort)
                        && !t.status.is_terminal()
                });
                if occupied {
                    continue;
                }
                let task = BackfillTask {
                    id: Uuid::new_v4(),
                    subreddit: gap.subreddit.clone(),
                    window_start: gap.window_start,
                    window_end: gap.window_end,
                    sort: *sort,
                    priority: gap.gap_ratio,
                    attempt: 0,
                    status: TaskStatus::Pending,
                    last_error: None,
                };
                state.queue.push(QueueEntry {
                    task_id: task.id,
                    not_before: DateTime::<Utc>::MIN_UTC,
                });
                state.tasks.insert(task.id, task);
                created += 1;
            }
        }
        if created > 0 {
            info!(created, "planned backfill tasks");
        }
        created
    }

    /// Run the worker pool until the queue drains (all tasks terminal or
    /// backoff-exhausted) or the run is cancelled.
    pub async fn run(&self) -> BackfillRunReport {
        let workers = self.config.workers.max(1);
        let loops: Vec<_> = (0..workers).map(|_| self.worker()).collect();
        futures::future::join_all(loops).await;
        self.report()
    }

    /// Cancel the run: drains all pending tasks from the queue. In-flight
    /// running tasks finish naturally.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap();
        let drained = state.queue.len();
        state.queue.clear();
        info!(drained, "backfill run cancelled");
    }

    /// Cancel a single task. Only pending tasks can be cancelled; returns
    /// whether the task was removed from the queue.
    pub fn cancel_task(&self, task_id: Uuid) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.queue.len();
        state.queue.retain(|e| e.task_id != task_id);
        state.queue.len() < before
    }

    /// Snapshot of all tasks, sorted for deterministic output.
    pub fn tasks(&self) -> Vec<BackfillTask> {
        let state = self.state.lock().unwrap();
        let mut tasks: Vec<_> = state.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| task_order(a, b).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    pub fn report(&self) -> BackfillRunReport {
        let state = self.state.lock().unwrap();
        let mut report = BackfillRunReport {
            records_collected: state.records_collected,
            posts_accepted: state.posts_accepted,
            ..Default::default()
        };
        for task in state.tasks.values() {
            match task.status {
                TaskStatus::Succeeded => report.succeeded += 1,
                TaskStatus::Failed => report.failed += 1,
                TaskStatus::Pending => report.pending_remaining += 1,
                TaskStatus::Running => {}
            }
        }
        report
    }

    async fn worker(&self) {
        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }
            match self.next_action() {
                Next::Run(task) => self.execute(task).await,
                Next::Wait(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                Next::Done => break,
            }
        }
    }

    /// Pop the best eligible pending task, or decide to wait/finish.
    fn next_action(&self) -> Next {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        if state.queue.is_empty() {
            return if state.running == 0 {
                Next::Done
            } else {
                Next::Wait(IDLE_WAIT_MS)
            };
        }

        let mut best: Option<usize> = None;
        for i in 0..state.queue.len() {
            if state.queue[i].not_before > now {
                continue;
            }
            best = match best {
                None => Some(i),
                Some(j) => {
                    let a = &state.tasks[&state.queue[i].task_id];
                    let b = &state.tasks[&state.queue[j].task_id];
                    if task_order(a, b) == CmpOrdering::Less {
                        Some(i)
                    } else {
                        Some(j)
                    }
                }
            };
        }

        match best {
            Some(i) => {
                let entry = state.queue.remove(i);
                state.running += 1;
                let task = state
                    .tasks
                    .get_mut(&entry.task_id)
                    .expect("queued task exists");
                task.status = TaskStatus::Running;
                Next::Run(task.clone())
            }
            None => {
                // Everything queued is in backoff; wait for the earliest.
                let earliest = state
                    .queue
                    .iter()
                    .map(|e| e.not_before)
                    .min()
                    .expect("non-empty queue");
                let wait = (earliest - now)
                    .num_milliseconds()
                    .clamp(1, IDLE_WAIT_MS as i64 * 10) as u64;
                Next::Wait(wait)
            }
        }
    }

    async fn execute(&self, task: BackfillTask) {
        info!(
            task_id = %task.id,
            subreddit = %task.subreddit,
            sort = %task.sort,
            attempt = task.attempt + 1,
            "backfill task started"
        );
        let result = self
            .collector
            .collect(&task.subreddit, task.window_start, task.window_end, task.sort)
            .await;

        match result {
            Ok(records) => {
                let stats = self.pipeline.process(&records);
                let mut state = self.state.lock().unwrap();
                state.running -= 1;
                state.records_collected += records.len() as u64;
                state.posts_accepted += stats.accepted as u64;
                if let Some(t) = state.tasks.get_mut(&task.id) {
                    t.attempt += 1;
                    t.status = TaskStatus::Succeeded;
                }
                info!(
                    task_id = %task.id,
                    collected = records.len(),
                    accepted = stats.accepted,
                    "backfill task succeeded"
                );
            }
            Err(e) => {
                let mut state = self.state.lock().unwrap();
                state.running -= 1;
                let Some(t) = state.tasks.get_mut(&task.id) else {
                    return;
                };
                t.attempt += 1;
                t.last_error = Some(e.to_string());
                let retry = t.attempt < self.config.max_attempts;
                t.status = if retry {
                    TaskStatus::Pending
                } else {
                    TaskStatus::Failed
                };
                let attempt = t.attempt;
                if retry {
                    let delay_ms = self
                        .config
                        .backoff_base_ms
                        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
                    warn!(
                        task_id = %task.id,
                        attempt,
                        delay_ms,
                        error = %e,
                        "backfill task failed, will retry"
                    );
                    state.queue.push(QueueEntry {
                        task_id: task.id,
                        not_before: Utc::now() + ChronoDuration::milliseconds(delay_ms as i64),
                    });
                } else {
                    warn!(
                        task_id = %task.id,
                        attempts = attempt,
                        error = %e,
                        "backfill task failed permanently"
                    );
                }
            }
        }
    }
}
