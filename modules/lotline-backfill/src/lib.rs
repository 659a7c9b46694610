//! Backfill scheduling: turns coverage gaps into prioritized, rate-limited
//! re-collection tasks and re-feeds collected records through the filter
//! pipeline. The external collector sits behind one async trait so tests
//! run against in-process mocks.

pub mod collector;
pub mod scheduler;
pub mod task;

pub use collector::Collector;
pub use scheduler::{BackfillRunReport, BackfillScheduler};
pub use task::{BackfillTask, TaskStatus};
