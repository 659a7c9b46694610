use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use lotline_common::{RawRecord, SortStrategy};

/// The external re-collection interface — the only operation in the
/// pipeline that blocks on network I/O. Implementations wrap whatever
/// scraping actor or API client the deployment uses.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Fetch raw posts for a subreddit over a window using one sort mode.
    async fn collect(
        &self,
        subreddit: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        sort: SortStrategy,
    ) -> Result<Vec<RawRecord>>;
}
