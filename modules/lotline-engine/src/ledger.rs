//! Post ledger — the audit set. Every normalized post ever seen by the
//! pipeline is retained here with its status and score; rejected and
//! duplicate posts are never deleted. Status transitions are
//! compare-and-set so a dedup demotion racing a filter decision cannot
//! lose an update.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use lotline_common::{Post, PostStatus};

use crate::score::RelevanceScore;

#[derive(Debug)]
pub struct PostRecord {
    pub post: Post,
    status: Mutex<PostStatus>,
    score: Mutex<Option<RelevanceScore>>,
}

impl PostRecord {
    fn new(post: Post) -> Self {
        Self {
            post,
            status: Mutex::new(PostStatus::Pending),
            score: Mutex::new(None),
        }
    }

    pub fn status(&self) -> PostStatus {
        self.status.lock().unwrap().clone()
    }

    pub fn score(&self) -> Option<RelevanceScore> {
        *self.score.lock().unwrap()
    }

    /// Transition status only if it currently equals `expected`.
    /// Returns whether the transition happened.
    pub fn compare_and_set(&self, expected: &PostStatus, next: PostStatus) -> bool {
        let mut status = self.status.lock().unwrap();
        if *status == *expected {
            *status = next;
            true
        } else {
            false
        }
    }

    pub(crate) fn set_score(&self, score: RelevanceScore) {
        *self.score.lock().unwrap() = Some(score);
    }
}

/// One row of the audit output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub subreddit: String,
    pub status: String,
    pub composite: Option<f64>,
}

#[derive(Debug, Default)]
pub struct PostLedger {
    records: RwLock<HashMap<String, Arc<PostRecord>>>,
}

impl PostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a post if its id is unseen; the first normalized copy wins so
    /// re-fetches of the same id cannot rewrite an immutable post.
    pub fn upsert(&self, post: Post) -> Arc<PostRecord> {
        if let Some(existing) = self.records.read().unwrap().get(&post.id) {
            return existing.clone();
        }
        let mut records = self.records.write().unwrap();
        records
            .entry(post.id.clone())
            .or_insert_with(|| Arc::new(PostRecord::new(post)))
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<PostRecord>> {
        self.records.read().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records currently accepted (cluster representatives).
    pub fn accepted(&self) -> Vec<Arc<PostRecord>> {
        let mut accepted: Vec<_> = self
            .records
            .read()
            .unwrap()
            .values()
            .filter(|r| r.status() == PostStatus::Accepted)
            .cloned()
            .collect();
        accepted.sort_by(|a, b| a.post.id.cmp(&b.post.id));
        accepted
    }

    /// Full audit snapshot, sorted by id for deterministic output.
    pub fn audit(&self) -> Vec<AuditEntry> {
        let mut entries: Vec<_> = self
            .records
            .read()
            .unwrap()
            .values()
            .map(|r| AuditEntry {
                id: r.post.id.clone(),
                subreddit: r.post.subreddit.clone(),
                status: r.status().to_string(),
                composite: r.score().map(|s| s.composite),
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }
}
