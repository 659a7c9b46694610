//! Deduplicator — union-find over post ids with three match strategies:
//! exact id (literal re-fetch), exact content hash (verbatim repost), and
//! fuzzy token-frequency cosine against cluster representatives only.
//!
//! All merge state sits behind one mutex so concurrent batches observe a
//! linearized merge order and two near-duplicate posts can never both end
//! up as representatives.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use lotline_common::Post;

use crate::similarity::{cosine, term_vector};

/// Tie-break identity of a cluster representative.
#[derive(Debug, Clone)]
struct RepKey {
    id: String,
    quality: f64,
    created_at: DateTime<Utc>,
}

impl RepKey {
    fn of(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            quality: post.quality_score,
            created_at: post.created_at,
        }
    }
}

/// Deterministic representative ordering: highest quality, then earliest
/// creation, then smallest id. The minimum under this ordering wins.
fn rep_order(a: &RepKey, b: &RepKey) -> Ordering {
    b.quality
        .total_cmp(&a.quality)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug)]
struct RootInfo {
    rep: RepKey,
    /// Token-frequency vector of the representative, used for fuzzy matching
    /// against incoming posts.
    vector: HashMap<String, f64>,
    members: Vec<String>,
}

#[derive(Debug, Default)]
struct DedupState {
    parent: HashMap<String, String>,
    rank: HashMap<String, u32>,
    /// Root id → cluster info. Only roots appear here.
    roots: HashMap<String, RootInfo>,
    /// Content hash → first member post id carrying it.
    by_hash: HashMap<String, String>,
}

impl DedupState {
    fn find(&mut self, id: &str) -> String {
        let mut root = id.to_string();
        while let Some(p) = self.parent.get(&root) {
            if *p == root {
                break;
            }
            root = p.clone();
        }
        // Path compression.
        let mut cursor = id.to_string();
        while cursor != root {
            let next = self.parent[&cursor].clone();
            self.parent.insert(cursor, root.clone());
            cursor = next;
        }
        root
    }

    /// Merge two distinct roots. Returns the surviving root id; the losing
    /// representative (if any) is appended to `losing_reps`.
    fn union(&mut self, a: String, b: String, losing_reps: &mut Vec<String>) -> String {
        let rank_a = *self.rank.get(&a).unwrap_or(&0);
        let rank_b = *self.rank.get(&b).unwrap_or(&0);
        let (winner, loser) = if rank_a >= rank_b { (a, b) } else { (b, a) };
        if rank_a == rank_b {
            *self.rank.entry(winner.clone()).or_insert(0) += 1;
        }
        self.parent.insert(loser.clone(), winner.clone());

        let info_w = self.roots.remove(&winner).expect("winner root info");
        let info_l = self.roots.remove(&loser).expect("loser root info");
        let (kept, lost) = if rep_order(&info_w.rep, &info_l.rep) == Ordering::Greater {
            (info_l, info_w)
        } else {
            (info_w, info_l)
        };
        losing_reps.push(lost.rep.id.clone());

        let mut members = kept.members;
        members.extend(lost.members);
        self.roots.insert(
            winner.clone(),
            RootInfo {
                rep: kept.rep,
                vector: kept.vector,
                members,
            },
        );
        winner
    }
}

/// A post demoted from representative status by a cluster merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demotion {
    pub post_id: String,
    pub new_representative: String,
}

/// Result of routing one post through the deduplicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupOutcome {
    /// Representative of the post's cluster after all merges.
    pub representative: String,
    /// Previously-representative posts that lost that status.
    pub demoted: Vec<Demotion>,
}

/// Snapshot view of one duplicate cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterView {
    pub representative: String,
    pub members: Vec<String>,
}

#[derive(Debug)]
pub struct Deduplicator {
    similarity_threshold: f64,
    state: Mutex<DedupState>,
}

impl Deduplicator {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
            state: Mutex::new(DedupState::default()),
        }
    }

    /// Route a post into its cluster, merging clusters as needed, and
    /// report the resulting representative plus any demotions.
    ///
    /// Deterministic: re-inserting a known id is a no-op returning the
    /// current representative.
    pub fn insert(&self, post: &Post) -> DedupOutcome {
        let vector = term_vector(&post.text);
        let mut state = self.state.lock().unwrap();

        // Strategy 1: exact id — literal re-fetch of a known post.
        if state.parent.contains_key(&post.id) {
            let root = state.find(&post.id);
            let representative = state.roots[&root].rep.id.clone();
            return DedupOutcome {
                representative,
                demoted: Vec::new(),
            };
        }

        state.parent.insert(post.id.clone(), post.id.clone());
        state.roots.insert(
            post.id.clone(),
            RootInfo {
                rep: RepKey::of(post),
                vector: vector.clone(),
                members: vec![post.id.clone()],
            },
        );

        // Strategy 2: exact content hash.
        let mut candidates: Vec<String> = Vec::new();
        if let Some(anchor) = state.by_hash.get(&post.content_hash).cloned() {
            candidates.push(anchor);
        }

        // Strategy 3: fuzzy similarity against representatives only.
        for (root, info) in state.roots.iter() {
            if *root == post.id {
                continue;
            }
            if cosine(&vector, &info.vector) >= self.similarity_threshold {
                candidates.push(root.clone());
            }
        }

        let mut losing_reps = Vec::new();
        let mut current = post.id.clone();
        for candidate in candidates {
            let candidate_root = state.find(&candidate);
            let current_root = state.find(&current);
            if candidate_root == current_root {
                continue;
            }
            current = state.union(current_root, candidate_root, &mut losing_reps);
        }

        state
            .by_hash
            .entry(post.content_hash.clone())
            .or_insert_with(|| post.id.clone());

        let root = state.find(&post.id);
        let representative = state.roots[&root].rep.id.clone();
        let demoted: Vec<Demotion> = losing_reps
            .into_iter()
            .filter(|id| *id != post.id)
            .map(|post_id| Demotion {
                post_id,
                new_representative: representative.clone(),
            })
            .collect();

        if !demoted.is_empty() {
            debug!(
                post = %post.id,
                representative = %representative,
                demoted = demoted.len(),
                "cluster merge demoted representatives"
            );
        }

        DedupOutcome {
            representative,
            demoted,
        }
    }

    /// Cluster containing `id`, if the id has been seen.
    pub fn cluster(&self, id: &str) -> Option<ClusterView> {
        let mut state = self.state.lock().unwrap();
        if !state.parent.contains_key(id) {
            return None;
        }
        let root = state.find(id);
        let info = &state.roots[&root];
        let mut members = info.members.clone();
        members.sort();
        Some(ClusterView {
            representative: info.rep.id.clone(),
            members,
        })
    }

    /// All clusters, sorted by representative id.
    pub fn clusters(&self) -> Vec<ClusterView> {
        let state = self.state.lock().unwrap();
        let mut views: Vec<ClusterView> = state
            .roots
            .values()
            .map(|info| {
                let mut members = info.members.clone();
                members.sort();
                ClusterView {
                    representative: info.rep.id.clone(),
                    members,
                }
            })
            .collect();
        views.sort_by(|a, b| a.representative.cmp(&b.representative));
        views
    }
}
