use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Collection enums ---

/// Reddit listing sort modes used by collection passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortStrategy {
    New,
    Relevance,
    Top,
    Hot,
}

impl std::fmt::Display for SortStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortStrategy::New => write!(f, "new"),
            SortStrategy::Relevance => write!(f, "relevance"),
            SortStrategy::Top => write!(f, "top"),
            SortStrategy::Hot => write!(f, "hot"),
        }
    }
}

/// CRE sector verticals recognized by the normalizer's tagging lexicons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalCategory {
    Office,
    Retail,
    Industrial,
    Multifamily,
    Hospitality,
    MixedUse,
}

impl VerticalCategory {
    pub fn all() -> [VerticalCategory; 6] {
        [
            VerticalCategory::Office,
            VerticalCategory::Retail,
            VerticalCategory::Industrial,
            VerticalCategory::Multifamily,
            VerticalCategory::Hospitality,
            VerticalCategory::MixedUse,
        ]
    }
}

impl std::fmt::Display for VerticalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerticalCategory::Office => write!(f, "office"),
            VerticalCategory::Retail => write!(f, "retail"),
            VerticalCategory::Industrial => write!(f, "industrial"),
            VerticalCategory::Multifamily => write!(f, "multifamily"),
            VerticalCategory::Hospitality => write!(f, "hospitality"),
            VerticalCategory::MixedUse => write!(f, "mixed_use"),
        }
    }
}

// --- Raw input boundary ---

/// Timestamp as delivered by collectors: epoch seconds as an integer, a
/// float, or a numeric string. Anything else fails to parse and the record
/// is rejected at the normalizer boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EpochSeconds {
    Int(i64),
    Float(f64),
    Text(String),
}

impl EpochSeconds {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = match self {
            EpochSeconds::Int(s) => *s,
            EpochSeconds::Float(s) if s.is_finite() => *s as i64,
            EpochSeconds::Float(_) => return None,
            EpochSeconds::Text(s) => {
                let parsed: f64 = s.trim().parse().ok()?;
                if !parsed.is_finite() {
                    return None;
                }
                parsed as i64
            }
        };
        DateTime::from_timestamp(secs, 0)
    }
}

/// A loosely-typed post record as delivered by the collection layer.
/// Every field is optional; the normalizer enforces the required-field
/// contract and drops anything that fails it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub subreddit: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub selftext: Option<String>,
    #[serde(default)]
    pub created_utc: Option<EpochSeconds>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub num_comments: Option<u32>,
}

impl RawRecord {
    /// Parse one line of collector JSONL output. Unknown fields are ignored.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

// --- Post lifecycle ---

/// The pipeline stage that rejected a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectStage {
    Temporal,
    Keyword,
    Quality,
    Relevance,
    Geographic,
}

impl RejectStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectStage::Temporal => "temporal",
            RejectStage::Keyword => "keyword",
            RejectStage::Quality => "quality",
            RejectStage::Relevance => "relevance",
            RejectStage::Geographic => "geographic",
        }
    }
}

impl std::fmt::Display for RejectStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Post status, the only mutable field after normalization. Rejected and
/// duplicate posts are retained with their reason for auditability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PostStatus {
    Pending,
    Accepted,
    Rejected { stage: RejectStage },
    DuplicateOf { representative: String },
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostStatus::Pending => write!(f, "pending"),
            PostStatus::Accepted => write!(f, "accepted"),
            PostStatus::Rejected { stage } => write!(f, "rejected:{stage}"),
            PostStatus::DuplicateOf { representative } => {
                write!(f, "duplicate-of:{representative}")
            }
        }
    }
}

// --- Normalized post ---

/// One normalized post. Immutable after normalization; status lives on the
/// ledger record so the post itself can be shared freely across stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Source-assigned id, globally unique per source. The same id arriving
    /// again (another collection pass) is a literal re-fetch.
    pub id: String,
    pub subreddit: String,
    /// Title + body, markup stripped, whitespace collapsed, display casing.
    pub text: String,
    /// Hex SHA-256 over the canonicalized (lowercased, punctuation-stripped)
    /// text. Identical hashes mean verbatim reposts.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    /// Upstream engagement signal (e.g. upvotes). Never negative.
    pub quality_score: f64,
    /// Metro identifiers matched from the configured geo patterns.
    pub geo_tags: BTreeSet<String>,
    /// CRE sector identifiers matched from the vertical lexicons.
    pub vertical_tags: BTreeSet<String>,
}
