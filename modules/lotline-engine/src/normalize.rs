//! Normalizer — the loose-input boundary. Raw collector records either
//! become a well-formed `Post` or fail with a validation error that is
//! counted and skipped, never fatal to the batch.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use lotline_common::lexicon::{default_metro_patterns, default_vertical_lexicon};
use lotline_common::{LotlineError, Post, RawRecord, VerticalCategory};

/// Canonical form used for hashing and term matching: lowercased,
/// punctuation replaced by spaces, whitespace collapsed.
pub fn canonical_text(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex SHA-256 over the canonical form of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_text(text).as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug)]
pub struct Normalizer {
    metro_patterns: BTreeMap<String, Vec<String>>,
    vertical_lexicon: BTreeMap<VerticalCategory, Vec<String>>,
    markup: Regex,
}

impl Normalizer {
    pub fn new(
        metro_patterns: BTreeMap<String, Vec<String>>,
        vertical_lexicon: BTreeMap<VerticalCategory, Vec<String>>,
    ) -> Self {
        Self {
            metro_patterns,
            vertical_lexicon,
            markup: Regex::new(r"<[^>]+>").expect("static markup pattern"),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_metro_patterns(), default_vertical_lexicon())
    }

    /// Normalize one raw record. Missing/blank id or subreddit, or a
    /// missing/unparseable timestamp, is a validation error.
    pub fn normalize(&self, raw: &RawRecord) -> Result<Post, LotlineError> {
        let id = required_str(raw.id.as_deref(), "id")?;
        let subreddit = required_str(raw.subreddit.as_deref(), "subreddit")?.to_lowercase();
        let created_at = raw
            .created_utc
            .as_ref()
            .ok_or_else(|| LotlineError::Validation("missing created_utc".to_string()))?
            .to_datetime()
            .ok_or_else(|| LotlineError::Validation("unparseable created_utc".to_string()))?;

        let title = raw.title.as_deref().unwrap_or("");
        let body = raw.selftext.as_deref().unwrap_or("");
        let combined = format!("{title} {body}");
        let stripped = self.markup.replace_all(&combined, " ");
        let text = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

        let canonical = canonical_text(&text);
        let quality_score = raw.score.unwrap_or(0.0).max(0.0);

        Ok(Post {
            content_hash: content_hash(&text),
            geo_tags: self.geo_tags(&subreddit, &canonical),
            vertical_tags: self.vertical_tags(&canonical),
            id: id.to_string(),
            subreddit,
            text,
            created_at,
            quality_score,
        })
    }

    /// Normalize a batch, dropping and counting malformed records.
    pub fn normalize_batch(&self, raws: &[RawRecord]) -> (Vec<Post>, u32) {
        let mut posts = Vec::with_capacity(raws.len());
        let mut dropped = 0u32;
        for raw in raws {
            match self.normalize(raw) {
                Ok(post) => posts.push(post),
                Err(e) => {
                    dropped += 1;
                    debug!(id = raw.id.as_deref().unwrap_or("<none>"), error = %e, "dropped malformed record");
                }
            }
        }
        (posts, dropped)
    }

    fn geo_tags(&self, subreddit: &str, canonical: &str) -> BTreeSet<String> {
        self.metro_patterns
            .iter()
            .filter(|(_, patterns)| {
                patterns
                    .iter()
                    .any(|p| subreddit.contains(p.as_str()) || canonical.contains(p.as_str()))
            })
            .map(|(metro, _)| metro.clone())
            .collect()
    }

    fn vertical_tags(&self, canonical: &str) -> BTreeSet<String> {
        self.vertical_lexicon
            .iter()
            .filter(|(_, terms)| terms.iter().any(|t| canonical.contains(t.as_str())))
            .map(|(vertical, _)| vertical.to_string())
            .collect()
    }
}

fn required_str<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, LotlineError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim()),
        _ => Err(LotlineError::Validation(format!("missing {field}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotline_common::EpochSeconds;

    fn raw(id: &str, subreddit: &str, title: &str, body: &str) -> RawRecord {
        RawRecord {
            id: Some(id.to_string()),
            subreddit: Some(subreddit.to_string()),
            title: Some(title.to_string()),
            selftext: Some(body.to_string()),
            created_utc: Some(EpochSeconds::Int(1_704_067_200)),
            score: Some(12.0),
            ..Default::default()
        }
    }

    #[test]
    fn canonical_text_strips_punctuation_and_case() {
        assert_eq!(
            canonical_text("Office,  for-LEASE!  Downtown."),
            "office for lease downtown"
        );
    }

    #[test]
    fn content_hash_is_case_and_punctuation_insensitive() {
        assert_eq!(
            content_hash("Office for lease, downtown"),
            content_hash("office FOR lease downtown!!")
        );
    }

    #[test]
    fn content_hash_differs_for_different_text() {
        assert_ne!(content_hash("office lease"), content_hash("retail lease"));
    }

    #[test]
    fn missing_id_is_validation_error() {
        let mut record = raw("x", "nyc", "t", "b");
        record.id = None;
        let err = Normalizer::with_defaults().normalize(&record).unwrap_err();
        assert!(matches!(err, LotlineError::Validation(_)));
    }

    #[test]
    fn blank_subreddit_is_validation_error() {
        let mut record = raw("x", "  ", "t", "b");
        record.subreddit = Some("  ".to_string());
        assert!(Normalizer::with_defaults().normalize(&record).is_err());
    }

    #[test]
    fn missing_timestamp_is_validation_error() {
        let mut record = raw("x", "nyc", "t", "b");
        record.created_utc = None;
        assert!(Normalizer::with_defaults().normalize(&record).is_err());
    }

    #[test]
    fn unparseable_timestamp_is_validation_error() {
        let mut record = raw("x", "nyc", "t", "b");
        record.created_utc = Some(EpochSeconds::Text("last tuesday".to_string()));
        assert!(Normalizer::with_defaults().normalize(&record).is_err());
    }

    #[test]
    fn markup_stripped_and_whitespace_collapsed() {
        let record = raw("x", "nyc", "Office <b>sublease</b>", "great\n\n  views");
        let post = Normalizer::with_defaults().normalize(&record).unwrap();
        assert_eq!(post.text, "Office sublease great views");
    }

    #[test]
    fn display_casing_retained() {
        let record = raw("x", "nyc", "Office For Lease", "");
        let post = Normalizer::with_defaults().normalize(&record).unwrap();
        assert!(post.text.contains("Office For Lease"));
    }

    #[test]
    fn subreddit_pattern_drives_geo_tags() {
        let record = raw("x", "Brooklyn", "Retail space available", "");
        let post = Normalizer::with_defaults().normalize(&record).unwrap();
        assert!(post.geo_tags.contains("nyc"));
    }

    #[test]
    fn text_mention_drives_geo_tags() {
        let record = raw("x", "commercialrealestate", "Sublease in Oakland", "");
        let post = Normalizer::with_defaults().normalize(&record).unwrap();
        assert!(post.geo_tags.contains("sf"));
    }

    #[test]
    fn vertical_lexicon_tags_text() {
        let record = raw("x", "nyc", "Class A sublease", "warehouse with loading dock");
        let post = Normalizer::with_defaults().normalize(&record).unwrap();
        assert!(post.vertical_tags.contains("office"));
        assert!(post.vertical_tags.contains("industrial"));
    }

    #[test]
    fn hyphenated_terms_match_canonicalized_lexicon() {
        let record = raw("x", "nyc", "Drive-thru pad available", "");
        let post = Normalizer::with_defaults().normalize(&record).unwrap();
        assert!(post.vertical_tags.contains("retail"));
    }

    #[test]
    fn negative_score_clamps_to_zero() {
        let mut record = raw("x", "nyc", "t", "b");
        record.score = Some(-4.0);
        let post = Normalizer::with_defaults().normalize(&record).unwrap();
        assert_eq!(post.quality_score, 0.0);
    }

    #[test]
    fn batch_counts_dropped_records() {
        let mut bad = raw("x", "nyc", "t", "b");
        bad.created_utc = None;
        let records = vec![raw("a", "nyc", "t", "b"), bad, raw("c", "nyc", "t", "b")];
        let (posts, dropped) = Normalizer::with_defaults().normalize_batch(&records);
        assert_eq!(posts.len(), 2);
        assert_eq!(dropped, 1);
    }
}
