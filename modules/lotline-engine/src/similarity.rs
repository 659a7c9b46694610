//! Sparse token-frequency vectors and cosine similarity. Used by the fuzzy
//! dedup strategy and the semantic relevance sub-signal.

use std::collections::HashMap;

use crate::normalize::canonical_text;

/// Token-frequency vector over the canonical form of `text`.
pub(crate) fn term_vector(text: &str) -> HashMap<String, f64> {
    let mut vector = HashMap::new();
    for token in canonical_text(text).split_whitespace() {
        *vector.entry(token.to_string()).or_insert(0.0) += 1.0;
    }
    vector
}

pub(crate) fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    // Iterate the smaller map against the larger one.
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(token, w)| large.get(token).map(|v| w * v))
        .sum();
    let norm_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
