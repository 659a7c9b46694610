//! Default tagging lexicons: metro subreddit/text patterns and per-vertical
//! CRE term lists. Deployments override these through the normalizer
//! constructor; the defaults cover the four launch metros.

use std::collections::BTreeMap;

use crate::types::VerticalCategory;

/// Metro identifier → lowercase patterns matched against subreddit names and
/// post text.
pub fn default_metro_patterns() -> BTreeMap<String, Vec<String>> {
    let mut metros = BTreeMap::new();
    metros.insert(
        "nyc".to_string(),
        strings(&["nyc", "newyork", "manhattan", "brooklyn", "queens"]),
    );
    metros.insert(
        "sf".to_string(),
        strings(&["sanfrancisco", "bayarea", "sf", "oakland"]),
    );
    metros.insert(
        "chicago".to_string(),
        strings(&["chicago", "chicagoland"]),
    );
    metros.insert(
        "la".to_string(),
        strings(&["losangeles", "la", "socal"]),
    );
    metros
}

/// Vertical → lowercase terms matched against canonicalized post text.
/// Terms are stored canonicalized (no punctuation) so hyphenated forms in
/// source posts still match.
pub fn default_vertical_lexicon() -> BTreeMap<VerticalCategory, Vec<String>> {
    let mut lexicon = BTreeMap::new();
    lexicon.insert(
        VerticalCategory::Office,
        strings(&[
            "class a",
            "class b",
            "sublease",
            "coworking",
            "conference room",
            "reception",
            "build out",
            "tenant improvement",
        ]),
    );
    lexicon.insert(
        VerticalCategory::Retail,
        strings(&[
            "foot traffic",
            "anchor tenant",
            "pad site",
            "drive thru",
            "shopping center",
            "strip mall",
            "big box",
            "qsr",
            "fast casual",
        ]),
    );
    lexicon.insert(
        VerticalCategory::Industrial,
        strings(&[
            "warehouse",
            "distribution",
            "logistics",
            "loading dock",
            "clear height",
            "cross dock",
            "rail served",
            "cold storage",
            "flex space",
        ]),
    );
    lexicon.insert(
        VerticalCategory::Multifamily,
        strings(&[
            "units",
            "bedroom",
            "pet friendly",
            "concierge",
            "parking ratio",
            "occupancy",
            "rent roll",
        ]),
    );
    lexicon.insert(
        VerticalCategory::Hospitality,
        strings(&[
            "adr",
            "revpar",
            "occupancy rate",
            "franchise",
            "boutique",
            "limited service",
            "full service",
            "extended stay",
        ]),
    );
    lexicon.insert(
        VerticalCategory::MixedUse,
        strings(&[
            "live work play",
            "ground floor retail",
            "residential over retail",
            "transit oriented",
            "walkable",
            "mixed income",
        ]),
    );
    lexicon
}

fn strings(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}
