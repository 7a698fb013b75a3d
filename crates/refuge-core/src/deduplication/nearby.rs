//! Nearby duplicate scan within one record set
//!
//! Finds pairs of records that sit within a few tens of metres of each other
//! and whose names look alike. The output is a review list; nothing is merged
//! here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strsim::normalized_levenshtein;

use super::similarity::haversine_km;
use crate::config::NearbyConfig;
use crate::domain::{Coord, Record, ShelterType};

/// Summary of one side of a nearby pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyRecord {
    pub index: usize,
    pub name: String,
    pub coord: Coord,
    pub altitude: Option<i64>,
    #[serde(rename = "type")]
    pub shelter_type: Option<ShelterType>,
    pub links: Vec<String>,
}

impl NearbyRecord {
    fn from_record(index: usize, record: &Record, coord: Coord) -> Self {
        Self {
            index,
            name: record.name.clone(),
            coord,
            altitude: record.altitude,
            shelter_type: record.shelter_type.clone(),
            links: record.links.clone(),
        }
    }
}

/// Two records close enough, and alike enough, to be the same shelter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPair {
    pub first: NearbyRecord,
    pub second: NearbyRecord,
    /// Rounded to centimetres
    pub distance_m: f64,
    /// Normalized Levenshtein similarity of the lowercased names, 3 decimals
    pub name_similarity: f64,
    /// Significant words both names share; near-identical words as `a~b`
    pub shared_words: Vec<String>,
}

/// Scan all pairs `i < j` of `records`.
///
/// Records without a usable coordinate are skipped.
pub fn find_nearby_pairs(records: &[Record], config: &NearbyConfig) -> Vec<NearbyPair> {
    let located: Vec<(usize, &Record, Coord)> = records
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.valid_coord().map(|c| (i, r, *c)))
        .collect();

    let mut pairs = Vec::new();
    for (a, (i, first, c1)) in located.iter().enumerate() {
        for (j, second, c2) in &located[a + 1..] {
            let distance_m = haversine_km(c1, c2) * 1000.0;
            if distance_m > config.max_distance_m {
                continue;
            }

            let similarity =
                normalized_levenshtein(&first.name.to_lowercase(), &second.name.to_lowercase());
            let shared = shared_words(&first.name, &second.name, config);

            if similarity >= config.min_name_similarity || !shared.is_empty() {
                pairs.push(NearbyPair {
                    first: NearbyRecord::from_record(*i, first, *c1),
                    second: NearbyRecord::from_record(*j, second, *c2),
                    distance_m: round_to(distance_m, 2),
                    name_similarity: round_to(similarity, 3),
                    shared_words: shared,
                });
            }
        }
    }

    tracing::info!(
        records = records.len(),
        located = located.len(),
        pairs = pairs.len(),
        "nearby scan complete"
    );
    pairs
}

/// Significant words the two names share.
///
/// Exact matches are returned sorted. Failing those, the first pair of
/// near-identical words is returned as `a~b`.
pub fn shared_words(name1: &str, name2: &str, config: &NearbyConfig) -> Vec<String> {
    let significant = |name: &str| -> BTreeSet<String> {
        name.to_lowercase()
            .split_whitespace()
            .filter(|w| w.chars().count() >= config.min_word_length)
            .filter(|w| !config.common_words.iter().any(|c| c == w))
            .map(str::to_string)
            .collect()
    };
    let words1 = significant(name1);
    let words2 = significant(name2);

    let exact: Vec<String> = words1.intersection(&words2).cloned().collect();
    if !exact.is_empty() {
        return exact;
    }

    for w1 in &words1 {
        for w2 in &words2 {
            if normalized_levenshtein(w1, w2) >= config.word_similarity {
                return vec![format!("{}~{}", w1, w2)];
            }
        }
    }
    Vec::new()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Human-readable review list
pub fn render_nearby_text(pairs: &[NearbyPair], config: &NearbyConfig) -> String {
    let rule = "=".repeat(80);
    let mut out = String::new();
    out.push_str(&format!("{}\n", rule));
    out.push_str(&format!(
        "NEARBY RECORDS WITH SIMILAR NAMES (distance <= {} m)\n",
        config.max_distance_m
    ));
    out.push_str(&format!("{}\n\n", rule));
    out.push_str(&format!("Pairs found: {}\n", pairs.len()));

    for (n, pair) in pairs.iter().enumerate() {
        out.push_str(&format!("\n{}\nPAIR #{}\n{}\n\n", rule, n + 1, rule));
        out.push_str(&format!("Distance: {} m\n", pair.distance_m));
        out.push_str(&format!("Name similarity: {:.1}%\n", pair.name_similarity * 100.0));
        if !pair.shared_words.is_empty() {
            out.push_str(&format!("Shared words: {}\n", pair.shared_words.join(", ")));
        }
        for (label, side) in [("RECORD 1", &pair.first), ("RECORD 2", &pair.second)] {
            out.push_str(&format!("\n{}:\n", label));
            out.push_str(&format!("  Name: {}\n", side.name));
            out.push_str(&format!("  Coordinates: {}, {}\n", side.coord.lat, side.coord.long));
            match side.altitude {
                Some(alt) => out.push_str(&format!("  Altitude: {}m\n", alt)),
                None => out.push_str("  Altitude: unknown\n"),
            }
            if let Some(t) = &side.shelter_type {
                out.push_str(&format!("  Type: {}\n", t.values().join(" / ")));
            }
            if let Some(link) = side.links.first() {
                out.push_str(&format!("  Link: {}\n", link));
            }
        }
    }
    out
}
