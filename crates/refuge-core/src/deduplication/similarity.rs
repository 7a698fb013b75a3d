//! Similarity scoring for shelter matching

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::normalization::normalize_name;
use crate::config::MatchThresholds;
use crate::domain::{Coord, Record};

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Similarity given when one key contains the other
pub const SUBSTRING_SIMILARITY: f64 = 0.8;

/// Outcome of comparing two records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchDecision {
    /// Same place, merge
    Accept,
    /// Probably the same place, merge and flag for review
    Uncertain,
    /// Different places
    Reject,
}

impl MatchDecision {
    pub fn is_match(self) -> bool {
        !matches!(self, MatchDecision::Reject)
    }
}

/// Similarity of two display names in [0, 1]
pub fn name_similarity(name1: &str, name2: &str) -> f64 {
    key_similarity(&normalize_name(name1), &normalize_name(name2))
}

/// Similarity of two already-normalized keys
pub fn key_similarity(key1: &str, key2: &str) -> f64 {
    if key1.is_empty() || key2.is_empty() {
        return 0.0;
    }
    if key1 == key2 {
        return 1.0;
    }
    if key1.contains(key2) || key2.contains(key1) {
        return SUBSTRING_SIMILARITY;
    }

    let words1: HashSet<&str> = key1.split_whitespace().collect();
    let words2: HashSet<&str> = key2.split_whitespace().collect();
    let intersection = words1.intersection(&words2).count();
    let union = words1.union(&words2).count();

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Great-circle distance in km, `+inf` when either side is missing or invalid
pub fn geo_distance(c1: Option<&Coord>, c2: Option<&Coord>) -> f64 {
    match (c1, c2) {
        (Some(a), Some(b)) if a.is_valid() && b.is_valid() => haversine_km(a, b),
        _ => f64::INFINITY,
    }
}

/// Haversine distance between two valid coordinates
pub fn haversine_km(a: &Coord, b: &Coord) -> f64 {
    if a == b {
        return 0.0;
    }
    // Canonical argument order keeps d(a, b) bit-identical to d(b, a)
    let (p, q) = if (a.lat, a.long) <= (b.lat, b.long) {
        (a, b)
    } else {
        (b, a)
    };

    let lat1 = p.lat.to_radians();
    let lat2 = q.lat.to_radians();
    let dlat = (q.lat - p.lat).to_radians();
    let dlong = (q.long - p.long).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlong / 2.0).sin().powi(2);
    let c = 2.0 * h.min(1.0).sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Apply the decision thresholds to a (similarity, distance) pair
pub fn classify(similarity: f64, distance_km: f64, thresholds: &MatchThresholds) -> MatchDecision {
    if similarity > thresholds.accept_similarity
        || (similarity > thresholds.near_similarity && distance_km < thresholds.near_distance_km)
    {
        MatchDecision::Accept
    } else if similarity > thresholds.uncertain_similarity
        && distance_km < thresholds.uncertain_distance_km
    {
        MatchDecision::Uncertain
    } else {
        MatchDecision::Reject
    }
}

/// Score and classify two records
pub fn score_pair(
    left: &Record,
    right: &Record,
    thresholds: &MatchThresholds,
) -> (f64, f64, MatchDecision) {
    let similarity = name_similarity(&left.name, &right.name);
    let distance = geo_distance(left.coord.as_ref(), right.coord.as_ref());
    (similarity, distance, classify(similarity, distance, thresholds))
}
