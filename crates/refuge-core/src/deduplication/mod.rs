//! Entity resolution across two record sets
//!
//! Normalizes names, scores candidate pairs by name similarity and distance,
//! and assigns each left record at most one right record.

mod matcher;
mod nearby;
mod normalization;
mod similarity;

pub use matcher::{Assignment, Candidate, ConsumedSet, GreedyMatcher, MatchedPair, Matcher};
pub use nearby::{find_nearby_pairs, render_nearby_text, shared_words, NearbyPair, NearbyRecord};
pub use normalization::{normalize_name, STOPWORDS};
pub use similarity::{
    classify, geo_distance, haversine_km, key_similarity, name_similarity, score_pair,
    MatchDecision, EARTH_RADIUS_KM, SUBSTRING_SIMILARITY,
};
