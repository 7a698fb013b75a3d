//! Candidate ranking and greedy one-to-one assignment
//!
//! Left records are visited in input order. Each takes the best remaining
//! right record that clears the thresholds, and that right record is then
//! unavailable to every later left record. The set of consumed right indices
//! is passed in and handed back explicitly.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use super::normalization::normalize_name;
use super::similarity::{classify, geo_distance, key_similarity, MatchDecision};
use crate::config::MatchThresholds;
use crate::domain::Record;
use crate::error::{MatchError, Result};

/// Right-hand indices already assigned to a left record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumedSet {
    indices: BTreeSet<usize>,
}

impl ConsumedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    /// Mark `index` as used. Using an index twice is an invariant violation.
    pub fn consume(&mut self, index: usize) -> std::result::Result<(), MatchError> {
        if self.indices.insert(index) {
            Ok(())
        } else {
            Err(MatchError::AlreadyConsumed(index))
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }
}

/// One scored right-hand candidate for a left record
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub right_index: usize,
    pub similarity: f64,
    pub distance_km: f64,
    pub decision: MatchDecision,
}

/// A left record and the right record assigned to it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchedPair {
    pub left_index: usize,
    pub right_index: usize,
    pub similarity: f64,
    pub distance_km: f64,
    pub decision: MatchDecision,
}

/// Result of one assignment pass
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    /// Pairs in left input order
    pub pairs: Vec<MatchedPair>,
    /// Left indices that found no partner, in input order
    pub left_only: Vec<usize>,
    /// Every right index consumed, including any passed in
    pub consumed: ConsumedSet,
}

impl Assignment {
    /// Right indices never consumed, in input order
    pub fn right_only(&self, right_len: usize) -> Vec<usize> {
        (0..right_len).filter(|j| !self.consumed.contains(*j)).collect()
    }

    pub fn uncertain(&self) -> impl Iterator<Item = &MatchedPair> {
        self.pairs
            .iter()
            .filter(|p| p.decision == MatchDecision::Uncertain)
    }
}

/// Strategy for pairing records of two sets
pub trait Matcher {
    /// Assign left records to right records.
    ///
    /// Right indices already in `consumed` are never assigned.
    fn assign(&self, left: &[Record], right: &[Record], consumed: ConsumedSet)
        -> Result<Assignment>;
}

/// Greedy first-fit matcher.
///
/// Order-sensitive: an earlier left record can take a right record that a
/// later one would have matched better.
#[derive(Debug, Clone, Default)]
pub struct GreedyMatcher {
    thresholds: MatchThresholds,
}

impl GreedyMatcher {
    pub fn new(thresholds: MatchThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &MatchThresholds {
        &self.thresholds
    }

    /// Score every unconsumed right record and sort by
    /// (similarity desc, distance asc). The sort is stable, so equal scores
    /// keep right input order.
    pub fn rank_candidates(
        &self,
        left: &Record,
        left_key: &str,
        right: &[Record],
        right_keys: &[String],
        consumed: &ConsumedSet,
    ) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = right
            .iter()
            .zip(right_keys)
            .enumerate()
            .filter(|(j, _)| !consumed.contains(*j))
            .map(|(j, (record, key))| {
                let similarity = key_similarity(left_key, key);
                let distance_km = geo_distance(left.coord.as_ref(), record.coord.as_ref());
                Candidate {
                    right_index: j,
                    similarity,
                    distance_km,
                    decision: classify(similarity, distance_km, &self.thresholds),
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(a.distance_km.total_cmp(&b.distance_km))
        });
        candidates
    }
}

impl Matcher for GreedyMatcher {
    fn assign(
        &self,
        left: &[Record],
        right: &[Record],
        mut consumed: ConsumedSet,
    ) -> Result<Assignment> {
        if let Some(index) = consumed.iter().find(|&j| j >= right.len()) {
            return Err(MatchError::IndexOutOfRange {
                index,
                len: right.len(),
            }
            .into());
        }

        let right_keys: Vec<String> = right.iter().map(|r| normalize_name(&r.name)).collect();
        let mut pairs = Vec::new();
        let mut left_only = Vec::new();

        for (i, record) in left.iter().enumerate() {
            let key = normalize_name(&record.name);
            let ranked = self.rank_candidates(record, &key, right, &right_keys, &consumed);

            match ranked.into_iter().find(|c| c.decision.is_match()) {
                Some(best) => {
                    consumed.consume(best.right_index)?;
                    debug!(
                        left = %record.name,
                        right = %right[best.right_index].name,
                        similarity = best.similarity,
                        distance_km = best.distance_km,
                        decision = ?best.decision,
                        "matched"
                    );
                    pairs.push(MatchedPair {
                        left_index: i,
                        right_index: best.right_index,
                        similarity: best.similarity,
                        distance_km: best.distance_km,
                        decision: best.decision,
                    });
                }
                None => {
                    debug!(left = %record.name, "no match");
                    left_only.push(i);
                }
            }
        }

        Ok(Assignment {
            pairs,
            left_only,
            consumed,
        })
    }
}
