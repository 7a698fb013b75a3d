//! Merging of explicitly listed duplicate pairs within one record set

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use super::{MergeResult, Merger};
use crate::domain::Record;

/// Two display names known to denote the same shelter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamePair {
    pub first: String,
    pub second: String,
}

impl NamePair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }
}

/// Accepts `["a", "b"]`, `{"first": "a", "second": "b"}`, or a nearby-scan
/// entry whose sides are objects with a `name`.
impl<'de> Deserialize<'de> for NamePair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Named {
            name: String,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Side {
            Plain(String),
            Named(Named),
        }

        impl Side {
            fn into_name(self) -> String {
                match self {
                    Side::Plain(name) => name,
                    Side::Named(named) => named.name,
                }
            }
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Tuple(String, String),
            Object { first: Side, second: Side },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Tuple(first, second) => NamePair { first, second },
            Raw::Object { first, second } => NamePair {
                first: first.into_name(),
                second: second.into_name(),
            },
        })
    }
}

/// Why a listed pair was not merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// One of the names matches no record
    NotFound,
    /// Both names resolve to the same record
    SameRecord,
    /// A record was already consumed by an earlier pair
    AlreadyMerged,
}

/// A listed pair left unmerged
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedPair {
    /// 1-based position in the pair list
    pub number: usize,
    pub pair: NamePair,
    pub first_index: Option<usize>,
    pub second_index: Option<usize>,
    pub reason: UnresolvedReason,
}

/// Result of merging listed pairs
#[derive(Debug, Clone)]
pub struct PairMergeOutcome {
    /// Untouched records in input order, then merged records in pair order
    pub records: Vec<Record>,
    pub merges: Vec<MergeResult>,
    pub unresolved: Vec<UnresolvedPair>,
}

/// Index of the first record answering to `name` as name or surname
fn find_by_name(records: &[Record], name: &str) -> Option<usize> {
    records.iter().position(|r| r.answers_to(name))
}

/// Merge each listed pair of records within one set.
///
/// The record carrying the provenance marker keeps its name; originals are
/// removed and merged records appended after the survivors. A record takes
/// part in at most one merge. Every output record is completed.
pub fn merge_pairs(records: &[Record], pairs: &[NamePair], merger: &Merger) -> PairMergeOutcome {
    let mut used: BTreeSet<usize> = BTreeSet::new();
    let mut merges = Vec::new();
    let mut unresolved = Vec::new();

    for (n, pair) in pairs.iter().enumerate() {
        let first_index = find_by_name(records, &pair.first);
        let second_index = find_by_name(records, &pair.second);

        let reason = match (first_index, second_index) {
            (Some(i), Some(j)) if i == j => Some(UnresolvedReason::SameRecord),
            (Some(i), Some(j)) if used.contains(&i) || used.contains(&j) => {
                Some(UnresolvedReason::AlreadyMerged)
            }
            (Some(_), Some(_)) => None,
            _ => Some(UnresolvedReason::NotFound),
        };

        if let Some(reason) = reason {
            warn!(
                number = n + 1,
                first = %pair.first,
                second = %pair.second,
                ?reason,
                "pair not merged"
            );
            unresolved.push(UnresolvedPair {
                number: n + 1,
                pair: pair.clone(),
                first_index,
                second_index,
                reason,
            });
            continue;
        }

        if let (Some(i), Some(j)) = (first_index, second_index) {
            used.insert(i);
            used.insert(j);
            let mut result = merger.merge(&records[i], &records[j]);
            result.merged = merger.complete(result.merged);
            merges.push(result);
        }
    }

    let mut out: Vec<Record> = records
        .iter()
        .enumerate()
        .filter(|(i, _)| !used.contains(i))
        .map(|(_, r)| merger.complete(r.clone()))
        .collect();
    out.extend(merges.iter().map(|m| m.merged.clone()));

    info!(
        input = records.len(),
        merged = merges.len(),
        unresolved = unresolved.len(),
        output = out.len(),
        "pair merge complete"
    );

    PairMergeOutcome {
        records: out,
        merges,
        unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Record> {
        vec![
            Record::new("Cabane de Saint-Jean").with_places(4),
            Record::new("Orri de Setut"),
            Record::new("Cabane St Jean")
                .with_places(6)
                .with_link("https://www.refuges.info/point/88"),
        ]
    }

    #[test]
    fn test_merges_listed_pair() {
        let outcome = merge_pairs(
            &sample(),
            &[NamePair::new("Cabane de Saint-Jean", "Cabane St Jean")],
            &Merger::default(),
        );

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].name, "Orri de Setut");
        let merged = &outcome.records[1];
        assert_eq!(merged.name, "Cabane St Jean");
        assert_eq!(merged.surname.as_deref(), Some("Cabane de Saint-Jean"));
        assert_eq!(merged.places, Some(6));
        assert!(outcome.unresolved.is_empty());
    }

    #[test]
    fn test_every_output_record_is_completed() {
        let merger = Merger::default();
        let outcome = merge_pairs(
            &sample(),
            &[NamePair::new("Cabane de Saint-Jean", "Cabane St Jean")],
            &merger,
        );

        let required = crate::config::EngineConfig::default().merge.required_flags;
        for record in &outcome.records {
            for flag in &required {
                assert!(
                    record.info_comp.contains_key(flag),
                    "{} lacks {}",
                    record.name,
                    flag
                );
            }
        }
    }

    #[test]
    fn test_reports_unresolved_pairs() {
        let pairs = vec![
            NamePair::new("Cabane de Saint-Jean", "Cabane St Jean"),
            NamePair::new("Cabane St Jean", "Orri de Setut"),
            NamePair::new("Orri de Setut", "Orri de Setut"),
            NamePair::new("Cabane Perdue", "Orri de Setut"),
        ];
        let outcome = merge_pairs(&sample(), &pairs, &Merger::default());

        let reasons: Vec<UnresolvedReason> = outcome.unresolved.iter().map(|u| u.reason).collect();
        assert_eq!(
            reasons,
            vec![
                UnresolvedReason::AlreadyMerged,
                UnresolvedReason::SameRecord,
                UnresolvedReason::NotFound,
            ]
        );
        assert_eq!(outcome.unresolved[2].number, 4);
        assert_eq!(outcome.records.len(), 2);
    }

    #[test]
    fn test_name_pair_formats() {
        let pairs: Vec<NamePair> = serde_json::from_value(json!([
            ["a", "b"],
            {"first": "c", "second": "d"},
            {"first": {"name": "e", "index": 3}, "second": {"name": "f"}, "distance_m": 12.5},
        ]))
        .unwrap();
        assert_eq!(
            pairs,
            vec![
                NamePair::new("a", "b"),
                NamePair::new("c", "d"),
                NamePair::new("e", "f"),
            ]
        );
    }
}
