//! Batch pipeline over two record sets
//!
//! Drives the matcher across both sets, merges every assigned pair, completes
//! every output record and assembles the uncertain-match report and run
//! summary.
//!
//! Output order: for each left record in input order, its merged record or its
//! completed self; then every unconsumed right record in input order.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::deduplication::{normalize_name, ConsumedSet, GreedyMatcher, MatchDecision, Matcher};
use crate::domain::Record;
use crate::error::{DataIssue, MatchError, Result};
use crate::merge::{MergeResult, Merger};
use crate::report::{RunSummary, UncertainMatch, UncertainReport};

/// Everything one run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<Record>,
    pub uncertain: UncertainReport,
    /// Audit of every merge, in output order
    pub merges: Vec<MergeResult>,
    pub issues: Vec<DataIssue>,
    pub summary: RunSummary,
}

/// Run with the greedy matcher
pub fn run(left: &[Record], right: &[Record], config: &EngineConfig) -> Result<PipelineOutput> {
    config.validate()?;
    let matcher = GreedyMatcher::new(config.thresholds.clone());
    run_with(&matcher, left, right, config)
}

/// Shape two raw documents with the configured vocabulary, then run.
///
/// Ingestion issues are reported alongside the pipeline's own.
pub fn run_documents(left: Value, right: Value, config: &EngineConfig) -> Result<PipelineOutput> {
    let left = config.vocabulary.shape_all(left)?;
    let right = config.vocabulary.shape_all(right)?;

    let mut output = run(&left.records, &right.records, config)?;
    let mut issues = left.issues;
    issues.extend(right.issues);
    issues.append(&mut output.issues);
    output.summary.data_issues = issues.len();
    output.issues = issues;
    Ok(output)
}

/// Run with any matcher
pub fn run_with(
    matcher: &dyn Matcher,
    left: &[Record],
    right: &[Record],
    config: &EngineConfig,
) -> Result<PipelineOutput> {
    let merger = Merger::from_config(config)?;
    let mut summary = RunSummary::new(left.len(), right.len());

    let mut issues = scan_issues(left);
    issues.extend(scan_issues(right));
    for issue in &issues {
        debug!(%issue, "data issue");
    }
    if !issues.is_empty() {
        warn!(count = issues.len(), "records with data issues");
    }

    let assignment = matcher.assign(left, right, ConsumedSet::new())?;

    // Re-check the assignment: any matcher must be one-to-one
    let mut pair_for_left = vec![None; left.len()];
    let mut used_right = ConsumedSet::new();
    for pair in &assignment.pairs {
        if pair.left_index >= left.len() {
            return Err(MatchError::IndexOutOfRange {
                index: pair.left_index,
                len: left.len(),
            }
            .into());
        }
        if pair.right_index >= right.len() {
            return Err(MatchError::IndexOutOfRange {
                index: pair.right_index,
                len: right.len(),
            }
            .into());
        }
        if pair_for_left[pair.left_index].is_some() {
            return Err(MatchError::LeftAssignedTwice(pair.left_index).into());
        }
        used_right.consume(pair.right_index)?;
        pair_for_left[pair.left_index] = Some(pair);
    }

    let mut records = Vec::with_capacity(left.len() + right.len());
    let mut merges = Vec::new();
    let mut uncertain = UncertainReport::default();

    for (i, record) in left.iter().enumerate() {
        match pair_for_left[i] {
            Some(pair) => {
                let other = &right[pair.right_index];
                if pair.decision == MatchDecision::Uncertain {
                    uncertain
                        .matches
                        .push(UncertainMatch::from_pair(pair, record, other));
                }
                let mut result = merger.merge(record, other);
                result.merged = merger.complete(result.merged);
                records.push(result.merged.clone());
                merges.push(result);
            }
            None => {
                records.push(merger.complete(record.clone()));
                summary.left_only += 1;
            }
        }
    }

    for (j, record) in right.iter().enumerate() {
        if !used_right.contains(j) {
            records.push(merger.complete(record.clone()));
            summary.right_only += 1;
        }
    }

    summary.merged = merges.len();
    summary.uncertain = uncertain.len();
    summary.output_records = records.len();
    summary.data_issues = issues.len();

    let expected = summary.expected_output();
    if records.len() != expected {
        return Err(MatchError::Conservation {
            expected,
            actual: records.len(),
        }
        .into());
    }

    info!(
        left = summary.left_records,
        right = summary.right_records,
        merged = summary.merged,
        uncertain = summary.uncertain,
        left_only = summary.left_only,
        right_only = summary.right_only,
        output = summary.output_records,
        "merge run complete"
    );

    Ok(PipelineOutput {
        records,
        uncertain,
        merges,
        issues,
        summary,
    })
}

/// Defects that weaken matching but do not stop the run
fn scan_issues(records: &[Record]) -> Vec<DataIssue> {
    let mut issues = Vec::new();
    for record in records {
        if record.valid_coord().is_none() {
            issues.push(DataIssue::MissingCoordinate {
                record: record.name.clone(),
            });
        }
        if normalize_name(&record.name).is_empty() {
            issues.push(DataIssue::EmptyNameKey {
                record: record.name.clone(),
            });
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deduplication::{Assignment, MatchedPair};
    use serde_json::json;

    #[test]
    fn test_output_order() {
        let left = vec![
            Record::new("Cabane Areng").with_coord(42.8010, 0.6270),
            Record::new("Orri de Setut").with_coord(42.5, 1.5),
        ];
        let right = vec![
            Record::new("Refugi de Colomina").with_coord(42.52, 1.0),
            Record::new("Cabane d'Areng").with_coord(42.8011, 0.6271),
        ];

        let output = run(&left, &right, &EngineConfig::default()).unwrap();
        let names: Vec<&str> = output.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Cabane Areng", "Orri de Setut", "Refugi de Colomina"]);
        assert_eq!(output.summary.merged, 1);
        assert_eq!(output.summary.left_only, 1);
        assert_eq!(output.summary.right_only, 1);
    }

    #[test]
    fn test_issues_reported() {
        let left = vec![Record::new("Refuge")];
        let right = vec![Record::new("Cabane Areng").with_coord(42.8, 0.6)];
        let output = run(&left, &right, &EngineConfig::default()).unwrap();

        assert_eq!(output.issues.len(), 2);
        assert!(output
            .issues
            .iter()
            .any(|i| matches!(i, DataIssue::EmptyNameKey { .. })));
        assert_eq!(output.summary.data_issues, 2);
    }

    #[test]
    fn test_run_documents_shapes_inputs() {
        let left = json!({"nodes": [
            {"name": "Cabane Areng", "coord": {"lat": 42.8010, "long": 0.6270}, "places": "5",
             "info_comp": {"eau": "Sans"}},
        ]});
        let right = json!([
            {"name": "Cabane d'Areng", "coord": {"lat": 42.8011, "long": 0.6271}, "places": 8,
             "info_comp": {"eau": "oui"}, "altitude": "?"},
        ]);

        let output = run_documents(left, right, &EngineConfig::default()).unwrap();
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].places, Some(8));
        assert_eq!(output.records[0].flag("eau"), 1);
        assert_eq!(output.issues.len(), 1);
        assert_eq!(output.summary.data_issues, 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.thresholds.accept_similarity = 2.0;
        assert!(run(&[], &[], &config).is_err());
    }

    struct DoubleBooking;

    impl Matcher for DoubleBooking {
        fn assign(
            &self,
            left: &[Record],
            _right: &[Record],
            consumed: ConsumedSet,
        ) -> Result<Assignment> {
            let pairs = (0..left.len())
                .map(|i| MatchedPair {
                    left_index: i,
                    right_index: 0,
                    similarity: 1.0,
                    distance_km: 0.0,
                    decision: MatchDecision::Accept,
                })
                .collect();
            Ok(Assignment {
                pairs,
                left_only: Vec::new(),
                consumed,
            })
        }
    }

    #[test]
    fn test_matcher_reusing_right_record_is_fatal() {
        let left = vec![Record::new("a"), Record::new("b")];
        let right = vec![Record::new("c")];
        let err = run_with(&DoubleBooking, &left, &right, &EngineConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::RefugeError::Match(MatchError::AlreadyConsumed(0))
        ));
    }
}
