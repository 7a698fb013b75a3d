//! Run reports
//!
//! The uncertain-match report lists every pair that was merged on weak
//! evidence so a person can confirm or undo it. The run summary counts what
//! a run did.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::deduplication::MatchedPair;
use crate::domain::{Coord, Record};

/// One pair merged with an UNCERTAIN decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UncertainMatch {
    pub left_index: usize,
    pub right_index: usize,
    pub left_name: String,
    pub right_name: String,
    pub name_similarity: f64,
    pub distance_km: f64,
    pub left_coord: Option<Coord>,
    pub right_coord: Option<Coord>,
    pub left_altitude: Option<i64>,
    pub right_altitude: Option<i64>,
}

impl UncertainMatch {
    pub fn from_pair(pair: &MatchedPair, left: &Record, right: &Record) -> Self {
        Self {
            left_index: pair.left_index,
            right_index: pair.right_index,
            left_name: left.name.clone(),
            right_name: right.name.clone(),
            name_similarity: pair.similarity,
            distance_km: pair.distance_km,
            left_coord: left.coord,
            right_coord: right.coord,
            left_altitude: left.altitude,
            right_altitude: right.altitude,
        }
    }
}

/// Pairs to review by hand
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UncertainReport {
    pub matches: Vec<UncertainMatch>,
}

impl UncertainReport {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Human-readable rendering, one block per match
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Uncertain matches ({}):\n", self.matches.len()));
        for m in &self.matches {
            out.push_str(&format!("- '{}' <-> '{}'\n", m.left_name, m.right_name));
            out.push_str(&format!(
                "  Similarity: {:.2}, Distance: {:.2}km\n",
                m.name_similarity, m.distance_km
            ));
            out.push_str(&format!(
                "  Alt1: {}, Alt2: {}\n",
                display_altitude(m.left_altitude),
                display_altitude(m.right_altitude)
            ));
            out.push('\n');
        }
        out
    }
}

fn display_altitude(altitude: Option<i64>) -> String {
    altitude.map_or_else(|| "unknown".to_string(), |a| a.to_string())
}

/// Counts for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub engine_version: String,
    pub generated_at: DateTime<Utc>,
    pub left_records: usize,
    pub right_records: usize,
    pub merged: usize,
    pub uncertain: usize,
    pub left_only: usize,
    pub right_only: usize,
    pub output_records: usize,
    pub data_issues: usize,
}

impl RunSummary {
    pub fn new(left_records: usize, right_records: usize) -> Self {
        Self {
            engine_version: crate::version(),
            generated_at: Utc::now(),
            left_records,
            right_records,
            merged: 0,
            uncertain: 0,
            left_only: 0,
            right_only: 0,
            output_records: 0,
            data_issues: 0,
        }
    }

    /// Output size implied by the inputs and the number of merges
    pub fn expected_output(&self) -> usize {
        self.left_records + self.right_records - self.merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deduplication::MatchDecision;

    #[test]
    fn test_render_text() {
        let left = Record::new("Pla Estany Gran Nord")
            .with_coord(42.0, 1.0)
            .with_altitude(2100);
        let right = Record::new("Pla Estany Gran Sud").with_coord(42.0027, 1.0);
        let pair = MatchedPair {
            left_index: 0,
            right_index: 3,
            similarity: 0.6,
            distance_km: 0.3002,
            decision: MatchDecision::Uncertain,
        };
        let report = UncertainReport {
            matches: vec![UncertainMatch::from_pair(&pair, &left, &right)],
        };

        let text = report.render_text();
        assert!(text.starts_with("Uncertain matches (1):"));
        assert!(text.contains("'Pla Estany Gran Nord' <-> 'Pla Estany Gran Sud'"));
        assert!(text.contains("Similarity: 0.60, Distance: 0.30km"));
        assert!(text.contains("Alt1: 2100, Alt2: unknown"));
        assert_eq!(
            text,
            "Uncertain matches (1):\n\
             - 'Pla Estany Gran Nord' <-> 'Pla Estany Gran Sud'\n  \
             Similarity: 0.60, Distance: 0.30km\n  \
             Alt1: 2100, Alt2: unknown\n\n"
        );
    }

    #[test]
    fn test_summary_expected_output() {
        let mut summary = RunSummary::new(10, 7);
        summary.merged = 4;
        assert_eq!(summary.expected_output(), 13);
        assert_eq!(summary.engine_version, crate::version());
    }
}
