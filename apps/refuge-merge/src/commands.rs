//! Subcommand implementations

use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use refuge_core::deduplication::render_nearby_text;
use refuge_core::merge::UnresolvedPair;
use refuge_core::vocabulary::record_values;
use refuge_core::{
    find_nearby_pairs, merge_pairs, run_documents, verify_records, DataIssue, EngineConfig,
    MergeResult, Merger, NamePair, NearbyPair, RunSummary, UncertainReport,
};

use crate::io::{read_json, write_json, write_text, CliError};

/// JSON report written next to a merged output
#[derive(Debug, Serialize)]
struct MergeReport<'a> {
    summary: &'a RunSummary,
    uncertain: &'a UncertainReport,
    issues: &'a [DataIssue],
    merges: &'a [MergeResult],
}

pub struct MergeArgs<'a> {
    pub left: &'a Path,
    pub right: &'a Path,
    pub output: &'a Path,
    pub report: Option<&'a Path>,
    pub text_report: Option<&'a Path>,
}

/// Merge two catalogs into one output file
pub fn merge(args: MergeArgs<'_>, config: &EngineConfig) -> Result<RunSummary, CliError> {
    let left = read_json(args.left)?;
    let right = read_json(args.right)?;

    let output = run_documents(left, right, config)?;
    write_json(args.output, &output.records)?;
    info!(path = %args.output.display(), records = output.records.len(), "wrote merged records");

    if let Some(path) = args.report {
        let report = MergeReport {
            summary: &output.summary,
            uncertain: &output.uncertain,
            issues: &output.issues,
            merges: &output.merges,
        };
        write_json(path, &report)?;
    }
    if let Some(path) = args.text_report {
        write_text(path, &output.uncertain.render_text())?;
    }
    if !output.uncertain.is_empty() {
        warn!(
            count = output.uncertain.len(),
            "uncertain matches merged, review the report"
        );
    }

    Ok(output.summary)
}

/// Scan one catalog for records that look like duplicates of each other
pub fn nearby(
    input: &Path,
    output: Option<&Path>,
    text_report: Option<&Path>,
    config: &EngineConfig,
) -> Result<Vec<NearbyPair>, CliError> {
    let shaped = config.vocabulary.shape_all(read_json(input)?)?;
    let pairs = find_nearby_pairs(&shaped.records, &config.nearby);

    if let Some(path) = output {
        write_json(path, &pairs)?;
    }
    let text = render_nearby_text(&pairs, &config.nearby);
    match text_report {
        Some(path) => write_text(path, &text)?,
        None => print!("{}", text),
    }
    Ok(pairs)
}

/// Merge listed pairs inside one catalog
pub fn merge_listed_pairs(
    input: &Path,
    pairs: &Path,
    output: &Path,
    config: &EngineConfig,
) -> Result<Vec<UnresolvedPair>, CliError> {
    let shaped = config.vocabulary.shape_all(read_json(input)?)?;
    let pairs: Vec<NamePair> = record_values(read_json(pairs)?)?
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()?;

    let merger = Merger::from_config(config)?;
    let outcome = merge_pairs(&shaped.records, &pairs, &merger);
    write_json(output, &outcome.records)?;

    for unresolved in &outcome.unresolved {
        println!(
            "Pair {} not merged ({:?}): '{}' / '{}'",
            unresolved.number, unresolved.reason, unresolved.pair.first, unresolved.pair.second
        );
    }
    println!(
        "{} pairs merged, {} records written",
        outcome.merges.len(),
        outcome.records.len()
    );
    Ok(outcome.unresolved)
}

/// Structural checks on a merged output
pub fn verify(input: &Path, config: &EngineConfig) -> Result<(), CliError> {
    let records = record_values(read_json(input)?)?;
    let report = verify_records(&records, &config.merge.required_flags);
    print!("{}", report.render_text());
    if report.is_ok() {
        Ok(())
    } else {
        Err(CliError::VerifyFailed)
    }
}

/// Effective configuration as TOML
pub fn show_config(config: &EngineConfig) -> Result<String, CliError> {
    Ok(config.to_toml()?)
}

pub fn print_summary(summary: &RunSummary) {
    println!("Left records:   {}", summary.left_records);
    println!("Right records:  {}", summary.right_records);
    println!("Merged:         {}", summary.merged);
    println!("  uncertain:    {}", summary.uncertain);
    println!("Left only:      {}", summary.left_only);
    println!("Right only:     {}", summary.right_only);
    println!("Output records: {}", summary.output_records);
    if summary.data_issues > 0 {
        println!("Data issues:    {}", summary.data_issues);
    }
}
