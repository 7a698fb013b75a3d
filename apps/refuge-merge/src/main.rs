//! Refuge Merge - shelter catalog merge tool
//!
//! Merges two shelter catalogs, scans one catalog for nearby duplicates,
//! merges listed duplicate pairs and verifies merged output.

mod commands;
mod io;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::MergeArgs;
use io::{load_config, CliError};

#[derive(Debug, Parser)]
#[command(name = "refuge-merge", version)]
#[command(about = "Merge shelter catalogs and report uncertain matches")]
struct Cli {
    /// Engine configuration (TOML, or JSON with a .json extension)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Merge two catalogs; the left one keeps its order
    Merge {
        #[arg(long)]
        left: PathBuf,
        #[arg(long)]
        right: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// JSON report with summary, uncertain matches, issues and merge audit
        #[arg(long)]
        report: Option<PathBuf>,
        /// Text list of uncertain matches
        #[arg(long)]
        text_report: Option<PathBuf>,
    },

    /// List records of one catalog that look like duplicates
    Nearby {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        text_report: Option<PathBuf>,
    },

    /// Merge listed duplicate pairs within one catalog
    MergePairs {
        #[arg(short, long)]
        input: PathBuf,
        /// JSON list of name pairs, or a nearby scan output
        #[arg(long)]
        pairs: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check a merged output for missing fields and flags
    Verify {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Merge {
            left,
            right,
            output,
            report,
            text_report,
        } => {
            let summary = commands::merge(
                MergeArgs {
                    left: &left,
                    right: &right,
                    output: &output,
                    report: report.as_deref(),
                    text_report: text_report.as_deref(),
                },
                &config,
            )?;
            commands::print_summary(&summary);
        }
        Commands::Nearby {
            input,
            output,
            text_report,
        } => {
            commands::nearby(&input, output.as_deref(), text_report.as_deref(), &config)?;
        }
        Commands::MergePairs {
            input,
            pairs,
            output,
        } => {
            commands::merge_listed_pairs(&input, &pairs, &output, &config)?;
        }
        Commands::Verify { input } => commands::verify(&input, &config)?,
        Commands::Config => print!("{}", commands::show_config(&config)?),
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    run(cli)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_merge() {
        let cli = Cli::try_parse_from([
            "refuge-merge",
            "merge",
            "--left",
            "refuges_info.json",
            "--right",
            "pyrenees.json",
            "-o",
            "merged.json",
            "--text-report",
            "uncertain.txt",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Merge {
                output,
                text_report,
                report,
                ..
            } => {
                assert_eq!(output, PathBuf::from("merged.json"));
                assert_eq!(text_report, Some(PathBuf::from("uncertain.txt")));
                assert_eq!(report, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_merge_requires_both_inputs() {
        assert!(Cli::try_parse_from(["refuge-merge", "merge", "--left", "a.json", "-o", "b.json"])
            .is_err());
    }
}
