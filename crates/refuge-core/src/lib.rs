//! Refuge Core - entity resolution and field merge for shelter catalogs
//!
//! Mountain shelters are listed by several independent catalogs, each with
//! its own schema, spelling and coordinate precision. This crate decides
//! which records of two catalogs describe the same shelter and merges them
//! under explicit, auditable rules without dropping information.
//!
//! - **Vocabulary**: coercion of raw source values into the canonical record
//! - **Deduplication**: name normalization, similarity scoring, greedy matching
//!   and the in-set nearby duplicate scan
//! - **Merge**: declarative per-field merge policy, record completion and
//!   merging of listed pairs
//! - **Pipeline**: one batch run over two record sets
//! - **Report**: uncertain matches for manual review and run summary
//! - **Verify**: structural checks on a merged output
//! - **Config**: thresholds, merge overrides, vocabulary and scan settings
//!
//! # Flow
//!
//! ```text
//! raw JSON -> Vocabulary -> Matcher (Normalizer + Scorer) -> Merger -> output + report
//! ```

pub mod config;
pub mod deduplication;
pub mod domain;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod report;
pub mod verify;
pub mod vocabulary;

pub use config::{EngineConfig, MatchThresholds, MergeConfig, NearbyConfig};
pub use deduplication::{
    find_nearby_pairs, geo_distance, name_similarity, normalize_name, ConsumedSet, GreedyMatcher,
    MatchDecision, Matcher, NearbyPair,
};
pub use domain::{Coord, Record, ShelterType};
pub use error::{ConfigError, DataIssue, InputError, MatchError, RefugeError, Result};
pub use merge::{
    merge_pairs, Field, FieldStrategy, MergePolicy, MergeResult, Merger, NamePair,
    PairMergeOutcome,
};
pub use pipeline::{run, run_documents, run_with, PipelineOutput};
pub use report::{RunSummary, UncertainMatch, UncertainReport};
pub use verify::{verify_records, VerifyReport};
pub use vocabulary::{ShapedRecords, Vocabulary};

/// Returns the version of refuge-core
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
