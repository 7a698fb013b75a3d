//! Configuration for refuge-core
//!
//! Centralized configuration for match thresholds, merge policy overrides,
//! the ingestion vocabulary and the nearby duplicate scan. Every section is
//! optional in a TOML file; missing values take the defaults below.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::merge::{Field, FieldStrategy, MergePolicy};
use crate::vocabulary::Vocabulary;

/// Engine-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Match decision thresholds
    pub thresholds: MatchThresholds,
    /// Field merge settings
    pub merge: MergeConfig,
    /// Ingestion coercion tables
    pub vocabulary: Vocabulary,
    /// In-set nearby duplicate scan
    pub nearby: NearbyConfig,
}

/// Accept/uncertain decision thresholds.
///
/// ACCEPT when `sim > accept_similarity`, or `sim > near_similarity` and
/// `dist < near_distance_km`. UNCERTAIN when not accepted and
/// `sim > uncertain_similarity` and `dist < uncertain_distance_km`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    pub accept_similarity: f64,
    pub near_similarity: f64,
    pub near_distance_km: f64,
    pub uncertain_similarity: f64,
    pub uncertain_distance_km: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            accept_similarity: 0.8,
            near_similarity: 0.6,
            near_distance_km: 1.0,
            uncertain_similarity: 0.5,
            uncertain_distance_km: 0.5,
        }
    }
}

/// Field merge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Substring identifying the primary source in `links`
    pub provenance_marker: String,
    /// info_comp flags every output record carries, defaulting to 0
    pub required_flags: Vec<String>,
    /// Fold multi-valued `type` lists into one value at the end of a run
    pub collapse_type_lists: bool,
    /// Per-field strategy overrides, keyed by field name
    pub strategies: BTreeMap<String, FieldStrategy>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            provenance_marker: "refuges.info".to_string(),
            required_flags: [
                "cheminee",
                "bois",
                "eau",
                "matelas",
                "couchage",
                "bas_flancs",
                "lits",
                "mezzanine/etage",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            collapse_type_lists: false,
            strategies: BTreeMap::new(),
        }
    }
}

/// Nearby duplicate scan configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NearbyConfig {
    /// Scan radius in metres
    pub max_distance_m: f64,
    /// Minimum normalized Levenshtein similarity of the full names
    pub min_name_similarity: f64,
    /// Words shorter than this never count as shared
    pub min_word_length: usize,
    /// Two words with at least this similarity count as shared
    pub word_similarity: f64,
    /// Words too common to signal a duplicate
    pub common_words: Vec<String>,
}

impl Default for NearbyConfig {
    fn default() -> Self {
        Self {
            max_distance_m: 100.0,
            min_name_similarity: 0.6,
            min_word_length: 4,
            word_similarity: 0.75,
            common_words: [
                "de", "la", "le", "du", "des", "el", "les", "cabane", "refuge", "abri", "borda",
                "borde",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Merge policy with the configured overrides applied
    pub fn merge_policy(&self) -> Result<MergePolicy, ConfigError> {
        let mut policy = MergePolicy::default();
        for (name, strategy) in &self.merge.strategies {
            let field: Field = name.parse()?;
            policy = policy.with_override(field, *strategy)?;
        }
        Ok(policy)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;

        for (name, value) in [
            ("accept_similarity", t.accept_similarity),
            ("near_similarity", t.near_similarity),
            ("uncertain_similarity", t.uncertain_similarity),
            ("nearby.min_name_similarity", self.nearby.min_name_similarity),
            ("nearby.word_similarity", self.nearby.word_similarity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange(format!(
                    "{} must be between 0.0 and 1.0",
                    name
                )));
            }
        }

        for (name, value) in [
            ("near_distance_km", t.near_distance_km),
            ("uncertain_distance_km", t.uncertain_distance_km),
            ("nearby.max_distance_m", self.nearby.max_distance_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::OutOfRange(format!(
                    "{} must be a positive distance",
                    name
                )));
            }
        }

        // An uncertain band above the accept line could never be reached
        if t.uncertain_similarity > t.accept_similarity {
            return Err(ConfigError::InvalidThresholds(
                "uncertain_similarity must not exceed accept_similarity".to_string(),
            ));
        }

        self.merge_policy()?;
        Ok(())
    }
}
