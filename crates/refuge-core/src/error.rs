//! Error types for refuge-core
//!
//! Fatal failures (unreadable input, bad configuration, broken matcher
//! invariants) surface as [`RefugeError`]. Data-quality defects that the
//! engine absorbs with a documented default are reported as [`DataIssue`]
//! values instead.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for refuge-core operations
pub type Result<T> = std::result::Result<T, RefugeError>;

/// Main error type for refuge-core operations
#[derive(Error, Debug)]
pub enum RefugeError {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Input loading and shaping errors
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Matcher invariant violations
    #[error("Match error: {0}")]
    Match(#[from] MatchError),
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// TOML or JSON could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Threshold values are inconsistent with each other
    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),

    /// Value is out of its valid range
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Strategy table names a field the record does not have
    #[error("Unknown field in merge policy: {0}")]
    UnknownField(String),

    /// Strategy cannot be applied to the field's value kind
    #[error("Strategy {strategy} is not supported for field {field}")]
    UnsupportedStrategy { field: String, strategy: String },
}

/// Input errors. All of them abort the batch.
#[derive(Error, Debug)]
pub enum InputError {
    /// File could not be read or written
    #[error("IO error: {0}")]
    Io(String),

    /// Text is not valid JSON
    #[error("JSON error: {0}")]
    Json(String),

    /// JSON is valid but is neither an array of records nor an object with a `nodes` array
    #[error("Not a record set: {0}")]
    NotARecordSet(String),

    /// A record violates the canonical schema
    #[error("Malformed record at index {index}: {reason}")]
    Malformed { index: usize, reason: String },
}

/// Matcher invariant violations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    /// A right-hand record was assigned twice
    #[error("Right-hand record {0} consumed more than once")]
    AlreadyConsumed(usize),

    /// A left-hand record appears in more than one pair
    #[error("Left-hand record {0} assigned more than once")]
    LeftAssignedTwice(usize),

    /// A pair references a record that does not exist
    #[error("Index {index} out of range for record set of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Output size does not equal |L| + |R| - |pairs|
    #[error("Output size {actual} does not match expected {expected}")]
    Conservation { expected: usize, actual: usize },
}

/// Non-fatal data-quality defect, absorbed with a documented default.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataIssue {
    /// Record lacks a usable lat/long; its distance to everything is infinite
    #[error("'{record}': no usable coordinate, geographic matching disabled")]
    MissingCoordinate { record: String },

    /// A raw value was not cleanly numeric and was replaced by a default
    #[error("'{record}': field {field} value {raw} coerced to {coerced}")]
    NumericCoercion {
        record: String,
        field: String,
        raw: String,
        coerced: String,
    },

    /// Name normalizes to an empty key and can never match on name
    #[error("'{record}': name normalizes to an empty key")]
    EmptyNameKey { record: String },
}

impl From<std::io::Error> for InputError {
    fn from(err: std::io::Error) -> Self {
        InputError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for InputError {
    fn from(err: serde_json::Error) -> Self {
        InputError::Json(err.to_string())
    }
}

impl From<std::io::Error> for RefugeError {
    fn from(err: std::io::Error) -> Self {
        RefugeError::Input(InputError::Io(err.to_string()))
    }
}

impl From<serde_json::Error> for RefugeError {
    fn from(err: serde_json::Error) -> Self {
        RefugeError::Input(InputError::Json(err.to_string()))
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::Serialize(err.to_string())
    }
}
