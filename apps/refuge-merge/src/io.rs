//! File input and output

use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use refuge_core::{ConfigError, EngineConfig, InputError, RefugeError};

/// Errors surfaced by the command line front end
#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Engine(#[from] RefugeError),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("verification failed")]
    VerifyFailed,
}

pub fn read_json(path: &Path) -> Result<Value, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty-printed JSON with non-ASCII characters kept as-is
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CliError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    write_text(path, &text)
}

pub fn write_text(path: &Path, text: &str) -> Result<(), CliError> {
    fs::write(path, text).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate the engine configuration.
///
/// Files ending in `.json` are read as JSON, anything else as TOML. Without
/// a path the defaults apply.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };

    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        EngineConfig::from_json(&text)
    } else {
        EngineConfig::from_toml(&text)
    };

    let config = parsed.map_err(|source| CliError::ConfigFile {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate().map_err(|source| CliError::ConfigFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_json_roundtrip_keeps_accents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let value = json!([{"name": "Cabane de l'Étang"}]);

        write_json(&path, &value).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Étang"));
        assert_eq!(read_json(&path).unwrap(), value);
    }

    #[test]
    fn test_read_errors_name_the_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        let err = read_json(&missing).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
        assert!(err.to_string().contains("missing.json"));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{not json").unwrap();
        assert!(matches!(read_json(&broken), Err(CliError::Json { .. })));
    }

    #[test]
    fn test_load_config_formats() {
        let dir = TempDir::new().unwrap();

        let toml_path = dir.path().join("refuge.toml");
        fs::write(&toml_path, "[thresholds]\naccept_similarity = 0.9\n").unwrap();
        let config = load_config(Some(&toml_path)).unwrap();
        assert_eq!(config.thresholds.accept_similarity, 0.9);

        let json_path = dir.path().join("refuge.json");
        fs::write(&json_path, r#"{"merge": {"collapse_type_lists": true}}"#).unwrap();
        let config = load_config(Some(&json_path)).unwrap();
        assert!(config.merge.collapse_type_lists);

        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[thresholds]\nuncertain_similarity = 1.5\n").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(CliError::ConfigFile { .. })
        ));
    }
}
