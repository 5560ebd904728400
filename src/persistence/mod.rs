//! State Persistence Module
//!
//! The load/save boundary around a run. An [`Adapter`] hands the engine a
//! root state before the walk and takes it back afterwards; only the root
//! crosses the boundary, the subtree travels with it.
//!
//! # Adapters
//!
//! - [`FileAdapter`]: JSON or YAML file on disk
//! - [`MemoryAdapter`]: serialized snapshot kept in memory

pub mod file;
pub mod memory;

use std::path::{Path, PathBuf};

use log::info;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StepError};
use crate::state::{State, StateNode};

pub use file::FileAdapter;
pub use memory::MemoryAdapter;

/// Environment variable overriding the default state directory.
pub const STATE_DIR_ENV: &str = "STEPWISE_STATE_DIR";

/// Directory used when none is given in the environment.
pub const DEFAULT_STATE_DIR: &str = ".stepwise";

/// Lazily-resolved directory holding per-workflow state files.
pub static STATE_DIR: Lazy<PathBuf> = Lazy::new(|| match std::env::var(STATE_DIR_ENV) {
    Ok(dir) if !dir.trim().is_empty() => {
        info!("Using state directory from {}: {}", STATE_DIR_ENV, dir);
        PathBuf::from(dir)
    }
    _ => PathBuf::from(DEFAULT_STATE_DIR),
});

/// Load/save boundary for the root of a progress tree.
pub trait Adapter<S: StateNode = State> {
    /// Produces the root to run against. A failure aborts the run before
    /// any step executes.
    fn load_state(&self) -> Result<S>;

    /// Persists the root after a walk. A failure leaves the in-memory tree
    /// untouched.
    fn save_state(&self, state: &S) -> Result<()>;
}

/// Wire format of a persisted tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateFormat {
    #[default]
    Json,
    Yaml,
}

impl StateFormat {
    /// Infers the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(StateFormat::Json),
            Some("yaml") | Some("yml") => Ok(StateFormat::Yaml),
            other => Err(StepError::UnsupportedFormat(format!(
                "{} (extension {:?})",
                path.display(),
                other.unwrap_or("")
            ))),
        }
    }

    /// Parses a format name as given on the command line.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Ok(StateFormat::Json),
            "yaml" | "yml" => Ok(StateFormat::Yaml),
            other => Err(StepError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String> {
        Ok(match self {
            StateFormat::Json => serde_json::to_string_pretty(value)?,
            StateFormat::Yaml => serde_yaml::to_string(value)?,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        Ok(match self {
            StateFormat::Json => serde_json::from_str(text)?,
            StateFormat::Yaml => serde_yaml::from_str(text)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(StateFormat::from_path(Path::new("a.json")).unwrap(), StateFormat::Json);
        assert_eq!(StateFormat::from_path(Path::new("a.yaml")).unwrap(), StateFormat::Yaml);
        assert_eq!(StateFormat::from_path(Path::new("a.yml")).unwrap(), StateFormat::Yaml);
        assert!(StateFormat::from_path(Path::new("a.toml")).is_err());
        assert!(StateFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(StateFormat::parse("JSON").unwrap(), StateFormat::Json);
        assert_eq!(StateFormat::parse("yml").unwrap(), StateFormat::Yaml);
        assert!(StateFormat::parse("xml").is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let root = State::new("root");
        root.start();
        let child = root.derive("child");
        child.start();
        child.fail("bad");
        root.sync_result(&child);

        let text = StateFormat::Yaml.encode(&root).unwrap();
        assert!(text.contains("startedAt"));
        let loaded: State = StateFormat::Yaml.decode(&text).unwrap();
        assert_eq!(loaded.to_record(), root.to_record());
    }

    #[test]
    fn test_decode_garbage_is_error() {
        let result: Result<State> = StateFormat::Json.decode("not json");
        assert!(result.unwrap_err().is_persistence());
    }

    #[test]
    fn test_default_state_dir() {
        if std::env::var(STATE_DIR_ENV).is_err() {
            assert_eq!(STATE_DIR.as_path(), Path::new(DEFAULT_STATE_DIR));
        }
    }
}
