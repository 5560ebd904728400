//! File-Backed State Persistence
//!
//! Keeps the progress tree of a workflow in one file so a re-invoked run
//! resumes where the previous one stopped.
//!
//! Per-workflow files live at `.stepwise/{workflow}.state.json` unless
//! `STEPWISE_STATE_DIR` points elsewhere.

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::state::{State, StateNode};

use super::{Adapter, StateFormat, STATE_DIR};

/// Adapter reading and writing the root state from a file.
///
/// A missing file yields a fresh root named `root_name`; an unreadable or
/// corrupt file is an error.
#[derive(Debug)]
pub struct FileAdapter<S = State> {
    path: PathBuf,
    format: StateFormat,
    root_name: String,
    _state: PhantomData<fn() -> S>,
}

impl<S: StateNode> FileAdapter<S> {
    /// Creates an adapter for `path`, inferring the format from its
    /// extension.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = StateFormat::from_path(&path)?;
        Ok(Self {
            path,
            format,
            root_name: String::new(),
            _state: PhantomData,
        })
    }

    /// Creates an adapter for `path` with an explicit format, whatever its
    /// extension.
    pub fn with_format(path: impl Into<PathBuf>, format: StateFormat) -> Self {
        Self {
            path: path.into(),
            format,
            root_name: String::new(),
            _state: PhantomData,
        }
    }

    /// Adapter for the named workflow under the state directory.
    pub fn for_workflow(name: &str) -> Self {
        Self {
            path: Self::state_file_path_for(name),
            format: StateFormat::Json,
            root_name: name.to_string(),
            _state: PhantomData,
        }
    }

    /// Returns the state file path for a workflow name.
    pub fn state_file_path_for(name: &str) -> PathBuf {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("workflow");

        STATE_DIR.join(format!("{}.state.json", stem))
    }

    /// Sets the name given to a fresh root.
    pub fn set_root_name(&mut self, name: impl Into<String>) {
        self.root_name = name.into();
    }

    /// Overrides the inferred format.
    pub fn set_format(&mut self, format: StateFormat) {
        self.format = format;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> StateFormat {
        self.format
    }

    /// Returns true if a state file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Deletes the state file. Not an error when it is already gone.
    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!("Deleted state file: {}", self.path.display());
        }
        Ok(())
    }
}

impl<S> Adapter<S> for FileAdapter<S>
where
    S: StateNode + Serialize + DeserializeOwned,
{
    fn load_state(&self) -> Result<S> {
        if !self.path.exists() {
            info!(
                "No state at {}, starting fresh workflow execution",
                self.path.display()
            );
            return Ok(S::fresh(&self.root_name));
        }

        let content = fs::read_to_string(&self.path)?;
        let state: S = self.format.decode(&content)?;

        info!("Loaded state from {}", self.path.display());
        debug!("Last recorded attempt: {}", state.last_path());
        Ok(state)
    }

    fn save_state(&self, state: &S) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let text = self.format.encode(state)?;
        fs::write(&self.path, text)?;

        info!("Saved state to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CompactState;
    use tempfile::tempdir;

    fn sample() -> State {
        let root = State::new("deploy");
        root.start();
        let build = root.derive("build");
        build.start();
        build.succeed();
        root.sync_result(&build);
        let push = root.derive("push");
        push.start();
        push.fail("denied");
        root.sync_result(&push);
        root
    }

    #[test]
    fn test_missing_file_is_fresh_root() {
        let temp_dir = tempdir().unwrap();
        let mut adapter: FileAdapter = FileAdapter::new(temp_dir.path().join("none.json")).unwrap();
        adapter.set_root_name("fresh");

        let state = adapter.load_state().unwrap();
        assert_eq!(state.name(), "fresh");
        assert!(!state.started());
        assert!(!adapter.exists());
    }

    #[test]
    fn test_save_and_load_json() {
        let temp_dir = tempdir().unwrap();
        let adapter: FileAdapter = FileAdapter::new(temp_dir.path().join("nested/dir/state.json")).unwrap();
        let root = sample();

        adapter.save_state(&root).unwrap();
        assert!(adapter.exists());

        let loaded = adapter.load_state().unwrap();
        assert_eq!(loaded.to_record(), root.to_record());
        assert!(loaded.failed());
        assert_eq!(loaded.errors(), vec!["push: denied".to_string()]);
    }

    #[test]
    fn test_save_and_load_yaml() {
        let temp_dir = tempdir().unwrap();
        let adapter: FileAdapter = FileAdapter::new(temp_dir.path().join("state.yaml")).unwrap();
        assert_eq!(adapter.format(), StateFormat::Yaml);

        let root = sample();
        adapter.save_state(&root).unwrap();
        let loaded = adapter.load_state().unwrap();
        assert_eq!(loaded.to_record(), root.to_record());
    }

    #[test]
    fn test_compact_backend_file() {
        let temp_dir = tempdir().unwrap();
        let adapter: FileAdapter<CompactState> =
            FileAdapter::new(temp_dir.path().join("compact.json")).unwrap();

        let root = CompactState::new("c");
        root.derive("child").succeed();
        adapter.save_state(&root).unwrap();

        let loaded = adapter.load_state().unwrap();
        assert!(loaded.get("child").unwrap().succeeded());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        let adapter: FileAdapter = FileAdapter::new(&path).unwrap();
        let err = adapter.load_state().unwrap_err();
        assert!(err.is_persistence());
    }

    #[test]
    fn test_unknown_extension_is_error() {
        let result: Result<FileAdapter> = FileAdapter::new("state.txt");
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_format_ignores_extension() {
        let temp_dir = tempdir().unwrap();
        let adapter: FileAdapter = FileAdapter::with_format(temp_dir.path().join("state.txt"), StateFormat::Yaml);

        adapter.save_state(&sample()).unwrap();
        let text = fs::read_to_string(adapter.path()).unwrap();
        assert!(text.contains("name: deploy"));
        assert!(adapter.load_state().unwrap().failed());
    }

    #[test]
    fn test_for_workflow_path() {
        let adapter: FileAdapter = FileAdapter::for_workflow("pipelines/release.yaml");
        assert!(adapter.path().ends_with("release.state.json"));
        assert_eq!(adapter.format(), StateFormat::Json);
    }

    #[test]
    fn test_delete() {
        let temp_dir = tempdir().unwrap();
        let adapter: FileAdapter = FileAdapter::new(temp_dir.path().join("s.json")).unwrap();

        adapter.delete().unwrap();
        adapter.save_state(&State::new("x")).unwrap();
        assert!(adapter.exists());
        adapter.delete().unwrap();
        assert!(!adapter.exists());
    }
}
