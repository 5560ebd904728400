//! In-Memory State Persistence
//!
//! Keeps the last saved tree as serialized JSON. Saving and loading go
//! through the same wire format as the file adapter, so a run against a
//! [`MemoryAdapter`] exercises a full persist/restore cycle without disk.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::state::{State, StateNode};

use super::{Adapter, StateFormat};

/// Adapter holding the persisted snapshot in memory.
#[derive(Debug)]
pub struct MemoryAdapter<S = State> {
    snapshot: Mutex<Option<String>>,
    root_name: String,
    saves: AtomicUsize,
    _state: PhantomData<fn() -> S>,
}

impl<S: StateNode> MemoryAdapter<S> {
    /// Empty adapter; the first load yields a fresh root named `root_name`.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            snapshot: Mutex::new(None),
            root_name: root_name.into(),
            saves: AtomicUsize::new(0),
            _state: PhantomData,
        }
    }

    /// Adapter preloaded with a serialized JSON tree.
    pub fn with_snapshot(root_name: impl Into<String>, json: impl Into<String>) -> Self {
        let adapter = Self::new(root_name);
        *adapter.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(json.into());
        adapter
    }

    /// The last saved JSON text, if any.
    pub fn snapshot(&self) -> Option<String> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl<S> Adapter<S> for MemoryAdapter<S>
where
    S: StateNode + Serialize + DeserializeOwned,
{
    fn load_state(&self) -> Result<S> {
        match self.snapshot() {
            Some(json) => StateFormat::Json.decode(&json),
            None => Ok(S::fresh(&self.root_name)),
        }
    }

    fn save_state(&self, state: &S) -> Result<()> {
        let json = StateFormat::Json.encode(state)?;
        debug!("Saved snapshot of '{}' ({} bytes)", state.name(), json.len());
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(json);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
