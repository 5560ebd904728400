//! Compact State Node
//!
//! A status-only [`StateNode`] backend. It drops timestamps and keeps a
//! three-valued status, for callers that persist progress somewhere small
//! (an annotation, a status subresource) and do not need timing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::StateNode;

/// Lifecycle of a compact node.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Unstarted,
    Started,
    Done,
}

#[derive(Debug, Default, Clone)]
struct Progress {
    errs: Vec<String>,
    status: Status,
}

/// A status-only node of the progress tree.
#[derive(Debug, Default)]
pub struct CompactState {
    name: String,
    info: RwLock<Value>,
    progress: Mutex<Progress>,
    states: RwLock<Vec<Arc<CompactState>>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
struct CompactRecord {
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    info: Value,
    #[serde(default)]
    errs: Vec<String>,
    #[serde(default)]
    status: Status,
    #[serde(default)]
    states: Vec<CompactRecord>,
}

impl CompactState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn status(&self) -> Status {
        self.progress().status
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn states(&self) -> RwLockReadGuard<'_, Vec<Arc<CompactState>>> {
        self.states.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn to_record(&self) -> CompactRecord {
        let progress = self.progress().clone();
        CompactRecord {
            name: self.name.clone(),
            info: self.info(),
            errs: progress.errs,
            status: progress.status,
            states: self.states().iter().map(|s| s.to_record()).collect(),
        }
    }

    fn from_record(record: CompactRecord) -> Self {
        Self {
            name: record.name,
            info: RwLock::new(record.info),
            progress: Mutex::new(Progress {
                errs: record.errs,
                status: record.status,
            }),
            states: RwLock::new(
                record
                    .states
                    .into_iter()
                    .map(|s| Arc::new(Self::from_record(s)))
                    .collect(),
            ),
        }
    }
}

impl StateNode for CompactState {
    fn fresh(name: &str) -> Self {
        CompactState::new(name)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) {
        let mut progress = self.progress();
        if progress.status == Status::Unstarted {
            progress.status = Status::Started;
        }
    }

    fn succeed(&self) {
        let mut progress = self.progress();
        progress.status = Status::Done;
        progress.errs.clear();
    }

    fn fail(&self, err: &str) {
        let mut progress = self.progress();
        progress.status = Status::Done;
        progress.errs = vec![err.to_string()];
    }

    fn started(&self) -> bool {
        self.progress().status != Status::Unstarted
    }

    fn succeeded(&self) -> bool {
        let progress = self.progress();
        progress.status == Status::Done && progress.errs.is_empty()
    }

    fn failed(&self) -> bool {
        let progress = self.progress();
        progress.status == Status::Done && !progress.errs.is_empty()
    }

    fn proceeding(&self) -> bool {
        self.progress().status == Status::Started
    }

    fn terminal(&self) -> bool {
        self.progress().status == Status::Done
    }

    fn errors(&self) -> Vec<String> {
        self.progress().errs.clone()
    }

    fn derive(&self, name: &str) -> Arc<Self> {
        let child = Arc::new(CompactState::new(name));
        self.add(Arc::clone(&child));
        child
    }

    fn add(&self, child: Arc<Self>) {
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(child);
    }

    fn sync_result(&self, child: &Self) {
        let (errs, status) = {
            let theirs = child.progress();
            (theirs.errs.clone(), theirs.status)
        };
        let mut progress = self.progress();
        for err in errs {
            progress.errs.push(format!("{}: {}", child.name, err));
        }
        progress.status = status;
    }

    fn state_at(&self, index: usize) -> Option<Arc<Self>> {
        self.states().get(index).cloned()
    }

    fn children(&self) -> Vec<Arc<Self>> {
        self.states().clone()
    }

    fn children_len(&self) -> usize {
        self.states().len()
    }

    fn set_info(&self, info: Value) {
        *self.info.write().unwrap_or_else(PoisonError::into_inner) = info;
    }

    fn info(&self) -> Value {
        self.info.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn recover(&self) {
        let last = self.states().last().cloned();
        {
            let mut progress = self.progress();
            progress.errs.clear();
            progress.status = if last.is_some() && progress.status != Status::Unstarted {
                Status::Started
            } else {
                Status::Unstarted
            };
        }
        if let Some(last) = last {
            last.recover();
        }
    }
}

impl Serialize for CompactState {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CompactState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        CompactRecord::deserialize(deserializer).map(CompactState::from_record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let state = CompactState::new("s");
        assert_eq!(state.status(), Status::Unstarted);
        state.start();
        assert_eq!(state.status(), Status::Started);
        assert!(state.proceeding());
        state.succeed();
        assert_eq!(state.status(), Status::Done);
        assert!(state.succeeded());
        assert!(state.started());
        state.start();
        assert_eq!(state.status(), Status::Done);
    }

    #[test]
    fn test_fail() {
        let state = CompactState::new("s");
        state.start();
        state.fail("nope");
        assert!(state.failed());
        assert!(state.terminal());
        assert_eq!(state.errors(), vec!["nope".to_string()]);
    }

    #[test]
    fn test_sync_result() {
        let parent = CompactState::new("p");
        parent.start();
        let child = parent.derive("c");
        child.start();
        child.fail("bad");
        parent.sync_result(&child);
        assert!(parent.failed());
        assert_eq!(parent.errors(), vec!["c: bad".to_string()]);
    }

    #[test]
    fn test_recover() {
        let root = CompactState::new("");
        root.start();
        let a = root.derive("a");
        a.start();
        a.fail("bad");
        root.sync_result(&a);

        root.recover();

        assert!(root.proceeding());
        assert!(root.errors().is_empty());
        assert_eq!(a.status(), Status::Unstarted);
        assert!(a.errors().is_empty());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let root = CompactState::new("root");
        root.start();
        let child = root.derive("child");
        child.start();
        child.succeed();
        root.sync_result(&child);

        let json = serde_json::to_string(&root).unwrap();
        assert!(json.contains("\"status\":\"done\""));
        let loaded: CompactState = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.to_record(), root.to_record());
        assert!(loaded.get("child").unwrap().succeeded());
    }
}
