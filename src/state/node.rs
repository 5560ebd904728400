//! Timestamped State Node
//!
//! The reference [`StateNode`] backend. Records when a step started and when
//! it reached its terminal outcome, which is what the monitoring reports and
//! the file adapter persist.
//!
//! # Persisted Format
//!
//! ```json
//! {
//!   "name": "deploy",
//!   "info": {"revision": 3},
//!   "errs": [],
//!   "startedAt": "2024-05-01T10:00:00Z",
//!   "doneAt": "2024-05-01T10:00:04Z",
//!   "states": []
//! }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::StateNode;

/// Start, done and error fields, guarded together so a merge from a child
/// is never observed half applied.
#[derive(Debug, Default, Clone)]
struct Progress {
    errs: Vec<String>,
    started_at: Option<DateTime<Utc>>,
    done_at: Option<DateTime<Utc>>,
}

/// A node of the persisted progress tree.
#[derive(Debug)]
pub struct State {
    name: String,
    info: RwLock<Value>,
    progress: Mutex<Progress>,
    states: RwLock<Vec<Arc<State>>>,
}

/// Plain, serializable mirror of a [`State`] subtree.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub name: String,

    #[serde(default)]
    pub info: Value,

    #[serde(default)]
    pub errs: Vec<String>,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub done_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub states: Vec<StateRecord>,
}

impl State {
    /// Creates a fresh, unstarted node.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            info: RwLock::new(Value::Null),
            progress: Mutex::new(Progress::default()),
            states: RwLock::new(Vec::new()),
        }
    }

    /// Creates a fresh node carrying an info payload.
    pub fn with_info(name: impl Into<String>, info: impl Into<Value>) -> Self {
        let state = Self::new(name);
        state.set_info(info.into());
        state
    }

    /// When the step first started, if it has.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.progress().started_at
    }

    /// When the step reached its terminal outcome, if it has.
    pub fn done_at(&self) -> Option<DateTime<Utc>> {
        self.progress().done_at
    }

    /// Copies the subtree into its serializable record.
    pub fn to_record(&self) -> StateRecord {
        let progress = self.progress().clone();
        StateRecord {
            name: self.name.clone(),
            info: self.info(),
            errs: progress.errs,
            started_at: progress.started_at,
            done_at: progress.done_at,
            states: self.states().iter().map(|s| s.to_record()).collect(),
        }
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn states(&self) -> RwLockReadGuard<'_, Vec<Arc<State>>> {
        self.states.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn states_mut(&self) -> RwLockWriteGuard<'_, Vec<Arc<State>>> {
        self.states.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateNode for State {
    fn fresh(name: &str) -> Self {
        State::new(name)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) {
        let mut progress = self.progress();
        if progress.started_at.is_none() {
            progress.started_at = Some(Utc::now());
        }
    }

    fn succeed(&self) {
        let mut progress = self.progress();
        progress.errs.clear();
        progress.done_at = Some(Utc::now());
    }

    fn fail(&self, err: &str) {
        let mut progress = self.progress();
        progress.errs = vec![err.to_string()];
        progress.done_at = Some(Utc::now());
    }

    fn started(&self) -> bool {
        self.progress().started_at.is_some()
    }

    fn succeeded(&self) -> bool {
        let progress = self.progress();
        progress.done_at.is_some() && progress.errs.is_empty()
    }

    fn failed(&self) -> bool {
        let progress = self.progress();
        progress.done_at.is_some() && !progress.errs.is_empty()
    }

    fn proceeding(&self) -> bool {
        let progress = self.progress();
        progress.started_at.is_some() && progress.done_at.is_none()
    }

    fn terminal(&self) -> bool {
        self.progress().done_at.is_some()
    }

    fn errors(&self) -> Vec<String> {
        self.progress().errs.clone()
    }

    fn derive(&self, name: &str) -> Arc<Self> {
        let child = Arc::new(State::new(name));
        self.add(Arc::clone(&child));
        child
    }

    fn add(&self, child: Arc<Self>) {
        self.states_mut().push(child);
    }

    fn sync_result(&self, child: &Self) {
        let (errs, done_at) = {
            let theirs = child.progress();
            (theirs.errs.clone(), theirs.done_at)
        };
        let mut progress = self.progress();
        for err in errs {
            progress.errs.push(format!("{}: {}", child.name, err));
        }
        progress.done_at = done_at;
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
            progress.done_at = None;
            if last.is_none() {
                progress.started_at = None;
            }
        }
        if let Some(last) = last {
            last.recover();
        }
    }
}

impl From<StateRecord> for State {
    fn from(record: StateRecord) -> Self {
        Self {
            name: record.name,
            info: RwLock::new(record.info),
            progress: Mutex::new(Progress {
                errs: record.errs,
                started_at: record.started_at,
                done_at: record.done_at,
            }),
            states: RwLock::new(
                record
                    .states
                    .into_iter()
                    .map(|s| Arc::new(State::from(s)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for State {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        StateRecord::deserialize(deserializer).map(State::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fresh_state() {
        let state = State::new("fresh");
        assert_eq!(state.name(), "fresh");
        assert!(!state.started());
        assert!(!state.proceeding());
        assert!(!state.terminal());
        assert!(state.errors().is_empty());
        assert_eq!(state.children_len(), 0);
        assert_eq!(state.info(), Value::Null);
    }

    #[test]
    fn test_start_is_idempotent() {
        let state = State::new("s");
        state.start();
        let first = state.started_at();
        state.start();
        assert_eq!(state.started_at(), first);
        assert!(state.proceeding());
    }

    #[test]
    fn test_succeed() {
        let state = State::new("s");
        state.start();
        state.succeed();
        assert!(state.succeeded());
        assert!(!state.failed());
        assert!(!state.proceeding());
        assert!(state.done_at().is_some());
    }

    #[test]
    fn test_fail_keeps_single_error() {
        let state = State::new("s");
        state.start();
        state.fail("first");
        state.fail("second");
        assert!(state.failed());
        assert_eq!(state.errors(), vec!["second".to_string()]);
    }

    #[test]
    fn test_succeed_after_fail_clears_errors() {
        let state = State::new("s");
        state.fail("boom");
        state.succeed();
        assert!(state.succeeded());
        assert!(state.errors().is_empty());
    }

    #[test]
    fn test_derive_keeps_order_and_duplicates() {
        let state = State::new("root");
        state.derive("a");
        state.derive("b");
        state.derive("a");
        let names: Vec<String> = state.children().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b", "a"]);
        assert!(!state.state_at(0).unwrap().started());
        assert!(state.state_at(3).is_none());
    }

    #[test]
    fn test_add_external_child() {
        let state = State::new("root");
        let child = Arc::new(State::with_info("external", "payload"));
        state.add(child);
        assert_eq!(state.state_at(0).unwrap().info(), Value::from("payload"));
    }

    #[test]
    fn test_sync_result_prefixes_errors() {
        let parent = State::new("parent");
        let child = parent.derive("child");
        child.start();
        child.fail("broken");
        parent.sync_result(&child);
        assert!(parent.failed());
        assert_eq!(parent.errors(), vec!["child: broken".to_string()]);
        assert_eq!(parent.done_at(), child.done_at());
    }

    #[test]
    fn test_sync_result_adopts_proceeding() {
        let parent = State::new("parent");
        parent.start();
        parent.succeed();
        let child = parent.derive("child");
        child.start();
        parent.sync_result(&child);
        assert!(parent.proceeding());
    }

    #[test]
    fn test_concurrent_sync_result() {
        let parent = Arc::new(State::new("parent"));
        let handles: Vec<_> = (0..100)
            .map(|i| {
                let parent = Arc::clone(&parent);
                thread::spawn(move || {
                    let child = parent.derive(&format!("c{}", i));
                    child.start();
                    child.fail("x");
                    parent.sync_result(&child);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(parent.errors().len(), 100);
        assert_eq!(parent.children_len(), 100);
    }

    #[test]
    fn test_recover_rewinds_latest_attempt() {
        let root = State::new("root");
        root.start();
        let a = root.derive("a");
        a.start();
        let done = a.derive("a");
        done.start();
        done.succeed();
        let b = a.derive("b");
        b.start();
        b.fail("boom");
        a.sync_result(&b);
        root.sync_result(&a);

        root.recover();

        assert!(root.errors().is_empty());
        assert!(root.done_at().is_none());
        assert!(a.errors().is_empty());
        assert!(a.done_at().is_none());
        assert!(b.errors().is_empty());
        assert!(b.done_at().is_none());
        assert!(!b.started());
        assert!(a.started());
        assert!(done.succeeded());
    }

    #[test]
    fn test_record_roundtrip() {
        let root = State::with_info("root", serde_json::json!({"k": 1}));
        root.start();
        let child = root.derive("child");
        child.start();
        child.fail("bad");
        root.sync_result(&child);

        let json = serde_json::to_string(&root).unwrap();
        let loaded: State = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.to_record(), root.to_record());
        assert!(loaded.failed());
        assert_eq!(loaded.get("child").unwrap().errors(), vec!["bad".to_string()]);
    }

    #[test]
    fn test_record_field_names() {
        let root = State::new("root");
        root.start();
        let value = serde_json::to_value(&root).unwrap();
        assert!(value.get("startedAt").is_some());
        assert!(value.get("doneAt").is_some());
        assert!(value.get("errs").is_some());
        assert!(value.get("states").is_some());
    }

    #[test]
    fn test_deserialize_minimal_record() {
        let loaded: State = serde_json::from_str(r#"{"name": "only"}"#).unwrap();
        assert_eq!(loaded.name(), "only");
        assert!(!loaded.started());
        assert_eq!(loaded.children_len(), 0);
    }
}
