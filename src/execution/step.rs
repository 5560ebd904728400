//! Step Execution Cursor
//!
//! A [`Step`] pairs one behavior invocation with one node of the progress
//! tree. Nested `do_step` calls build the tree on the first pass and replay
//! it on later passes:
//!
//! - a child whose recorded state is terminal is skipped, its behavior is
//!   never invoked again
//! - a new sibling is refused while an earlier sibling of this pass is still
//!   proceeding or has failed (the ordering gate)
//! - a finished child merges its outcome into its parent's state
//!
//! Nothing here short-circuits on failure. Every decision is read back from
//! recorded state, which is why re-running the same call sequence from the
//! top reproduces the same decisions.

use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, Weak};
use std::thread;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, StepError};
use crate::state::{State, StateNode};

use super::region::AsyncRegion;

/// Position past the last recorded child this pass attached to a step.
/// Children before it are never matched again on this pass.
#[derive(Debug, Default)]
struct Cursor {
    next: usize,
}

impl Cursor {
    fn claim(&mut self, index: usize) {
        self.next = index + 1;
    }
}

/// In-memory execution cursor over one state node.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stepwise::{State, StateNode, Step};
///
/// let step = Step::new(Arc::new(State::new("deploy")));
/// step.do_step("build", |s| {
///     s.succeed();
/// })
/// .do_step("release", |s| {
///     s.fail("registry unavailable");
/// });
///
/// assert!(step.state().get("build").unwrap().succeeded());
/// assert_eq!(step.state().errors(), vec!["release: registry unavailable"]);
/// ```
#[derive(Debug)]
pub struct Step<S: StateNode = State> {
    state: Arc<S>,
    parent: Option<Weak<S>>,
    children: RwLock<Vec<Step<S>>>,
    cursor: Mutex<Cursor>,
}

impl<S: StateNode> Step<S> {
    /// Wraps a root state, fresh or loaded by an adapter.
    pub fn new(state: Arc<S>) -> Self {
        Self {
            state,
            parent: None,
            children: RwLock::new(Vec::new()),
            cursor: Mutex::new(Cursor::default()),
        }
    }

    fn child_of(parent: &Arc<S>, state: Arc<S>) -> Self {
        Self {
            state,
            parent: Some(Arc::downgrade(parent)),
            children: RwLock::new(Vec::new()),
            cursor: Mutex::new(Cursor::default()),
        }
    }

    /// The state node this step drives.
    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    /// Number of child steps issued on this pass, skipped ones included.
    pub fn children_len(&self) -> usize {
        self.children().len()
    }

    /// Marks this step as done successfully.
    pub fn succeed(&self) -> &Self {
        self.state.succeed();
        self
    }

    /// Marks this step as done with `err` as its error.
    pub fn fail(&self, err: impl Display) -> &Self {
        self.state.fail(&err.to_string());
        self
    }

    /// Replaces the info payload of this step's state.
    pub fn with(&self, info: impl Into<Value>) -> &Self {
        self.state.set_info(info.into());
        self
    }

    /// Invokes `handler` with the info payload.
    pub fn info<R>(&self, handler: impl FnOnce(&Value) -> R) -> R {
        handler(&self.state.info())
    }

    /// Decodes the info payload into a caller type.
    pub fn info_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.state.info()).map_err(|e| {
            StepError::Info(format!("step '{}': {}", self.state.name(), e))
        })
    }

    /// Runs `behavior` as the named child step of this one.
    ///
    /// The call is a no-op while an earlier child of this pass is proceeding
    /// or has failed. A child already recorded as terminal is skipped.
    pub fn do_step<F>(&self, name: &str, behavior: F) -> &Self
    where
        F: FnOnce(&Step<S>),
    {
        if !self.gate_open() {
            debug!(
                "'{}': gate closed, not running '{}'",
                self.state.name(),
                name
            );
            return self;
        }
        self.state.start();
        let child = self.resolve_child(name);
        self.run_child(child, behavior);
        self
    }

    /// Runs an anonymous child step. It can not be addressed by path.
    pub fn do_anon<F>(&self, behavior: F) -> &Self
    where
        F: FnOnce(&Step<S>),
    {
        self.do_step("", behavior)
    }

    /// Runs a child step named after the behavior's own identifier.
    ///
    /// Meant for plain `fn` items; closures all resolve to `{{closure}}`.
    /// The name comes from type introspection, keep it off hot paths.
    pub fn do_behavior<F>(&self, behavior: F) -> &Self
    where
        F: FnOnce(&Step<S>),
    {
        self.do_step(behavior_name::<F>(), behavior)
    }

    /// Runs the child steps issued by `body` concurrently.
    ///
    /// Each child is recorded as `"<name>/<child>"`, bypasses the ordering
    /// gate and runs on its own thread. Returns once every child has
    /// finished. A panicking child panics the caller after the join.
    pub fn async_region<'env, F>(&'env self, name: &str, body: F) -> &'env Self
    where
        F: for<'scope> FnOnce(&AsyncRegion<'scope, 'env, S>),
    {
        debug!("'{}': entering async region '{}'", self.state.name(), name);
        thread::scope(|scope| {
            let region = AsyncRegion::new(scope, self, name);
            body(&region);
        });
        debug!("'{}': async region '{}' joined", self.state.name(), name);
        self
    }

    /// True unless a child of this pass is still proceeding or has failed.
    fn gate_open(&self) -> bool {
        !self
            .children()
            .iter()
            .any(|c| c.state.proceeding() || c.state.failed())
    }

    /// Attaches the recorded child for `name`, or derives a new one.
    ///
    /// A recorded child is matched by name, only at or after the cursor, so
    /// an unchanged call sequence replays positionally and a removed branch
    /// does not shift later matches. A step with no match ahead is derived
    /// at the end, which keeps recorded order equal to execution order.
    pub(super) fn resolve_child(&self, name: &str) -> Arc<S> {
        let mut cursor = self.cursor();
        let recorded = self.state.children();

        let found = (cursor.next..recorded.len()).find(|&i| recorded[i].name() == name);

        match found {
            Some(index) => {
                if index != cursor.next {
                    warn!(
                        "'{}': resuming '{}' from recorded position {} (expected {})",
                        self.state.name(),
                        name,
                        index,
                        cursor.next
                    );
                }
                cursor.claim(index);
                Arc::clone(&recorded[index])
            }
            None => {
                let child = self.state.derive(name);
                let index = self.state.children_len() - 1;
                cursor.claim(index);
                child
            }
        }
    }

    /// Runs a resolved child unless it is already terminal, then records it.
    pub(super) fn run_child<F>(&self, state: Arc<S>, behavior: F)
    where
        F: FnOnce(&Step<S>),
    {
        let step = Step::child_of(&self.state, state);
        if step.state.terminal() {
            debug!("'{}': already done, skipping", step.state.name());
        } else {
            step.state.start();
            behavior(&step);
            step.sync_up();
        }
        self.children
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(step);
    }

    /// Merges this step's outcome into its parent's state.
    fn sync_up(&self) {
        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent.sync_result(&self.state);
        }
    }

    fn children(&self) -> RwLockReadGuard<'_, Vec<Step<S>>> {
        self.children.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cursor(&self) -> MutexGuard<'_, Cursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Short identifier of a behavior type: the last path segment of its type
/// name, generic arguments removed.
pub fn behavior_name<F>() -> &'static str {
    let full = std::any::type_name::<F>();
    let bytes = full.as_bytes();
    let (mut start, mut end) = (0, full.len());
    let mut depth = 0usize;

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => {
                if depth == 0 {
                    end = i;
                }
                depth += 1;
            }
            // `->` inside a fn pointer argument is not a closing bracket
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                start = i + 2;
                end = full.len();
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    &full[start..end]
}
