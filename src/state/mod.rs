//! Progress State Module
//!
//! The persisted progress tree. Every node records one named unit of work:
//! whether it started, whether it reached a terminal outcome, the errors it
//! collected and the ordered children it spawned.
//!
//! # Backends
//!
//! - [`State`]: the reference node with start/done timestamps
//! - [`CompactState`]: status-only node for callers that persist little
//!
//! The [`Step`](crate::execution::Step) engine only talks to the
//! [`StateNode`] trait, so another storage substrate plugs in by implementing
//! it.

pub mod compact;
pub mod node;
pub mod path;

use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, StepError};

pub use compact::{CompactState, Status};
pub use node::{State, StateRecord};

/// Capability interface shared by every state backend.
///
/// All methods take `&self` and must be safe to call concurrently: async
/// siblings append to and merge into the same parent at the same time.
pub trait StateNode: Send + Sync + Sized + 'static {
    /// A new, unstarted root node.
    fn fresh(name: &str) -> Self;

    /// Name of this node, as addressed by paths.
    fn name(&self) -> &str;

    /// Marks the node as proceeding. No-op once started.
    fn start(&self);

    /// Terminal success. Clears any recorded errors.
    fn succeed(&self);

    /// Terminal failure with `err` as the only recorded error.
    fn fail(&self, err: &str);

    fn started(&self) -> bool;
    fn succeeded(&self) -> bool;
    fn failed(&self) -> bool;
    fn proceeding(&self) -> bool;

    /// True once the node succeeded or failed.
    fn terminal(&self) -> bool {
        self.succeeded() || self.failed()
    }

    /// Snapshot of the recorded errors.
    fn errors(&self) -> Vec<String>;

    /// Creates, appends and returns a new unstarted child.
    fn derive(&self, name: &str) -> Arc<Self>;

    /// Appends an externally built child.
    fn add(&self, child: Arc<Self>);

    /// Merges a child's outcome: its errors, prefixed with its name, and its
    /// terminal flag.
    fn sync_result(&self, child: &Self);

    /// Child at `index`, if recorded.
    fn state_at(&self, index: usize) -> Option<Arc<Self>>;

    /// Snapshot of the children in recorded order.
    fn children(&self) -> Vec<Arc<Self>>;

    fn children_len(&self) -> usize;

    fn set_info(&self, info: Value);

    fn info(&self) -> Value;

    /// Rewinds the latest attempt so it runs again on the next pass.
    fn recover(&self);

    /// Resolves a dot-delimited path of child names.
    fn get(&self, path: &str) -> Result<Arc<Self>> {
        resolve(self, path).ok_or_else(|| StepError::PathNotFound(path.to_string()))
    }

    /// True if `path` resolves to a node that has started.
    fn has(&self, path: &str) -> bool {
        resolve(self, path).map(|s| s.started()).unwrap_or(false)
    }

    /// Dot path of the most recent attempt below this node.
    fn last_path(&self) -> String {
        let mut ret = String::new();
        let mut cur = self.children().pop();
        while let Some(node) = cur {
            ret = path::join(&ret, node.name());
            cur = node.children().pop();
        }
        ret
    }
}

/// First child named after each segment in turn; `None` when a segment is
/// absent or empty.
fn resolve<S: StateNode>(root: &S, path: &str) -> Option<Arc<S>> {
    let mut segments = path::segments(path);
    let mut node = find_child(root, segments.next()?)?;
    for name in segments {
        node = find_child(node.as_ref(), name)?;
    }
    Some(node)
}

/// Anonymous children carry an empty name and are never addressable.
fn find_child<S: StateNode>(node: &S, name: &str) -> Option<Arc<S>> {
    if name.is_empty() {
        return None;
    }
    node.children().into_iter().find(|c| c.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> State {
        let root = State::new("root");
        let a = root.derive("a");
        a.start();
        let b = a.derive("b");
        b.start();
        let c = b.derive("c");
        c.start();
        root
    }

    #[test]
    fn test_get_nested() {
        let root = tree();
        let node = root.get("a.b.c").unwrap();
        assert_eq!(node.name(), "c");
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let root = tree();
        let err = root.get("a.x").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("a.x"));
    }

    #[test]
    fn test_has() {
        let root = tree();
        assert!(root.has("a"));
        assert!(root.has("a.b"));
        assert!(root.has("a.b.c"));
        assert!(!root.has("a.c"));
        assert!(!root.has("b"));
        assert!(!root.has(""));
    }

    #[test]
    fn test_anonymous_nodes_are_unaddressable() {
        let root = State::new("root");
        let anon = root.derive("");
        anon.start();
        let inner = anon.derive("inner");
        inner.start();
        let a = root.derive("a");
        a.start();
        a.derive("").start();

        assert!(!root.has(""));
        assert!(root.get("").unwrap_err().is_not_found());
        assert!(!root.has(".inner"));
        assert!(!root.has("a."));
        assert!(root.get("a..b").is_err());
        assert!(root.has("a"));
    }

    #[test]
    fn test_has_requires_started() {
        let root = State::new("root");
        root.derive("pending");
        assert!(root.get("pending").is_ok());
        assert!(!root.has("pending"));
    }

    #[test]
    fn test_get_first_of_duplicate_names() {
        let root = State::new("root");
        let first = root.derive("dup");
        first.succeed();
        root.derive("dup");
        assert!(root.get("dup").unwrap().succeeded());
    }

    #[test]
    fn test_last_path() {
        let root = tree();
        root.derive("z");
        assert_eq!(root.last_path(), "z");
        assert_eq!(root.get("a").unwrap().last_path(), "b.c");
        assert_eq!(State::new("empty").last_path(), "");
    }
}
