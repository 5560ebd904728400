//! Async Fan-Out Regions
//!
//! An [`AsyncRegion`] is handed to the body of
//! [`Step::async_region`](super::Step::async_region). Every step issued
//! through it runs on its own scoped thread and is joined before the region
//! returns, so no branch outlives the call that spawned it.
//!
//! Branches skip the ordering gate: each one runs on every pass unless its
//! own recorded state is already terminal. Their outcomes merge into the
//! shared parent one at a time.

use std::thread::Scope;

use log::debug;

use crate::state::{path, StateNode};

use super::step::{behavior_name, Step};

/// Concurrent step issuer bound to one parent step.
pub struct AsyncRegion<'scope, 'env: 'scope, S: StateNode> {
    scope: &'scope Scope<'scope, 'env>,
    step: &'env Step<S>,
    name: String,
}

impl<'scope, 'env, S: StateNode> AsyncRegion<'scope, 'env, S> {
    pub(super) fn new(scope: &'scope Scope<'scope, 'env>, step: &'env Step<S>, name: &str) -> Self {
        Self {
            scope,
            step,
            name: name.to_string(),
        }
    }

    /// Name prefix given to every child of this region.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawns `behavior` as the child `"<region>/<name>"`.
    ///
    /// The child's slot in the parent is claimed before the thread starts, so
    /// recorded order follows issue order.
    pub fn do_step<F>(&self, name: &str, behavior: F) -> &Self
    where
        F: FnOnce(&Step<S>) + Send + 'scope,
    {
        let step = self.step;
        step.state().start();
        let child = step.resolve_child(&path::async_name(&self.name, name));
        debug!("'{}': spawning '{}'", step.state().name(), child.name());
        self.scope.spawn(move || step.run_child(child, behavior));
        self
    }

    /// Spawns an anonymous child, recorded as `"<region>/"`.
    pub fn do_anon<F>(&self, behavior: F) -> &Self
    where
        F: FnOnce(&Step<S>) + Send + 'scope,
    {
        self.do_step("", behavior)
    }

    /// Spawns a child named after the behavior's own identifier.
    pub fn do_behavior<F>(&self, behavior: F) -> &Self
    where
        F: FnOnce(&Step<S>) + Send + 'scope,
    {
        self.do_step(behavior_name::<F>(), behavior)
    }
}
