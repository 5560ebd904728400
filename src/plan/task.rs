//! Declarative Task Trees
//!
//! A [`Plan`] is a static, named task tree declared ahead of a run. The
//! [`Executor`](super::Executor) walks it by issuing one step per task in
//! declared order, so a plan behaves exactly like the equivalent nested
//! `do_step` calls.
//!
//! # Example
//!
//! ```
//! use stepwise::plan::{Plan, Task};
//!
//! let plan: Plan = Plan::new()
//!     .with(Task::new("build").prepare(|step| {
//!         step.succeed();
//!     }))
//!     .with(
//!         Task::new("release")
//!             .with(Task::new("tag").prepare(|step| {
//!                 step.succeed();
//!             }))
//!             .with(Task::new("publish").prepare(|step| {
//!                 step.succeed();
//!             })),
//!     );
//!
//! assert_eq!(plan.len(), 2);
//! assert_eq!(plan.tasks()[1].tasks().len(), 2);
//! ```

use std::fmt;

use crate::execution::Step;
use crate::state::{State, StateNode};

/// Behavior attached to a task. Plans may run many times, so handlers are
/// `Fn` rather than `FnOnce`.
pub type Handler<S> = Box<dyn Fn(&Step<S>) + Send + Sync>;

/// One named node of a plan.
pub struct Task<S: StateNode = State> {
    name: String,
    handler: Option<Handler<S>>,
    tasks: Vec<Task<S>>,
}

impl<S: StateNode> Task<S> {
    /// Creates a task with no behavior and no subtasks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: None,
            tasks: Vec::new(),
        }
    }

    /// Sets the behavior run for this task.
    ///
    /// A task with a behavior runs only that behavior; its subtasks are not
    /// walked.
    pub fn prepare<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Step<S>) + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Appends a subtask.
    pub fn with(mut self, task: Task<S>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tasks(&self) -> &[Task<S>] {
        &self.tasks
    }

    pub fn handler(&self) -> Option<&Handler<S>> {
        self.handler.as_ref()
    }

    /// Total number of tasks in this subtree, this one included.
    pub fn count(&self) -> usize {
        1 + self.tasks.iter().map(Task::count).sum::<usize>()
    }
}

impl<S: StateNode> fmt::Debug for Task<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("handler", &self.handler.is_some())
            .field("tasks", &self.tasks)
            .finish()
    }
}

/// Ordered top-level tasks of a run.
pub struct Plan<S: StateNode = State> {
    tasks: Vec<Task<S>>,
}

impl<S: StateNode> Plan<S> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Appends a top-level task.
    pub fn with(mut self, task: Task<S>) -> Self {
        self.tasks.push(task);
        self
    }

    /// Appends a top-level task in place.
    pub fn add(&mut self, task: Task<S>) -> &mut Self {
        self.tasks.push(task);
        self
    }

    pub fn tasks(&self) -> &[Task<S>] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<S: StateNode> Default for Plan<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateNode> fmt::Debug for Plan<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan").field("tasks", &self.tasks).finish()
    }
}
