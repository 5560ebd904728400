//! Plan Executor
//!
//! Runs a [`Plan`] against persisted progress:
//! 1. Loads the root state through the adapter
//! 2. Optionally rewinds a failed previous attempt
//! 3. Walks the plan, one step per task in declared order
//! 4. Logs a summary of the recorded outcome
//! 5. Hands the root back to the adapter
//!
//! Steps that completed in an earlier run are skipped by the engine itself;
//! the executor adds no scheduling of its own.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::error::Result;
use crate::execution::Step;
use crate::monitoring::TreeSummary;
use crate::persistence::Adapter;
use crate::state::{State, StateNode};

use super::task::{Plan, Task};

/// Executes plans against one adapter.
///
/// # Example
///
/// ```
/// use stepwise::persistence::MemoryAdapter;
/// use stepwise::plan::{Executor, Plan, Task};
/// use stepwise::StateNode;
///
/// let plan: Plan = Plan::new().with(Task::new("step1").prepare(|step| {
///     step.succeed();
/// }));
///
/// let mut executor = Executor::new(MemoryAdapter::new("pipeline"));
/// let state = executor.execute(&plan).unwrap();
/// assert!(state.succeeded());
/// ```
#[derive(Debug)]
pub struct Executor<A, S: StateNode = State> {
    adapter: A,
    recover_failed: bool,
    save_on_failure: bool,
    state: Option<Arc<S>>,
}

impl<A, S> Executor<A, S>
where
    A: Adapter<S>,
    S: StateNode,
{
    /// Creates an executor. Failed runs are saved and not rewound by
    /// default.
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            recover_failed: false,
            save_on_failure: true,
            state: None,
        }
    }

    /// Rewinds a root that failed in a previous run before walking.
    pub fn set_recover_failed(&mut self, recover: bool) {
        self.recover_failed = recover;
    }

    /// Whether a run that ends failed is persisted. When disabled the next
    /// run resumes from the previous snapshot instead.
    pub fn set_save_on_failure(&mut self, save: bool) {
        self.save_on_failure = save;
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Root state of the most recent run.
    pub fn state(&self) -> Option<&Arc<S>> {
        self.state.as_ref()
    }

    /// Runs the plan and persists the resulting tree.
    ///
    /// # Returns
    ///
    /// * `Ok(root)` - The walk finished and the root was saved (or
    ///   skipped by `save_on_failure`); inspect it for step outcomes
    /// * `Err` - Loading or saving failed
    pub fn execute(&mut self, plan: &Plan<S>) -> Result<Arc<S>> {
        let start_time = Instant::now();

        let state = Arc::new(self.adapter.load_state()?);

        if state.failed() {
            if self.recover_failed {
                info!(
                    "Previous run failed at '{}' - recovering",
                    state.last_path()
                );
                state.recover();
            } else {
                warn!(
                    "Previous run failed at '{}'; failed steps will not run again",
                    state.last_path()
                );
            }
        }

        info!("Executing plan with {} top-level tasks", plan.len());

        let step = Step::new(Arc::clone(&state));
        for task in plan.tasks() {
            Self::do_task(&step, task);
        }

        let summary = TreeSummary::of(&*state);
        if state.failed() {
            for err in state.errors() {
                error!("{}", err);
            }
        }
        info!("{} in {:.2?}", summary, start_time.elapsed());

        self.state = Some(Arc::clone(&state));

        if state.failed() && !self.save_on_failure {
            warn!("Run failed - not saving state");
            return Ok(state);
        }
        self.adapter.save_state(&state)?;

        Ok(state)
    }

    fn do_task(step: &Step<S>, task: &Task<S>) {
        if let Some(handler) = task.handler() {
            step.do_step(task.name(), |s| handler(s));
        } else if !task.tasks().is_empty() {
            step.do_step(task.name(), |s| {
                for sub in task.tasks() {
                    Self::do_task(s, sub);
                }
            });
        } else {
            debug!("Task '{}' has nothing to run", task.name());
        }
    }
}
