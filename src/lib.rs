//! Stepwise - Resumable Step Execution Engine
//!
//! Runs multi-stage operations as a tree of named steps whose progress is
//! persisted. Re-invoking the same code against the saved tree skips every
//! step that already finished, so an interrupted run picks up where it
//! stopped and a completed one becomes a no-op.
//!
//! # Architecture
//!
//! - [`state`]: the persisted progress tree and its backends
//! - [`execution`]: the step cursor, ordering gate and async fan-out
//! - [`persistence`]: load/save adapters around a run
//! - [`plan`]: declarative task trees and their executor
//! - [`monitoring`]: summaries and timelines of a recorded tree
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stepwise::{Adapter, FileAdapter, StateNode, Step};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter: FileAdapter = FileAdapter::new("deploy.state.json")?;
//!     let state = Arc::new(adapter.load_state()?);
//!
//!     let root = Step::new(Arc::clone(&state));
//!     root.do_step("build", |s| {
//!         s.succeed();
//!     })
//!     .async_region("fanout", |region| {
//!         for host in ["a", "b", "c"] {
//!             region.do_step(host, move |s| {
//!                 s.with(serde_json::json!({ "host": host }));
//!                 s.succeed();
//!             });
//!         }
//!     })
//!     .do_step("verify", |s| {
//!         s.succeed();
//!     });
//!
//!     adapter.save_state(&state)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod execution;
pub mod monitoring;
pub mod persistence;
pub mod plan;
pub mod state;

// Re-export commonly used types
pub use error::{Result, StepError};
pub use execution::{AsyncRegion, Step};
pub use persistence::{Adapter, FileAdapter, MemoryAdapter};
pub use plan::{Executor, Plan, Task};
pub use state::{CompactState, State, StateNode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "stepwise";
