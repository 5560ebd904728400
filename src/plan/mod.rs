//! Plan Module
//!
//! Declarative task trees and the executor that runs them against an
//! [`Adapter`](crate::persistence::Adapter).

pub mod executor;
pub mod task;

pub use executor::Executor;
pub use task::{Handler, Plan, Task};
