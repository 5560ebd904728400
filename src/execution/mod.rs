//! Step Execution Module
//!
//! Drives behaviors against the progress tree, deciding per call whether to
//! run, skip or refuse a step.
//!
//! # Architecture
//!
//! - [`step`]: the execution cursor with resume, skip and gate logic
//! - [`region`]: concurrent fan-out with a barrier join

pub mod region;
pub mod step;

pub use region::AsyncRegion;
pub use step::{behavior_name, Step};
