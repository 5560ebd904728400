//! Progress Monitoring Module
//!
//! Read-only reports over a recorded progress tree.
//!
//! # Components
//!
//! - [`TreeSummary`]: outcome counts, also logged after every plan run
//! - [`render_tree`]: indented status listing of a tree
//! - [`StepTimeline`]: step start/done timing for Gantt charts

pub mod summary;
pub mod timeline;

pub use summary::{format_duration, render_tree, TreeSummary};
pub use timeline::{SpanOutcome, StepSpan, StepTimeline};
