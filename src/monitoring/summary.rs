//! Progress Tree Summaries
//!
//! Counts and renders the outcome of every step recorded below a root.

use std::fmt;

use chrono::Duration;
use colored::Colorize;

use crate::state::{State, StateNode};

/// Outcome counts over every node below a root, the root excluded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TreeSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub proceeding: usize,
    pub unstarted: usize,
}

impl TreeSummary {
    pub fn of<S: StateNode>(root: &S) -> Self {
        let mut summary = Self::default();
        summary.count_children(root);
        summary
    }

    fn count_children<S: StateNode>(&mut self, node: &S) {
        for child in node.children() {
            self.total += 1;
            if child.failed() {
                self.failed += 1;
            } else if child.succeeded() {
                self.succeeded += 1;
            } else if child.proceeding() {
                self.proceeding += 1;
            } else {
                self.unstarted += 1;
            }
            self.count_children(child.as_ref());
        }
    }

    /// True when every recorded step succeeded.
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }
}

impl fmt::Display for TreeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} steps: {} succeeded, {} failed, {} proceeding, {} not started",
            self.total, self.succeeded, self.failed, self.proceeding, self.unstarted
        )
    }
}

/// Renders the tree one node per line, indented by depth.
///
/// ```text
/// deploy (4.02s)
///   [ok] build (1.00s)
///   [fail] push: denied
/// ```
pub fn render_tree(root: &State, color: bool) -> String {
    let mut out = format!("{}{}\n", display_name(root.name()), timing(root));
    render_children(root, 1, color, &mut out);
    out
}

fn render_children(node: &State, depth: usize, color: bool, out: &mut String) {
    for child in node.children() {
        let indent = "  ".repeat(depth);
        let marker = marker(&child, color);
        let name = display_name(child.name());
        let errors = child.errors();

        if errors.is_empty() {
            out.push_str(&format!("{}{} {}{}\n", indent, marker, name, timing(&child)));
        } else if child.children_len() == 0 {
            out.push_str(&format!("{}{} {}: {}\n", indent, marker, name, errors.join("; ")));
        } else {
            // Nested errors repeat at every level; the leaves carry them.
            out.push_str(&format!("{}{} {}{}\n", indent, marker, name, timing(&child)));
        }
        render_children(&child, depth + 1, color, out);
    }
}

fn marker(node: &State, color: bool) -> String {
    let text = if node.failed() {
        "[fail]"
    } else if node.succeeded() {
        "[ok]"
    } else if node.proceeding() {
        "[..]"
    } else {
        "[  ]"
    };
    if !color {
        return text.to_string();
    }

    let painted = match text {
        "[fail]" => text.red().bold(),
        "[ok]" => text.green(),
        "[..]" => text.yellow(),
        _ => text.dimmed(),
    };
    painted.to_string()
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "(anonymous)"
    } else {
        name
    }
}

fn timing(node: &State) -> String {
    match (node.started_at(), node.done_at()) {
        (Some(start), Some(done)) => format!(" ({})", format_duration(done - start)),
        _ => String::new(),
    }
}

/// Formats a duration as milliseconds below one second, seconds above.
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.num_milliseconds().max(0);
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.2}s", ms as f64 / 1000.0)
    }
}
