//! Step Timeline
//!
//! Rebuilds when each recorded step ran from the timestamps persisted in the
//! progress tree, for timing reports and Gantt charts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::state::{path, State, StateNode};

/// How a span ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanOutcome {
    Succeeded,
    Failed,
    /// Still proceeding when the tree was saved
    Open,
}

/// When one step ran.
#[derive(Debug, Clone)]
pub struct StepSpan {
    /// Dot path of the step below the root
    pub path: String,
    pub started_at: DateTime<Utc>,
    pub done_at: Option<DateTime<Utc>>,
    pub outcome: SpanOutcome,
}

/// Every started step below a root, ordered by start time.
#[derive(Debug, Clone, Default)]
pub struct StepTimeline {
    spans: Vec<StepSpan>,
}

impl StepTimeline {
    pub fn from_state(root: &State) -> Self {
        let mut spans = Vec::new();
        collect(root, "", &mut spans);
        spans.sort_by_key(|s| s.started_at);
        Self { spans }
    }

    pub fn spans(&self) -> &[StepSpan] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Earliest recorded start.
    pub fn origin(&self) -> Option<DateTime<Utc>> {
        self.spans.first().map(|s| s.started_at)
    }

    /// Latest recorded instant, start or done.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.spans
            .iter()
            .map(|s| s.done_at.unwrap_or(s.started_at))
            .max()
    }

    /// Milliseconds from the earliest start to the latest recorded instant.
    pub fn total_ms(&self) -> i64 {
        match (self.origin(), self.end()) {
            (Some(origin), Some(end)) => (end - origin).num_milliseconds(),
            _ => 0,
        }
    }

    /// Durations of finished steps in milliseconds, keyed by path.
    pub fn durations(&self) -> HashMap<String, i64> {
        self.spans
            .iter()
            .filter_map(|s| {
                s.done_at
                    .map(|done| (s.path.clone(), (done - s.started_at).num_milliseconds()))
            })
            .collect()
    }

    /// Generates an ASCII Gantt chart.
    ///
    /// Finished steps are drawn with `#`, failed ones with `x`, and steps
    /// still open run to the end of the chart with `.`.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nStep Timeline:\n\n");

        let (origin, total) = match self.origin() {
            Some(origin) if self.total_ms() > 0 => (origin, self.total_ms()),
            _ => return output,
        };

        // Scale to 50 characters width
        let scale = 50.0 / total as f64;

        for span in &self.spans {
            let start = (span.started_at - origin).num_milliseconds();
            let end = span
                .done_at
                .map(|d| (d - origin).num_milliseconds())
                .unwrap_or(total);

            let start_pos = (start as f64 * scale) as usize;
            let width = (((end - start) as f64 * scale).max(1.0) as usize).min(50 - start_pos.min(49));
            let fill = match span.outcome {
                SpanOutcome::Succeeded => "#",
                SpanOutcome::Failed => "x",
                SpanOutcome::Open => ".",
            };

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&fill.repeat(width));

            let note = match span.outcome {
                SpanOutcome::Open => "running".to_string(),
                _ => format!("{} ms", end - start),
            };
            output.push_str(&format!(
                "{} |{:<50}| ({})\n",
                truncate(&span.path, 16),
                bar,
                note
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total));
        output
    }
}

fn collect(node: &State, prefix: &str, spans: &mut Vec<StepSpan>) {
    for child in node.children() {
        let path = path::join(prefix, child.name());
        if let Some(started_at) = child.started_at() {
            let outcome = if child.failed() {
                SpanOutcome::Failed
            } else if child.succeeded() {
                SpanOutcome::Succeeded
            } else {
                SpanOutcome::Open
            };
            spans.push(StepSpan {
                path: path.clone(),
                started_at,
                done_at: child.done_at(),
                outcome,
            });
        }
        collect(&child, &path, spans);
    }
}

/// Pads or truncates a label to exactly `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
