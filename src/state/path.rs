//! State Path Utilities
//!
//! Paths address a node by the names of its ancestors below the node the
//! lookup starts from, joined with dots: `deploy.migrate.schema`.
//!
//! Children spawned inside an async region carry their region name as a
//! prefix (`fanout/worker1`). The slash is part of the segment, so such a
//! child is addressed as `fanout/worker1` or `parent.fanout/worker1`.

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// Separator between an async region name and its child's name.
pub const ASYNC_SEPARATOR: char = '/';

/// Iterates over every segment of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR)
}

/// Joins a parent path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", parent, SEPARATOR, name)
    }
}

/// Builds the recorded name of a child spawned inside an async region.
pub fn async_name(region: &str, name: &str) -> String {
    format!("{}{}{}", region, ASYNC_SEPARATOR, name)
}
