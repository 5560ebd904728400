//! Error Types
//!
//! Errors raised by path resolution and the persistence boundary.
//!
//! Step failures are not errors: a behavior that fails records
//! its message on its own state node with `fail`, and the run carries on
//! under the ordering gate.

use thiserror::Error;

/// Errors from state lookup and persistence.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("path [{0}] not found")]
    PathNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported state format: {0}")]
    UnsupportedFormat(String),

    #[error("adapter error: {0}")]
    Adapter(String),

    #[error("info payload error: {0}")]
    Info(String),
}

impl StepError {
    /// Returns true if this error came from resolving a state path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StepError::PathNotFound(_))
    }

    /// Returns true if this error came from the load/save boundary.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            StepError::Io(_)
                | StepError::Json(_)
                | StepError::Yaml(_)
                | StepError::UnsupportedFormat(_)
                | StepError::Adapter(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = StepError::PathNotFound("a.b".to_string());
        assert_eq!(err.to_string(), "path [a.b] not found");
        assert!(err.is_not_found());
        assert!(!err.is_persistence());
    }

    #[test]
    fn test_io_is_persistence() {
        let err: StepError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert!(err.is_persistence());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_json_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: StepError = parse.unwrap_err().into();
        assert!(err.to_string().starts_with("JSON error"));
    }
}
