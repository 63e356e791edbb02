//! Error types for snapshot collection.
//!
//! The collection pipeline absorbs almost every failure locally: missing
//! tools, unsupported platforms, permission-denied paths and unparsable
//! records all degrade to empty or partial output. Only cancellation is
//! reported upward, attached to the collector that was cut short.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectError>;

/// Errors that can occur while collecting one snapshot category.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The shared deadline expired; the collector returned partial state.
    #[error("collection cancelled: deadline exceeded")]
    Cancelled,

    /// I/O failure that could not be absorbed as a skipped record.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectError {
    /// Whether this error marks a deadline cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CollectError::Cancelled)
    }
}

/// A collection error annotated with the category it came from.
///
/// The orchestrator gathers these without aborting peer collectors; the
/// snapshot itself is always returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorError {
    /// Snapshot category that failed (e.g. `"files"`, `"packages"`).
    pub category: String,
    /// Human-readable failure description.
    pub message: String,
    /// Whether the failure was a deadline cancellation.
    pub cancelled: bool,
}

impl CollectorError {
    pub fn new(category: &str, error: &CollectError) -> Self {
        Self {
            category: category.to_string(),
            message: error.to_string(),
            cancelled: error.is_cancelled(),
        }
    }
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_flag() {
        let err = CollectorError::new("files", &CollectError::Cancelled);
        assert!(err.cancelled);
        assert_eq!(err.category, "files");
        assert!(err.message.contains("deadline"));
    }

    #[test]
    fn test_io_error_not_cancelled() {
        let io = CollectError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(!io.is_cancelled());
        let err = CollectorError::new("services", &io);
        assert!(!err.cancelled);
    }

    #[test]
    fn test_collector_error_serializes() {
        let err = CollectorError::new("packages", &CollectError::Cancelled);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"category\":\"packages\""));
        assert!(json.contains("\"cancelled\":true"));
    }
}
