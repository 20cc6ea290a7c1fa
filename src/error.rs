//! Custom error types for the engine.
//!
//! Tool-level failures never appear here: they travel inside
//! [`ToolResult`](crate::tools::ToolResult)s and are fed back to the model.
//! The errors in this module are the ones a caller sees.
//!
//! No external error crates (anyhow, thiserror, eyre) are used.

use crate::sandbox::WorkspaceError;
use std::fmt;
use std::time::Duration;

/// Fatal errors that end a loop run or an iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    /// The specific error that occurred
    pub kind: EngineErrorKind,
}

/// Specific engine error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// The task deadline passed before the work finished
    DeadlineExceeded {
        /// The deadline that was exceeded
        deadline: Duration,
    },
    /// The model transport could not be reached
    TransportUnavailable {
        /// Reason reported by the transport
        reason: String,
    },
    /// Invalid engine configuration
    Configuration {
        /// Description of what was invalid
        field: String,
        /// Why it was invalid
        reason: String,
    },
}

impl EngineError {
    /// Creates a new EngineError with the given kind.
    #[must_use]
    pub fn new(kind: EngineErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a deadline exceeded error.
    #[must_use]
    pub fn deadline_exceeded(deadline: Duration) -> Self {
        Self::new(EngineErrorKind::DeadlineExceeded { deadline })
    }

    /// Creates a transport unavailable error.
    #[must_use]
    pub fn transport_unavailable(reason: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::TransportUnavailable {
            reason: reason.into(),
        })
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Configuration {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Returns true if this error indicates the deadline passed.
    #[must_use]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.kind, EngineErrorKind::DeadlineExceeded { .. })
    }

    /// Returns true if this error indicates the transport is unreachable.
    #[must_use]
    pub fn is_transport_unavailable(&self) -> bool {
        matches!(self.kind, EngineErrorKind::TransportUnavailable { .. })
    }

    /// Returns true if this error indicates a configuration problem.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, EngineErrorKind::Configuration { .. })
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EngineErrorKind::DeadlineExceeded { deadline } => {
                write!(
                    f,
                    "task deadline of {} ms exceeded; raise task_deadline_secs or simplify the task",
                    deadline.as_millis()
                )
            }
            EngineErrorKind::TransportUnavailable { reason } => {
                write!(f, "model transport unavailable: {}", reason)
            }
            EngineErrorKind::Configuration { field, reason } => {
                write!(f, "configuration error for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<WorkspaceError> for EngineError {
    fn from(error: WorkspaceError) -> Self {
        Self::configuration("workspace", error.to_string())
    }
}

impl From<TransportError> for EngineError {
    fn from(error: TransportError) -> Self {
        Self::transport_unavailable(error.reason)
    }
}

/// Error returned by a [`ModelTransport`](crate::engine::ModelTransport).
///
/// Every transport error is treated as the transport being unavailable;
/// the engine does not retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Why the completion could not be produced
    pub reason: String,
}

impl TransportError {
    /// Creates a transport error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: {}", self.reason)
    }
}

impl std::error::Error for TransportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_display() {
        let error = EngineError::deadline_exceeded(Duration::from_secs(2));
        assert!(error.to_string().contains("2000 ms"));
        assert!(error.is_deadline_exceeded());
        assert!(!error.is_transport_unavailable());
    }

    #[test]
    fn transport_error_converts_to_unavailable() {
        let error: EngineError = TransportError::new("connection refused").into();
        assert!(error.is_transport_unavailable());
        assert!(error.to_string().contains("connection refused"));
    }

    #[test]
    fn workspace_error_is_configuration() {
        let error: EngineError = WorkspaceError::new("/missing", "not found").into();
        assert!(error.is_configuration());
        assert!(error.to_string().contains("'workspace'"));
    }

    #[test]
    fn errors_are_clone_and_eq() {
        let error = EngineError::configuration("max_turns", "must be at least 1");
        assert_eq!(error.clone(), error);
    }
}
