//! Tool error types.
//!
//! Errors raised while registering, validating, authorizing or executing a
//! tool. The dispatcher folds every one of them into a failed
//! [`ToolResult`](crate::tools::ToolResult); none escape to the loop.

use crate::sandbox::{CommandViolation, PathViolation};
use crate::tools::result::FailureClass;
use std::fmt;
use std::time::Duration;

/// Errors that can occur in tool operations.
///
/// This type uses `Box<ToolErrorKind>` to keep the error size small,
/// enabling efficient use in Result types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolError {
    kind: Box<ToolErrorKind>,
}

/// Specific tool error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolErrorKind {
    /// Tool not found in registry
    NotFound {
        /// The name of the tool that was not found
        tool_name: String,
    },
    /// Tool already registered
    AlreadyRegistered {
        /// The name of the existing tool
        tool_name: String,
    },
    /// Tool name is reserved by the protocol
    ReservedName {
        /// The reserved name
        tool_name: String,
    },
    /// Arguments do not match the declared parameters
    SchemaViolation {
        /// The name of the tool
        tool_name: String,
        /// What was invalid
        reason: String,
    },
    /// A path argument failed sandbox authorization
    PathViolation(PathViolation),
    /// A command argument failed sandbox authorization
    CommandViolation(CommandViolation),
    /// Tool execution failed
    ExecutionFailed {
        /// The name of the tool
        tool_name: String,
        /// Reason for failure
        reason: String,
    },
    /// Tool execution timed out
    TimedOut {
        /// The name of the tool
        tool_name: String,
        /// The timeout duration that was exceeded
        duration: Duration,
    },
}

impl ToolError {
    /// Creates a new ToolError with the given kind.
    #[must_use]
    pub fn new(kind: ToolErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
        }
    }

    /// Returns a reference to the error kind.
    #[must_use]
    pub fn kind(&self) -> &ToolErrorKind {
        &self.kind
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(tool_name: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound {
            tool_name: tool_name.into(),
        })
    }

    /// Creates an already registered error.
    #[must_use]
    pub fn already_registered(tool_name: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::AlreadyRegistered {
            tool_name: tool_name.into(),
        })
    }

    /// Creates a reserved name error.
    #[must_use]
    pub fn reserved_name(tool_name: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::ReservedName {
            tool_name: tool_name.into(),
        })
    }

    /// Creates a schema violation error.
    #[must_use]
    pub fn schema_violation(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::SchemaViolation {
            tool_name: tool_name.into(),
            reason: reason.into(),
        })
    }

    /// Creates an execution failed error.
    #[must_use]
    pub fn execution_failed(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.into(),
        })
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timed_out(tool_name: impl Into<String>, duration: Duration) -> Self {
        Self::new(ToolErrorKind::TimedOut {
            tool_name: tool_name.into(),
            duration,
        })
    }

    /// Classifies this error for a tool result.
    ///
    /// Registration errors never reach a result; an unknown tool is reported
    /// to the model as a schema problem so it can pick a valid name.
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self.kind.as_ref() {
            ToolErrorKind::NotFound { .. }
            | ToolErrorKind::AlreadyRegistered { .. }
            | ToolErrorKind::ReservedName { .. }
            | ToolErrorKind::SchemaViolation { .. } => FailureClass::SchemaViolation,
            ToolErrorKind::PathViolation(_) => FailureClass::PathViolation,
            ToolErrorKind::CommandViolation(_) => FailureClass::CommandViolation,
            ToolErrorKind::ExecutionFailed { .. } => FailureClass::ExecutionFailed,
            ToolErrorKind::TimedOut { .. } => FailureClass::TimedOut,
        }
    }

    /// Returns true if this error indicates the tool was not found.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(*self.kind, ToolErrorKind::NotFound { .. })
    }

    /// Returns true if this error indicates the tool is already registered.
    #[must_use]
    pub fn is_already_registered(&self) -> bool {
        matches!(*self.kind, ToolErrorKind::AlreadyRegistered { .. })
    }

    /// Returns true if this error came from the sandbox.
    #[must_use]
    pub fn is_violation(&self) -> bool {
        matches!(
            *self.kind,
            ToolErrorKind::PathViolation(_) | ToolErrorKind::CommandViolation(_)
        )
    }
}

impl From<PathViolation> for ToolError {
    fn from(violation: PathViolation) -> Self {
        Self::new(ToolErrorKind::PathViolation(violation))
    }
}

impl From<CommandViolation> for ToolError {
    fn from(violation: CommandViolation) -> Self {
        Self::new(ToolErrorKind::CommandViolation(violation))
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_ref() {
            ToolErrorKind::NotFound { tool_name } => {
                write!(
                    f,
                    "tool '{}' not found; use one of the tools listed in the catalog",
                    tool_name
                )
            }
            ToolErrorKind::AlreadyRegistered { tool_name } => {
                write!(
                    f,
                    "tool '{}' is already registered; use a different name",
                    tool_name
                )
            }
            ToolErrorKind::ReservedName { tool_name } => {
                write!(
                    f,
                    "tool name '{}' is reserved for the completion signal",
                    tool_name
                )
            }
            ToolErrorKind::SchemaViolation { tool_name, reason } => {
                write!(
                    f,
                    "tool '{}' arguments are invalid: {}; check the declared parameters",
                    tool_name, reason
                )
            }
            ToolErrorKind::PathViolation(violation) => write!(f, "{}", violation),
            ToolErrorKind::CommandViolation(violation) => write!(f, "{}", violation),
            ToolErrorKind::ExecutionFailed { tool_name, reason } => {
                write!(f, "tool '{}' execution failed: {}", tool_name, reason)
            }
            ToolErrorKind::TimedOut {
                tool_name,
                duration,
            } => {
                write!(
                    f,
                    "tool '{}' timed out after {} ms and was terminated",
                    tool_name,
                    duration.as_millis()
                )
            }
        }
    }
}

impl std::error::Error for ToolError {}
