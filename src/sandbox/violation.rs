//! Sandbox violation types.
//!
//! Every rejection the sandbox produces is one of these values. They are
//! plain data so the dispatcher can fold them into a failed tool result.

use std::fmt;
use std::path::PathBuf;

/// A requested path could not be authorized.
///
/// Empty paths, `..` escapes, absolute paths outside the root, symlinks that
/// leave the root and unresolvable parents all produce this same value. The
/// message deliberately does not say which check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathViolation {
    /// The path exactly as it was requested.
    pub requested: String,
}

impl PathViolation {
    /// Creates a violation for the requested path.
    #[must_use]
    pub fn new(requested: impl Into<String>) -> Self {
        Self {
            requested: requested.into(),
        }
    }
}

impl fmt::Display for PathViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "path '{}' is not inside the workspace or cannot be resolved; \
             use a path relative to the workspace root",
            self.requested
        )
    }
}

impl std::error::Error for PathViolation {}

/// A requested command invocation was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandViolation {
    /// The command name is not on the allow-list.
    NotAllowed {
        /// The command that was requested.
        command: String,
    },
    /// An argument matched a denied pattern.
    DeniedArgument {
        /// The command that was requested.
        command: String,
        /// The offending argument.
        argument: String,
        /// The pattern it matched.
        pattern: String,
    },
}

impl CommandViolation {
    /// Returns the command name this violation refers to.
    #[must_use]
    pub fn command(&self) -> &str {
        match self {
            Self::NotAllowed { command } | Self::DeniedArgument { command, .. } => command,
        }
    }
}

impl fmt::Display for CommandViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAllowed { command } => {
                write!(
                    f,
                    "command '{}' is not on the workspace allow-list",
                    command
                )
            }
            Self::DeniedArgument {
                command,
                argument,
                pattern,
            } => {
                write!(
                    f,
                    "argument '{}' to command '{}' contains denied pattern '{}'",
                    argument, command, pattern
                )
            }
        }
    }
}

impl std::error::Error for CommandViolation {}

/// A workspace could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceError {
    /// The root that was supplied.
    pub root: PathBuf,
    /// Why it was rejected.
    pub reason: String,
}

impl WorkspaceError {
    /// Creates a new workspace error.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for WorkspaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid workspace root '{}': {}; supply an existing directory",
            self.root.display(),
            self.reason
        )
    }
}

impl std::error::Error for WorkspaceError {}
