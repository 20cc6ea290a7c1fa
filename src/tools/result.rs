//! Normalized tool results.

use crate::tools::error::ToolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Classification of a failed tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// A path argument escaped or could not be resolved in the workspace
    PathViolation,
    /// A command was not allow-listed or carried a denied argument
    CommandViolation,
    /// Unknown tool, missing/unknown field, or wrong argument type
    SchemaViolation,
    /// The tool ran and failed
    ExecutionFailed,
    /// The tool exceeded its timeout and was terminated
    TimedOut,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PathViolation => "path_violation",
            Self::CommandViolation => "command_violation",
            Self::SchemaViolation => "schema_violation",
            Self::ExecutionFailed => "execution_failed",
            Self::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Why a tool invocation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    /// The failure classification
    pub class: FailureClass,
    /// Human-readable description shown to the model
    pub message: String,
}

/// What a successful tool produced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolPayload {
    /// Nothing to report
    #[default]
    Empty,
    /// Plain text output
    Text {
        /// The text
        text: String,
    },
    /// Output of a spawned process
    Process {
        /// Exit code, or -1 when killed by a signal
        exit_code: i32,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
        /// Whether either stream was truncated
        truncated: bool,
    },
    /// Files created or modified in the workspace
    ChangedFiles {
        /// Canonical paths of the changed files
        paths: Vec<PathBuf>,
        /// Short description of the change
        summary: String,
    },
    /// Arbitrary structured output
    Json {
        /// The value
        value: serde_json::Value,
    },
}

impl ToolPayload {
    /// Returns the changed files this payload reports, if any.
    #[must_use]
    pub fn changed_files(&self) -> &[PathBuf] {
        match self {
            Self::ChangedFiles { paths, .. } => paths,
            _ => &[],
        }
    }
}

/// The normalized outcome of one tool invocation.
///
/// Immutable once produced. A failed result always carries a [`ToolFailure`]
/// and an empty payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The invocation this result answers
    pub call_id: String,
    /// The tool that was invoked
    pub tool: String,
    /// Whether the tool succeeded
    pub success: bool,
    /// What the tool produced
    pub payload: ToolPayload,
    /// Why the tool failed, when it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ToolFailure>,
}

impl ToolResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        payload: ToolPayload,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool: tool.into(),
            success: true,
            payload,
            failure: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        class: FailureClass,
        message: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool: tool.into(),
            success: false,
            payload: ToolPayload::Empty,
            failure: Some(ToolFailure {
                class,
                message: message.into(),
            }),
        }
    }

    /// Creates a failed result from a tool error.
    #[must_use]
    pub fn from_error(call_id: impl Into<String>, tool: impl Into<String>, error: &ToolError) -> Self {
        Self::failure(call_id, tool, error.class(), error.to_string())
    }

    /// Returns the failure classification, if the tool failed.
    #[must_use]
    pub fn failure_class(&self) -> Option<FailureClass> {
        self.failure.as_ref().map(|f| f.class)
    }
}
