//! Configuration types for the engine.
//!
//! These map directly onto the TOML file format. Every field has a default,
//! so an empty file is a valid configuration.

use crate::error::EngineError;
use crate::logging::LoggingConfig;
use crate::protocol::ProtocolFormat;
use crate::sandbox::{CommandPolicy, Workspace, WorkspaceError, DEFAULT_DENIED_PATTERNS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of model turns per loop run.
pub const DEFAULT_MAX_TURNS: u32 = 20;

/// Default per-dispatch tool timeout in seconds.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Default task deadline in seconds, spanning every attempt.
pub const DEFAULT_TASK_DEADLINE_SECS: u64 = 600;

/// Default number of produce/validate attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Root configuration for the engine.
///
/// ```toml
/// max_turns = 20
/// tool_timeout_secs = 30
/// task_deadline_secs = 600
/// max_attempts = 3
/// protocol = "tagged-inline"
///
/// [workspace]
/// allowed_commands = ["cargo", "ls"]
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Turn budget for a single loop run. Must be at least 1.
    pub max_turns: u32,
    /// Timeout applied to every tool dispatch.
    pub tool_timeout_secs: u64,
    /// Wall-clock budget for the whole task.
    pub task_deadline_secs: u64,
    /// Attempt ceiling for bounded iteration. Must be at least 1.
    pub max_attempts: u32,
    /// Wire format used to exchange tool calls with the model.
    pub protocol: ProtocolFormat,
    /// Default command policy for workspaces.
    pub workspace: WorkspaceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            task_deadline_secs: DEFAULT_TASK_DEADLINE_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            protocol: ProtocolFormat::default(),
            workspace: WorkspaceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the turn budget.
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Sets the attempt ceiling.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the tool timeout.
    #[must_use]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Sets the task deadline.
    #[must_use]
    pub fn with_task_deadline(mut self, deadline: Duration) -> Self {
        self.task_deadline_secs = deadline.as_secs().max(1);
        self
    }

    /// Sets the protocol format.
    #[must_use]
    pub fn with_protocol(mut self, protocol: ProtocolFormat) -> Self {
        self.protocol = protocol;
        self
    }

    /// Returns the tool timeout as a `Duration`.
    #[must_use]
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Returns the task deadline as a `Duration`.
    #[must_use]
    pub fn task_deadline(&self) -> Duration {
        Duration::from_secs(self.task_deadline_secs)
    }

    /// Checks the numeric bounds.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first field that is zero.
    pub fn validate(&self) -> Result<(), EngineError> {
        let bounds = [
            ("max_turns", u64::from(self.max_turns)),
            ("max_attempts", u64::from(self.max_attempts)),
            ("tool_timeout_secs", self.tool_timeout_secs),
            ("task_deadline_secs", self.task_deadline_secs),
        ];
        match bounds.iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(EngineError::configuration(*field, "must be at least 1")),
            None => Ok(()),
        }
    }
}

/// Default command policy applied to workspaces built from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Commands `run_command` may execute.
    pub allowed_commands: Vec<String>,
    /// Substrings rejected in any command argument.
    pub denied_patterns: Vec<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            allowed_commands: Vec::new(),
            denied_patterns: DEFAULT_DENIED_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }
}

impl WorkspaceConfig {
    /// Returns the command policy these settings describe.
    #[must_use]
    pub fn policy(&self) -> CommandPolicy {
        CommandPolicy::new(
            self.allowed_commands.iter().cloned(),
            self.denied_patterns.iter().cloned(),
        )
    }

    /// Builds a workspace rooted at `root` with this policy.
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError` if the root is missing or not a directory.
    pub fn open(&self, root: impl AsRef<Path>) -> Result<Workspace, WorkspaceError> {
        Workspace::with_policy(root, self.policy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tool_timeout(), Duration::from_secs(30));
        assert_eq!(config.protocol, ProtocolFormat::TaggedInline);
    }

    #[test]
    fn zero_bounds_are_rejected() {
        let error = EngineConfig::new().with_max_turns(0).validate().unwrap_err();
        assert!(error.is_configuration());
        assert!(error.to_string().contains("max_turns"));

        let error = EngineConfig::new()
            .with_max_attempts(0)
            .validate()
            .unwrap_err();
        assert!(error.to_string().contains("max_attempts"));
    }

    #[test]
    fn max_turns_of_one_is_valid() {
        assert!(EngineConfig::new().with_max_turns(1).validate().is_ok());
    }

    #[test]
    fn workspace_defaults_deny_shell_metacharacters() {
        let workspace = WorkspaceConfig::default();
        assert!(workspace.allowed_commands.is_empty());
        assert!(workspace.denied_patterns.iter().any(|p| p == "|"));
    }

    #[test]
    fn workspace_config_opens_workspace() {
        let temp = TempDir::new().unwrap();
        let settings = WorkspaceConfig {
            allowed_commands: vec!["ls".into()],
            ..WorkspaceConfig::default()
        };
        let workspace = settings.open(temp.path()).unwrap();
        assert!(workspace.enforcer().authorize_command("ls", &[]).is_ok());
        assert!(workspace.enforcer().authorize_command("rm", &[]).is_err());
    }
}
