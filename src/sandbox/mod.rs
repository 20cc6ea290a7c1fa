//! Sandbox enforcement for tool execution.
//!
//! Every filesystem path and process invocation requested by a tool passes
//! through the [`SandboxEnforcer`] before anything executes:
//!
//! - **Paths** must resolve (symlinks and `..` included) to the workspace
//!   root or a descendant of it. Failures are a single [`PathViolation`].
//! - **Commands** must be allow-listed by name, and no argument may contain
//!   a denied pattern. Failures are a [`CommandViolation`].
//!
//! ```rust,ignore
//! use acton_engine::sandbox::Workspace;
//!
//! let workspace = Workspace::new("/srv/tasks/42", ["cargo", "git"], ["--exec"])?;
//! let canonical = workspace.enforcer().authorize_path("src/main.rs")?;
//! workspace.enforcer().authorize_command("cargo", &["test".to_string()])?;
//! ```
//!
//! The enforcer performs no I/O beyond path resolution and holds no mutable
//! state, so a workspace can be cloned freely across tasks.

mod command;
mod path;
mod violation;

pub use command::{CommandPolicy, DEFAULT_DENIED_PATTERNS};
pub use path::PathResolver;
pub use violation::{CommandViolation, PathViolation, WorkspaceError};

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Validates paths and commands against one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxEnforcer {
    paths: PathResolver,
    commands: CommandPolicy,
}

impl SandboxEnforcer {
    /// Creates an enforcer for a canonical root and a command policy.
    #[must_use]
    pub fn new(canonical_root: PathBuf, commands: CommandPolicy) -> Self {
        Self {
            paths: PathResolver::new(canonical_root),
            commands,
        }
    }

    /// Authorizes a path whose parent directory exists.
    ///
    /// # Errors
    ///
    /// Returns `PathViolation` if the path is empty, cannot be resolved, or
    /// resolves outside the workspace root.
    pub fn authorize_path(&self, requested: &str) -> Result<PathBuf, PathViolation> {
        self.paths.resolve(requested)
    }

    /// Authorizes a path that a tool is about to create, tolerating missing
    /// intermediate directories.
    ///
    /// # Errors
    ///
    /// Returns `PathViolation` under the same conditions as
    /// [`authorize_path`](Self::authorize_path), or if the missing part of
    /// the path is not made of plain names.
    pub fn authorize_new_path(&self, requested: &str) -> Result<PathBuf, PathViolation> {
        self.paths.resolve_new(requested)
    }

    /// Authorizes a command invocation.
    ///
    /// # Errors
    ///
    /// Returns `CommandViolation` if the command is not allow-listed or any
    /// argument contains a denied pattern.
    pub fn authorize_command(&self, command: &str, args: &[String]) -> Result<(), CommandViolation> {
        self.commands.authorize(command, args)
    }

    /// Returns the canonical workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    /// Returns the command policy.
    #[must_use]
    pub fn commands(&self) -> &CommandPolicy {
        &self.commands
    }
}

/// The directory a task is confined to, with its command policy.
///
/// Workspaces are allocated by the caller, one per task, and never created
/// or removed by the engine. Concurrent tasks must use disjoint roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    enforcer: Arc<SandboxEnforcer>,
}

impl Workspace {
    /// Creates a workspace rooted at an existing directory.
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError` if the root cannot be canonicalized or is not
    /// a directory.
    pub fn new<A, D>(root: impl AsRef<Path>, allowed: A, denied: D) -> Result<Self, WorkspaceError>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self::with_policy(root, CommandPolicy::new(allowed, denied))
    }

    /// Creates a workspace with an already-built command policy.
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError` if the root cannot be canonicalized or is not
    /// a directory.
    pub fn with_policy(root: impl AsRef<Path>, policy: CommandPolicy) -> Result<Self, WorkspaceError> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|e| WorkspaceError::new(root, e.to_string()))?;
        if !canonical.is_dir() {
            return Err(WorkspaceError::new(root, "not a directory"));
        }

        tracing::debug!(
            root = %canonical.display(),
            allowed_commands = policy.allowed().len(),
            "Workspace ready"
        );

        Ok(Self {
            enforcer: Arc::new(SandboxEnforcer::new(canonical, policy)),
        })
    }

    /// Returns the canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.enforcer.root()
    }

    /// Returns the enforcer guarding this workspace.
    #[must_use]
    pub fn enforcer(&self) -> &SandboxEnforcer {
        &self.enforcer
    }

    /// Renders a path relative to the root for display to the model.
    #[must_use]
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(self.root())
            .map(|relative| relative.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn workspace_canonicalizes_root() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path(), ["echo"], Vec::<String>::new()).unwrap();
        assert_eq!(workspace.root(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn workspace_rejects_missing_root() {
        let result = Workspace::new("/nonexistent/acton/root", ["echo"], Vec::<String>::new());
        assert!(result.is_err());
    }

    #[test]
    fn workspace_rejects_file_root() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(Workspace::new(&file, ["echo"], Vec::<String>::new()).is_err());
    }

    #[test]
    fn enforcer_checks_both_paths_and_commands() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path(), ["echo"], ["--exec"]).unwrap();
        let enforcer = workspace.enforcer();

        assert!(enforcer.authorize_path("ok.txt").is_ok());
        assert!(enforcer.authorize_path("../nope.txt").is_err());
        assert!(enforcer.authorize_command("echo", &["hi".to_string()]).is_ok());
        assert!(enforcer.authorize_command("rm", &[]).is_err());
    }

    #[test]
    fn display_path_is_relative_to_root() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path(), ["echo"], Vec::<String>::new()).unwrap();
        let inside = workspace.root().join("src").join("lib.rs");
        assert_eq!(workspace.display_path(&inside), format!("src{}lib.rs", std::path::MAIN_SEPARATOR));
    }

    #[test]
    fn enforcer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SandboxEnforcer>();
        assert_send_sync::<Workspace>();
    }
}
