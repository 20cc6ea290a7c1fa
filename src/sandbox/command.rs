//! Command authorization.
//!
//! A command must be named on the allow-list, and no argument may contain a
//! denied pattern. Both checks run for every invocation.

use crate::sandbox::violation::CommandViolation;
use std::collections::BTreeSet;

/// Patterns rejected in command arguments unless a workspace overrides them.
///
/// Commands run without a shell, so these mostly guard against tools that
/// re-enter a shell or escape the workspace on their own.
pub const DEFAULT_DENIED_PATTERNS: &[&str] = &[
    ">", "<", "|", ";", "&&", "`", "$(", "--exec", "-exec", "--upload-pack", "/etc/", "~/",
];

/// Allow/deny policy for process invocations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandPolicy {
    /// Command names permitted to run.
    allowed: BTreeSet<String>,
    /// Substrings rejected anywhere in the command line.
    denied: Vec<String>,
}

impl CommandPolicy {
    /// Creates a policy from allow and deny lists.
    #[must_use]
    pub fn new<A, D>(allowed: A, denied: D) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            denied: denied
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Returns the allow-listed command names.
    #[must_use]
    pub fn allowed(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    /// Returns the denied patterns.
    #[must_use]
    pub fn denied(&self) -> &[String] {
        &self.denied
    }

    /// Authorizes one command invocation.
    ///
    /// The allow-list is checked first and fails closed. A command containing
    /// a path separator never matches, so `./tool` or `/bin/sh` cannot slip
    /// past a bare-name entry.
    ///
    /// # Errors
    ///
    /// Returns `CommandViolation::NotAllowed` when the command is not
    /// allow-listed, or `CommandViolation::DeniedArgument` when the command
    /// or any argument contains a denied pattern.
    pub fn authorize(&self, command: &str, args: &[String]) -> Result<(), CommandViolation> {
        let named_plainly = !command.is_empty() && !command.contains(['/', '\\']);
        if !named_plainly || !self.allowed.contains(command) {
            return Err(CommandViolation::NotAllowed {
                command: command.to_string(),
            });
        }

        for argument in std::iter::once(command).chain(args.iter().map(String::as_str)) {
            if let Some(pattern) = self.denied.iter().find(|p| argument.contains(p.as_str())) {
                return Err(CommandViolation::DeniedArgument {
                    command: command.to_string(),
                    argument: argument.to_string(),
                    pattern: pattern.clone(),
                });
            }
        }

        Ok(())
    }
}
