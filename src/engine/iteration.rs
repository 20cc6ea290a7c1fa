//! Bounded produce/validate/fix iteration.
//!
//! [`BoundedIteration`] runs the agent loop, hands the changed files to a
//! [`Validator`], and on failure starts a fresh conversation seeded with the
//! task, the files changed so far and the diagnostic. It stops at the first
//! passing attempt or after a hard ceiling of attempts.

use crate::engine::agent_loop::{AgentLoop, Deadline, LoopOutcome};
use crate::engine::conversation::{AttemptFeedback, ConversationSeed, ConversationTurn};
use crate::engine::events::EngineEvent;
use crate::error::EngineError;
use crate::protocol::encode_warning;
use crate::sandbox::Workspace;
use crate::tools::builtins::truncate_at_boundary;
use crate::tools::process::{self, ProcessGroupGuard};
use crate::types::TaskId;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout_at;

/// Validator diagnostics longer than this are truncated.
const MAX_DIAGNOSTIC_SIZE: usize = 64 * 1024;

/// The result of validating an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The artifacts are acceptable
    Pass,
    /// The artifacts are not acceptable, with a diagnostic for the model
    Fail(String),
}

impl Verdict {
    /// Returns true for `Pass`.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// The failure diagnostic, if any.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Fail(diagnostic) => Some(diagnostic),
        }
    }
}

/// Files changed by an attempt, as canonical paths inside the workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    paths: BTreeSet<PathBuf>,
}

impl ArtifactSet {
    /// Creates a set from paths.
    #[must_use]
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    /// The paths, sorted.
    #[must_use]
    pub fn paths(&self) -> &BTreeSet<PathBuf> {
        &self.paths
    }

    /// Returns true if the set contains `path`.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Number of paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths relative to the workspace root, for display.
    #[must_use]
    pub fn display(&self, workspace: &Workspace) -> Vec<String> {
        self.paths
            .iter()
            .map(|path| workspace.display_path(path))
            .collect()
    }

    fn extend(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.paths.extend(paths);
    }
}

/// Judges the artifacts of a completed attempt.
#[async_trait]
pub trait Validator: Send + Sync + fmt::Debug {
    /// Validates the workspace after an attempt.
    async fn validate(&self, artifacts: &ArtifactSet, workspace: &Workspace) -> Verdict;
}

/// One pass of the agent loop and its judgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationAttempt {
    /// Attempt index, starting at 1
    pub index: u32,
    /// How the loop run ended
    pub outcome: LoopOutcome,
    /// The verdict. For runs that did not complete this is always a failure
    /// describing the loop outcome, followed by the validator's diagnostic
    /// when it also failed.
    pub verdict: Verdict,
    /// Whether the validator ran to a verdict; false when the transport or
    /// the deadline ended the attempt first
    pub validated: bool,
}

impl IterationAttempt {
    /// Returns true if the attempt passed validation.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict.is_pass()
    }
}

/// How bounded iteration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// An attempt passed validation
    Succeeded {
        /// Every file changed across all attempts
        artifacts: ArtifactSet,
        /// The attempts made, the last one passing
        attempts: Vec<IterationAttempt>,
    },
    /// No attempt passed before the ceiling or the deadline
    Failed {
        /// Diagnostic of the most recent failed attempt
        last_diagnostic: String,
        /// The attempts made
        attempts: Vec<IterationAttempt>,
    },
    /// The transport became unavailable or the configuration is invalid
    Fatal {
        /// What ended the iteration
        error: EngineError,
        /// Attempts made before the error, including the one it ended
        attempts: Vec<IterationAttempt>,
    },
}

impl IterationOutcome {
    /// Returns true for `Succeeded`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// The attempts made.
    #[must_use]
    pub fn attempts(&self) -> &[IterationAttempt] {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Failed { attempts, .. }
            | Self::Fatal { attempts, .. } => attempts,
        }
    }

    /// The last failure diagnostic, for `Failed`.
    #[must_use]
    pub fn last_diagnostic(&self) -> Option<&str> {
        match self {
            Self::Failed {
                last_diagnostic, ..
            } => Some(last_diagnostic),
            _ => None,
        }
    }

    /// The fatal error, for `Fatal`.
    #[must_use]
    pub fn error(&self) -> Option<&EngineError> {
        match self {
            Self::Fatal { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Retries the agent loop against a validator up to a fixed number of
/// attempts, all within one task deadline.
#[derive(Debug, Clone)]
pub struct BoundedIteration {
    agent: AgentLoop,
    task_deadline: Duration,
}

impl BoundedIteration {
    /// Wraps an agent loop. `task_deadline` bounds every attempt together.
    #[must_use]
    pub fn new(agent: AgentLoop, task_deadline: Duration) -> Self {
        Self {
            agent,
            task_deadline,
        }
    }

    /// The wrapped loop controller.
    #[must_use]
    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    /// Runs up to `max_attempts` attempts at `task`.
    ///
    /// Attempts are strictly sequential. Only the most recent diagnostic is
    /// carried into the next attempt.
    pub async fn run(
        &self,
        task: &str,
        workspace: &Workspace,
        validator: &dyn Validator,
        max_attempts: u32,
    ) -> IterationOutcome {
        let task_id = TaskId::new();
        let mut attempts: Vec<IterationAttempt> = Vec::new();

        if max_attempts == 0 {
            return IterationOutcome::Fatal {
                error: EngineError::configuration("max_attempts", "must be at least 1"),
                attempts,
            };
        }

        let deadline = Deadline::after(self.task_deadline);
        let mut artifacts = ArtifactSet::default();
        let mut last_diagnostic: Option<String> = None;

        tracing::info!(task_id = %task_id, max_attempts, "Bounded iteration started");

        for index in 1..=max_attempts {
            if deadline.is_expired() {
                return self.out_of_time(&task_id, &deadline, last_diagnostic, attempts);
            }

            let mut seed = ConversationSeed::new(task);
            if let Some(diagnostic) = &last_diagnostic {
                seed = seed.with_feedback(AttemptFeedback {
                    attempt: index - 1,
                    artifacts: artifacts.display(workspace),
                    diagnostic: diagnostic.clone(),
                });
            }

            tracing::debug!(task_id = %task_id, attempt = index, "Attempt started");
            let outcome = self.agent.run(seed, workspace, deadline).await;
            artifacts.extend(outcome.artifacts().iter().cloned());

            if let Some(error) = outcome.error() {
                if error.is_deadline_exceeded() {
                    let error = error.clone();
                    let verdict = Verdict::Fail(error.to_string());
                    attempts.push(self.record(&task_id, index, outcome, verdict, false));
                    return self.out_of_time(&task_id, &deadline, last_diagnostic, attempts);
                }

                let error = error.clone();
                tracing::error!(task_id = %task_id, attempt = index, error = %error, "Attempt aborted");
                let verdict = Verdict::Fail(error.to_string());
                attempts.push(self.record(&task_id, index, outcome, verdict, false));
                return IterationOutcome::Fatal { error, attempts };
            }

            // An exhausted run is validated as well but always counts as failed.
            let snapshot = ArtifactSet::new(outcome.artifacts().iter().cloned());
            let validation = timeout_at(deadline.at(), validator.validate(&snapshot, workspace));
            let Ok(judged) = validation.await else {
                let verdict = Verdict::Fail(deadline.exceeded().to_string());
                attempts.push(self.record(&task_id, index, outcome, verdict, false));
                return self.out_of_time(&task_id, &deadline, last_diagnostic, attempts);
            };
            let verdict = if outcome.is_completed() {
                judged
            } else {
                Verdict::Fail(loop_diagnostic(
                    &outcome,
                    self.agent.max_turns(),
                    judged.diagnostic(),
                ))
            };
            let passed = verdict.is_pass();
            if let Verdict::Fail(diagnostic) = &verdict {
                last_diagnostic = Some(diagnostic.clone());
            }
            attempts.push(self.record(&task_id, index, outcome, verdict, true));

            if passed {
                tracing::info!(
                    task_id = %task_id,
                    attempts = index,
                    artifacts = artifacts.len(),
                    "Bounded iteration succeeded"
                );
                return IterationOutcome::Succeeded {
                    artifacts,
                    attempts,
                };
            }
        }

        let last_diagnostic = last_diagnostic.unwrap_or_default();
        tracing::warn!(task_id = %task_id, attempts = max_attempts, "Attempt ceiling reached");
        IterationOutcome::Failed {
            last_diagnostic,
            attempts,
        }
    }

    fn record(
        &self,
        task_id: &TaskId,
        index: u32,
        outcome: LoopOutcome,
        verdict: Verdict,
        validated: bool,
    ) -> IterationAttempt {
        tracing::info!(
            task_id = %task_id,
            attempt = index,
            state = %outcome.state(),
            passed = verdict.is_pass(),
            validated,
            "Attempt judged"
        );
        self.agent.events().emit(EngineEvent::AttemptCompleted {
            task_id: task_id.clone(),
            attempt: index,
            passed: verdict.is_pass(),
        });
        IterationAttempt {
            index,
            outcome,
            verdict,
            validated,
        }
    }

    fn out_of_time(
        &self,
        task_id: &TaskId,
        deadline: &Deadline,
        last_diagnostic: Option<String>,
        attempts: Vec<IterationAttempt>,
    ) -> IterationOutcome {
        tracing::warn!(
            task_id = %task_id,
            attempts = attempts.len(),
            "Task deadline exceeded"
        );
        IterationOutcome::Failed {
            last_diagnostic: last_diagnostic.unwrap_or_else(|| deadline.exceeded().to_string()),
            attempts,
        }
    }
}

/// Describes a loop run that ended without completing: what went wrong on
/// its last turn, then the validator's findings on the files it left.
fn loop_diagnostic(outcome: &LoopOutcome, max_turns: u32, validation: Option<&str>) -> String {
    let mut text = format!(
        "The agent did not finish: no clean completion within {max_turns} turn(s)."
    );
    if let Some(turn) = outcome.conversation().last_turn() {
        append_turn_problems(&mut text, turn);
    }
    if let Some(validation) = validation {
        let _ = write!(text, "\n\nValidation of the current files failed:\n{validation}");
    }
    text
}

fn append_turn_problems(text: &mut String, turn: &ConversationTurn) {
    let failures: Vec<_> = turn.failures().collect();
    if failures.is_empty() && turn.warnings.is_empty() {
        return;
    }
    let _ = write!(text, "\nProblems on turn {}:", turn.index);
    for result in failures {
        let (class, message) = result
            .failure
            .as_ref()
            .map(|f| (f.class.to_string(), f.message.as_str()))
            .unwrap_or_default();
        let _ = write!(
            text,
            "\n- {} ({}): {}: {}",
            result.tool, result.call_id, class, message
        );
    }
    for warning in &turn.warnings {
        let _ = write!(text, "\n{}", encode_warning(warning));
    }
}

/// Runs an allow-listed command in the workspace root; exit status 0 passes.
///
/// The combined stdout and stderr become the failure diagnostic. The command
/// runs in its own process group, which is killed on timeout or when the
/// validation is abandoned at the task deadline.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandValidator {
    /// Default time a validation command may run.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Creates a validator running `program` with `args`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets how long the command may run.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command line, for display.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl Validator for CommandValidator {
    async fn validate(&self, _artifacts: &ArtifactSet, workspace: &Workspace) -> Verdict {
        if let Err(violation) = workspace
            .enforcer()
            .authorize_command(&self.program, &self.args)
        {
            return Verdict::Fail(format!("validator command rejected: {violation}"));
        }

        let child = process::command(&self.program, &self.args, workspace.root()).spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return Verdict::Fail(format!(
                    "failed to start validator '{}': {}",
                    self.command_line(),
                    e
                ))
            }
        };
        let mut group = ProcessGroupGuard::new(child.id());

        let waited = tokio::time::timeout(self.timeout, child.wait_with_output()).await;
        if waited.is_ok() {
            group.disarm();
        }
        let output = match waited {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Verdict::Fail(format!(
                    "validator '{}' failed: {}",
                    self.command_line(),
                    e
                ))
            }
            Err(_) => {
                return Verdict::Fail(format!(
                    "validator '{}' timed out after {} s",
                    self.command_line(),
                    self.timeout.as_secs()
                ))
            }
        };

        if output.status.success() {
            tracing::debug!(command = %self.command_line(), "Validation passed");
            return Verdict::Pass;
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        let diagnostic = truncate_at_boundary(combined.trim_end(), MAX_DIAGNOSTIC_SIZE);

        tracing::debug!(
            command = %self.command_line(),
            exit_code = ?output.status.code(),
            "Validation failed"
        );
        if diagnostic.is_empty() {
            Verdict::Fail(format!(
                "validator '{}' exited with status {}",
                self.command_line(),
                output.status
            ))
        } else {
            Verdict::Fail(diagnostic.to_string())
        }
    }
}
