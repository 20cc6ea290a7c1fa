//! Command execution built-in tool.
//!
//! Runs an allow-listed program directly, without a shell, inside the
//! workspace. The dispatcher has already checked the program name and
//! arguments against the workspace command policy.

use crate::tools::builtins::{parse_args, truncate_at_boundary};
use crate::tools::process::{self, ProcessGroupGuard};
use crate::tools::{
    ParamKind, ParamSpec, ToolContext, ToolError, ToolExecutionFuture, ToolExecutorTrait,
    ToolPayload, ToolSpec,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

const TOOL_NAME: &str = "run_command";

/// Maximum output size to capture per stream (1MB).
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Command execution tool executor.
///
/// The child runs in its own process group. If the dispatcher abandons the
/// execution (timeout or cancellation) the whole group is killed; a child
/// that exits on its own is only reaped.
#[derive(Debug, Default, Clone)]
pub struct RunCommandTool;

#[derive(Debug, Deserialize)]
struct RunCommandArgs {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    cwd: Option<PathBuf>,
}

impl RunCommandTool {
    /// Creates a new command tool.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the tool spec for registration.
    #[must_use]
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            TOOL_NAME,
            "Run an allow-listed program with arguments in the workspace and capture its output. No shell is involved: pipes, redirects and globbing are not available.",
            Arc::new(Self::new()),
        )
        .with_param(ParamSpec::required(
            "command",
            ParamKind::Command,
            "Program name, e.g. \"cargo\"",
        ))
        .with_param(ParamSpec::optional(
            "args",
            ParamKind::Arguments,
            "Arguments passed to the program",
        ))
        .with_param(ParamSpec::optional(
            "cwd",
            ParamKind::Path,
            "Working directory relative to the workspace root (default: the root)",
        ))
    }

    /// Truncates output if it exceeds the maximum size.
    fn truncate_output(output: &str) -> (String, bool) {
        if output.len() <= MAX_OUTPUT_SIZE {
            return (output.to_string(), false);
        }
        let head = truncate_at_boundary(output, MAX_OUTPUT_SIZE);
        let head = head.rfind('\n').map_or(head, |idx| &head[..idx]);
        (
            format!(
                "{}\n\n... (output truncated, {} bytes total)",
                head,
                output.len()
            ),
            true,
        )
    }
}

impl ToolExecutorTrait for RunCommandTool {
    fn execute(&self, ctx: ToolContext, args: Map<String, Value>) -> ToolExecutionFuture {
        Box::pin(async move {
            let args: RunCommandArgs = parse_args(TOOL_NAME, args)?;
            let cwd = args
                .cwd
                .unwrap_or_else(|| ctx.workspace().root().to_path_buf());

            if !cwd.is_dir() {
                return Err(ToolError::execution_failed(
                    TOOL_NAME,
                    format!(
                        "working directory is not a directory: {}",
                        ctx.workspace().display_path(&cwd)
                    ),
                ));
            }

            let child = process::command(&args.command, &args.args, &cwd)
                .spawn()
                .map_err(|e| {
                    ToolError::execution_failed(
                        TOOL_NAME,
                        format!("failed to spawn '{}': {e}", args.command),
                    )
                })?;
            let mut group = ProcessGroupGuard::new(child.id());

            tracing::debug!(
                command = %args.command,
                argc = args.args.len(),
                pid = ?child.id(),
                "Command spawned"
            );

            let output = child.wait_with_output().await;
            group.disarm();
            let output = output.map_err(|e| {
                ToolError::execution_failed(TOOL_NAME, format!("process error: {e}"))
            })?;

            let (stdout, stdout_truncated) =
                Self::truncate_output(&String::from_utf8_lossy(&output.stdout));
            let (stderr, stderr_truncated) =
                Self::truncate_output(&String::from_utf8_lossy(&output.stderr));

            Ok(ToolPayload::Process {
                exit_code: output.status.code().unwrap_or(-1),
                stdout,
                stderr,
                truncated: stdout_truncated || stderr_truncated,
            })
        })
    }
}
