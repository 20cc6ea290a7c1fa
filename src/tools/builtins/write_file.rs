//! Write file built-in tool.
//!
//! Writes content to a file, creating parent directories if needed.

use crate::tools::builtins::parse_args;
use crate::tools::{
    ParamKind, ParamSpec, ToolContext, ToolError, ToolExecutionFuture, ToolExecutorTrait,
    ToolPayload, ToolSpec,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

const TOOL_NAME: &str = "write_file";

/// Write file tool executor.
///
/// Writes content to a file, creating parent directories as needed.
#[derive(Debug, Default, Clone)]
pub struct WriteFileTool;

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    path: PathBuf,
    content: String,
}

impl WriteFileTool {
    /// Creates a new write file tool.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the tool spec for registration.
    #[must_use]
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            TOOL_NAME,
            "Write content to a file, creating parent directories if needed. Overwrites existing files.",
            Arc::new(Self::new()),
        )
        .with_param(ParamSpec::required(
            "path",
            ParamKind::NewPath,
            "Path of the file to write, relative to the workspace root",
        ))
        .with_param(ParamSpec::required(
            "content",
            ParamKind::String,
            "Content to write to the file",
        ))
    }
}

impl ToolExecutorTrait for WriteFileTool {
    fn execute(&self, ctx: ToolContext, args: Map<String, Value>) -> ToolExecutionFuture {
        Box::pin(async move {
            let args: WriteFileArgs = parse_args(TOOL_NAME, args)?;
            let shown = ctx.workspace().display_path(&args.path);

            if let Some(parent) = args.path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ToolError::execution_failed(
                        TOOL_NAME,
                        format!("failed to create parent directories for {shown}: {e}"),
                    )
                })?;
            }

            tokio::fs::write(&args.path, &args.content)
                .await
                .map_err(|e| {
                    ToolError::execution_failed(TOOL_NAME, format!("failed to write {shown}: {e}"))
                })?;

            tracing::debug!(path = %shown, bytes = args.content.len(), "File written");

            Ok(ToolPayload::ChangedFiles {
                summary: format!("wrote {} bytes to {}", args.content.len(), shown),
                paths: vec![args.path],
            })
        })
    }
}
