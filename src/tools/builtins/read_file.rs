//! Read file built-in tool.
//!
//! Reads file contents and returns them with line numbers.

use crate::tools::builtins::{parse_args, truncate_at_boundary};
use crate::tools::{
    ParamKind, ParamSpec, ToolContext, ToolError, ToolExecutionFuture, ToolExecutorTrait,
    ToolPayload, ToolSpec,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

const TOOL_NAME: &str = "read_file";
const DEFAULT_LIMIT: usize = 2000;
const MAX_LINE_LENGTH: usize = 2000;

/// Read file tool executor.
///
/// Reads file contents with optional offset and limit,
/// returning content with line numbers.
#[derive(Debug, Default, Clone)]
pub struct ReadFileTool;

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: String,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

impl ReadFileTool {
    /// Creates a new read file tool.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the tool spec for registration.
    #[must_use]
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            TOOL_NAME,
            "Read file contents with optional line offset and limit. Returns content with line numbers.",
            Arc::new(Self::new()),
        )
        .with_param(ParamSpec::required(
            "path",
            ParamKind::Path,
            "Path of the file to read, relative to the workspace root",
        ))
        .with_param(ParamSpec::optional(
            "offset",
            ParamKind::Integer,
            "Line number to start from (1-indexed, default: 1)",
        ))
        .with_param(ParamSpec::optional(
            "limit",
            ParamKind::Integer,
            "Maximum number of lines to read (default: 2000)",
        ))
    }

    /// Formats file content with line numbers.
    fn number_lines(content: &str, offset: Option<usize>, limit: Option<usize>) -> Value {
        let start_line = offset.unwrap_or(1).max(1);
        let max_lines = limit.unwrap_or(DEFAULT_LIMIT);

        let all_lines: Vec<&str> = content.lines().collect();
        let total_lines = all_lines.len();

        let start_idx = (start_line - 1).min(total_lines);
        let end_idx = start_idx.saturating_add(max_lines).min(total_lines);
        let width = end_idx.to_string().len().max(4);

        let mut formatted = String::new();
        for (idx, line) in all_lines.iter().enumerate().take(end_idx).skip(start_idx) {
            let shown = truncate_at_boundary(line, MAX_LINE_LENGTH);
            let ellipsis = if shown.len() < line.len() { "..." } else { "" };
            let _ = writeln!(formatted, "{:>width$}\t{}{}", idx + 1, shown, ellipsis);
        }

        json!({
            "content": formatted,
            "total_lines": total_lines,
            "start_line": start_line,
            "end_line": if end_idx > start_idx { end_idx } else { start_line },
            "truncated": end_idx < total_lines,
        })
    }
}

impl ToolExecutorTrait for ReadFileTool {
    fn execute(&self, ctx: ToolContext, args: Map<String, Value>) -> ToolExecutionFuture {
        Box::pin(async move {
            let args: ReadFileArgs = parse_args(TOOL_NAME, args)?;
            let path = Path::new(&args.path);
            let shown = ctx.workspace().display_path(path);

            if !path.is_file() {
                return Err(ToolError::execution_failed(
                    TOOL_NAME,
                    format!("not a readable file: {shown}"),
                ));
            }

            let bytes = tokio::fs::read(path).await.map_err(|e| {
                ToolError::execution_failed(TOOL_NAME, format!("failed to read {shown}: {e}"))
            })?;

            let sample = &bytes[..bytes.len().min(8192)];
            if sample.iter().filter(|&&b| b == 0).count() > sample.len() / 10 {
                return Err(ToolError::execution_failed(
                    TOOL_NAME,
                    "file appears to be binary; use a different tool for binary files",
                ));
            }

            let content = String::from_utf8(bytes).map_err(|_| {
                ToolError::execution_failed(TOOL_NAME, format!("{shown} is not valid UTF-8"))
            })?;

            Ok(ToolPayload::Json {
                value: Self::number_lines(&content, args.offset, args.limit),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::Workspace;
    use std::time::Duration;
    use tempfile::TempDir;

    fn ctx(dir: &TempDir) -> ToolContext {
        let workspace =
            Workspace::new(dir.path(), Vec::<String>::new(), Vec::<String>::new()).unwrap();
        ToolContext::new(workspace, Duration::from_secs(5))
    }

    fn args(path: &Path, extra: Value) -> Map<String, Value> {
        let mut map = extra.as_object().cloned().unwrap_or_default();
        map.insert("path".into(), json!(path.to_str().unwrap()));
        map
    }

    async fn read(dir: &TempDir, extra: Value) -> Result<Value, ToolError> {
        let path = dir.path().canonicalize().unwrap().join("file.txt");
        match ReadFileTool::new().execute(ctx(dir), args(&path, extra)).await? {
            ToolPayload::Json { value } => Ok(value),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    fn write_lines(dir: &TempDir, count: usize) {
        let body: String = (1..=count).map(|i| format!("line {i}\n")).collect();
        std::fs::write(dir.path().join("file.txt"), body).unwrap();
    }

    #[tokio::test]
    async fn read_file_basic() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir, 3);

        let result = read(&dir, json!({})).await.unwrap();
        let content = result["content"].as_str().unwrap();
        assert!(content.contains("line 1"));
        assert!(content.contains("line 3"));
        assert_eq!(result["total_lines"], 3);
        assert!(!result["truncated"].as_bool().unwrap());
    }

    #[tokio::test]
    async fn read_file_with_offset() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir, 10);

        let result = read(&dir, json!({"offset": 5})).await.unwrap();
        let content = result["content"].as_str().unwrap();
        assert!(!content.contains("line 4\n"));
        assert!(content.contains("line 5"));
        assert!(content.contains("line 10"));
        assert_eq!(result["start_line"], 5);
    }

    #[tokio::test]
    async fn read_file_with_limit() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir, 10);

        let result = read(&dir, json!({"limit": 3})).await.unwrap();
        let content = result["content"].as_str().unwrap();
        assert!(content.contains("line 3"));
        assert!(!content.contains("line 4"));
        assert!(result["truncated"].as_bool().unwrap());
    }

    #[tokio::test]
    async fn read_directory_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("file.txt")).unwrap();

        let err = read(&dir, json!({})).await.unwrap_err();
        assert!(err.to_string().contains("not a readable file"));
    }

    #[tokio::test]
    async fn binary_file_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("file.txt"), [0u8; 64]).unwrap();

        let err = read(&dir, json!({})).await.unwrap_err();
        assert!(err.to_string().contains("binary"));
    }

    #[test]
    fn spec_declares_path_param() {
        let spec = ReadFileTool::spec();
        assert_eq!(spec.name, "read_file");
        assert_eq!(spec.param("path").map(|p| p.kind), Some(ParamKind::Path));
        assert!(spec.param("offset").is_some_and(|p| !p.required));
    }
}
