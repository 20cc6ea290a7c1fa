//! Edit file built-in tool.
//!
//! Makes targeted string replacements in files.

use crate::tools::builtins::parse_args;
use crate::tools::{
    ParamKind, ParamSpec, ToolContext, ToolError, ToolExecutionFuture, ToolExecutorTrait,
    ToolPayload, ToolSpec,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

const TOOL_NAME: &str = "edit_file";

/// Edit file tool executor.
///
/// Replaces an exact string, once or everywhere, and reports a line diff.
#[derive(Debug, Default, Clone)]
pub struct EditFileTool;

#[derive(Debug, Deserialize)]
struct EditFileArgs {
    path: PathBuf,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

impl EditFileTool {
    /// Creates a new edit file tool.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the tool spec for registration.
    #[must_use]
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            TOOL_NAME,
            "Make targeted string replacements in a file. The old_string must be found exactly once unless replace_all is true.",
            Arc::new(Self::new()),
        )
        .with_param(ParamSpec::required(
            "path",
            ParamKind::Path,
            "Path of the file to edit, relative to the workspace root",
        ))
        .with_param(ParamSpec::required(
            "old_string",
            ParamKind::String,
            "Exact string to find and replace",
        ))
        .with_param(ParamSpec::required(
            "new_string",
            ParamKind::String,
            "Replacement string",
        ))
        .with_param(ParamSpec::optional(
            "replace_all",
            ParamKind::Boolean,
            "Replace all occurrences (default: false, which requires exactly one match)",
        ))
    }

    /// Line-by-line diff of the old and new content.
    fn line_diff(old_content: &str, new_content: &str, shown: &str) -> String {
        let mut diff = format!("--- {shown}\n+++ {shown}\n");
        let old_lines: Vec<&str> = old_content.lines().collect();
        let new_lines: Vec<&str> = new_content.lines().collect();

        for idx in 0..old_lines.len().max(new_lines.len()) {
            match (old_lines.get(idx), new_lines.get(idx)) {
                (Some(o), Some(n)) if o == n => {
                    let _ = writeln!(diff, " {o}");
                }
                (o, n) => {
                    if let Some(o) = o {
                        let _ = writeln!(diff, "-{o}");
                    }
                    if let Some(n) = n {
                        let _ = writeln!(diff, "+{n}");
                    }
                }
            }
        }
        diff
    }
}

impl ToolExecutorTrait for EditFileTool {
    fn execute(&self, ctx: ToolContext, args: Map<String, Value>) -> ToolExecutionFuture {
        Box::pin(async move {
            let args: EditFileArgs = parse_args(TOOL_NAME, args)?;
            let shown = ctx.workspace().display_path(&args.path);

            if args.old_string.is_empty() {
                return Err(ToolError::schema_violation(
                    TOOL_NAME,
                    "old_string cannot be empty",
                ));
            }
            if args.old_string == args.new_string {
                return Err(ToolError::schema_violation(
                    TOOL_NAME,
                    "old_string and new_string are identical",
                ));
            }
            if !args.path.is_file() {
                return Err(ToolError::execution_failed(
                    TOOL_NAME,
                    format!("not an editable file: {shown}"),
                ));
            }

            let content = tokio::fs::read_to_string(&args.path).await.map_err(|e| {
                ToolError::execution_failed(TOOL_NAME, format!("failed to read {shown}: {e}"))
            })?;

            let match_count = content.matches(&args.old_string).count();
            if match_count == 0 {
                return Err(ToolError::execution_failed(
                    TOOL_NAME,
                    "old_string not found in file; verify the exact content to replace",
                ));
            }
            if !args.replace_all && match_count > 1 {
                return Err(ToolError::execution_failed(
                    TOOL_NAME,
                    format!(
                        "old_string found {match_count} times; use replace_all: true to replace all, or provide more context to make it unique"
                    ),
                ));
            }

            let new_content = if args.replace_all {
                content.replace(&args.old_string, &args.new_string)
            } else {
                content.replacen(&args.old_string, &args.new_string, 1)
            };

            tokio::fs::write(&args.path, &new_content).await.map_err(|e| {
                ToolError::execution_failed(TOOL_NAME, format!("failed to write {shown}: {e}"))
            })?;

            Ok(ToolPayload::ChangedFiles {
                summary: Self::line_diff(&content, &new_content, &shown),
                paths: vec![args.path],
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::Workspace;
    use serde_json::json;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(content: &str) -> (TempDir, ToolContext, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().canonicalize().unwrap().join("test.txt");
        fs::write(&path, content).unwrap();
        let workspace =
            Workspace::new(dir.path(), Vec::<String>::new(), Vec::<String>::new()).unwrap();
        (dir, ToolContext::new(workspace, Duration::from_secs(5)), path)
    }

    fn args(path: &std::path::Path, extra: Value) -> Map<String, Value> {
        let mut map = extra.as_object().cloned().unwrap();
        map.insert("path".into(), json!(path.to_str().unwrap()));
        map
    }

    #[tokio::test]
    async fn edit_file_single_replacement() {
        let (_dir, ctx, path) = setup("hello world");

        let payload = EditFileTool::new()
            .execute(
                ctx,
                args(&path, json!({"old_string": "world", "new_string": "rust"})),
            )
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello rust");
        let ToolPayload::ChangedFiles { summary, paths } = payload else {
            panic!("expected changed files");
        };
        assert_eq!(paths, vec![path]);
        assert!(summary.contains("-hello world"));
        assert!(summary.contains("+hello rust"));
    }

    #[tokio::test]
    async fn edit_file_requires_unique_match() {
        let (_dir, ctx, path) = setup("a a a");

        let err = EditFileTool::new()
            .execute(ctx, args(&path, json!({"old_string": "a", "new_string": "b"})))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("found 3 times"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a a a");
    }

    #[tokio::test]
    async fn edit_file_replace_all() {
        let (_dir, ctx, path) = setup("a a a");

        EditFileTool::new()
            .execute(
                ctx,
                args(
                    &path,
                    json!({"old_string": "a", "new_string": "b", "replace_all": true}),
                ),
            )
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "b b b");
    }

    #[tokio::test]
    async fn edit_file_missing_string() {
        let (_dir, ctx, path) = setup("hello");

        let err = EditFileTool::new()
            .execute(ctx, args(&path, json!({"old_string": "bye", "new_string": "x"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn edit_file_rejects_identical_strings() {
        let (_dir, ctx, path) = setup("hello");

        let err = EditFileTool::new()
            .execute(ctx, args(&path, json!({"old_string": "he", "new_string": "he"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("identical"));
    }
}
