//! List directory built-in tool.
//!
//! Lists directory contents with metadata, optionally descending into
//! subdirectories. Symlinks are reported but never followed.

use crate::tools::builtins::parse_args;
use crate::tools::{
    ParamKind, ParamSpec, ToolContext, ToolError, ToolExecutionFuture, ToolExecutorTrait,
    ToolPayload, ToolSpec,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

const TOOL_NAME: &str = "list_directory";
const MAX_ENTRIES: usize = 1000;
const DEFAULT_RECURSIVE_DEPTH: usize = 8;

/// List directory tool executor.
///
/// Lists directory contents with file type, size, and modification time.
#[derive(Debug, Default, Clone)]
pub struct ListDirectoryTool;

#[derive(Debug, Deserialize)]
struct ListDirectoryArgs {
    path: PathBuf,
    #[serde(default)]
    recursive: bool,
    #[serde(default)]
    max_depth: Option<usize>,
}

#[derive(Debug, Serialize)]
struct DirEntry {
    /// Path relative to the listed directory
    name: String,
    /// "file", "dir", or "symlink"
    entry_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    /// ISO 8601, UTC
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<String>,
}

impl ListDirectoryTool {
    /// Creates a new list directory tool.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the tool spec for registration.
    #[must_use]
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            TOOL_NAME,
            "List directory contents with metadata (type, size, modified time).",
            Arc::new(Self::new()),
        )
        .with_param(ParamSpec::required(
            "path",
            ParamKind::Path,
            "Directory to list, relative to the workspace root (use \".\" for the root)",
        ))
        .with_param(ParamSpec::optional(
            "recursive",
            ParamKind::Boolean,
            "Descend into subdirectories (default: false)",
        ))
        .with_param(ParamSpec::optional(
            "max_depth",
            ParamKind::Integer,
            "Maximum depth when recursive (default: 8)",
        ))
    }

    fn format_time(time: std::time::SystemTime) -> String {
        chrono::DateTime::<chrono::Utc>::from(time)
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()
    }

    fn walk(dir: &Path, max_depth: usize) -> Result<(Vec<DirEntry>, bool), ToolError> {
        let mut entries = Vec::new();
        let mut truncated = false;

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| {
                ToolError::execution_failed(TOOL_NAME, format!("failed to read entry: {e}"))
            })?;
            if entries.len() == MAX_ENTRIES {
                truncated = true;
                break;
            }

            let file_type = entry.file_type();
            let entry_type = if file_type.is_symlink() {
                "symlink"
            } else if file_type.is_dir() {
                "dir"
            } else {
                "file"
            };
            let metadata = entry.metadata().ok();

            entries.push(DirEntry {
                name: entry
                    .path()
                    .strip_prefix(dir)
                    .unwrap_or(entry.path())
                    .display()
                    .to_string(),
                entry_type,
                size: metadata.as_ref().filter(|m| m.is_file()).map(|m| m.len()),
                modified: metadata
                    .as_ref()
                    .and_then(|m| m.modified().ok())
                    .map(Self::format_time),
            });
        }

        Ok((entries, truncated))
    }
}

impl ToolExecutorTrait for ListDirectoryTool {
    fn execute(&self, ctx: ToolContext, args: Map<String, Value>) -> ToolExecutionFuture {
        Box::pin(async move {
            let args: ListDirectoryArgs = parse_args(TOOL_NAME, args)?;
            let shown = ctx.workspace().display_path(&args.path);

            if !args.path.is_dir() {
                return Err(ToolError::execution_failed(
                    TOOL_NAME,
                    format!("not a directory: {shown}"),
                ));
            }

            let max_depth = if args.recursive {
                args.max_depth.unwrap_or(DEFAULT_RECURSIVE_DEPTH).max(1)
            } else {
                1
            };

            let path = args.path.clone();
            let (entries, truncated) =
                tokio::task::spawn_blocking(move || Self::walk(&path, max_depth))
                    .await
                    .map_err(|e| {
                        ToolError::execution_failed(TOOL_NAME, format!("listing aborted: {e}"))
                    })??;

            Ok(ToolPayload::Json {
                value: json!({
                    "path": if shown.is_empty() { ".".to_string() } else { shown },
                    "count": entries.len(),
                    "entries": entries,
                    "truncated": truncated,
                }),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::Workspace;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn list(dir: &TempDir, extra: Value) -> Value {
        let workspace =
            Workspace::new(dir.path(), Vec::<String>::new(), Vec::<String>::new()).unwrap();
        let mut args = extra.as_object().cloned().unwrap();
        args.insert("path".into(), json!(workspace.root().to_str().unwrap()));
        let ctx = ToolContext::new(workspace, Duration::from_secs(5));

        match ListDirectoryTool::new().execute(ctx, args).await.unwrap() {
            ToolPayload::Json { value } => value,
            other => panic!("unexpected payload {other:?}"),
        }
    }

    fn names(value: &Value) -> Vec<String> {
        value["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn list_directory_basic() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file1.txt"), "content1").unwrap();
        fs::write(dir.path().join("file2.txt"), "content2").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        fs::write(dir.path().join("subdir").join("inner.txt"), "x").unwrap();

        let result = list(&dir, json!({})).await;
        assert_eq!(result["count"], 3);
        assert_eq!(result["path"], ".");
        assert_eq!(names(&result), vec!["file1.txt", "file2.txt", "subdir"]);

        let entries = result["entries"].as_array().unwrap();
        assert_eq!(entries[0]["size"], 8);
        assert_eq!(entries[2]["entry_type"], "dir");
    }

    #[tokio::test]
    async fn list_directory_recursive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a").join("b")).unwrap();
        fs::write(dir.path().join("a").join("b").join("deep.txt"), "x").unwrap();

        let result = list(&dir, json!({"recursive": true})).await;
        assert!(names(&result).iter().any(|n| n.ends_with("deep.txt")));

        let shallow = list(&dir, json!({"recursive": true, "max_depth": 2})).await;
        assert!(!names(&shallow).iter().any(|n| n.ends_with("deep.txt")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_are_not_followed() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "x").unwrap();
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let result = list(&dir, json!({"recursive": true})).await;
        assert_eq!(names(&result), vec!["link"]);
        assert_eq!(result["entries"][0]["entry_type"], "symlink");
    }
}
