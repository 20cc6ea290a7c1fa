//! Built-in tools.
//!
//! Every built-in declares its path and command parameters with the
//! matching [`ParamKind`](crate::tools::ParamKind), so the dispatcher
//! authorizes them before the executor runs.
//!
//! ## Available Tools
//!
//! ### Filesystem Tools
//! - **read_file**: Read file contents with line numbers
//! - **write_file**: Write content to files, creating directories
//! - **edit_file**: Make targeted string replacements
//! - **list_directory**: List directory contents, optionally recursively
//!
//! ### Execution Tools
//! - **run_command**: Run an allow-listed program without a shell
//!
//! ## Usage
//!
//! ```rust,ignore
//! use acton_engine::tools::{builtins, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! builtins::register_all(&mut registry)?;
//! ```

mod edit_file;
mod list_directory;
mod read_file;
mod run_command;
mod write_file;

pub use edit_file::EditFileTool;
pub use list_directory::ListDirectoryTool;
pub use read_file::ReadFileTool;
pub use run_command::RunCommandTool;
pub use write_file::WriteFileTool;

use crate::tools::{ToolError, ToolRegistry, ToolSpec};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Names of every built-in tool.
pub const BUILTIN_NAMES: &[&str] = &[
    "edit_file",
    "list_directory",
    "read_file",
    "run_command",
    "write_file",
];

/// Specs for every built-in tool.
#[must_use]
pub fn specs() -> Vec<ToolSpec> {
    vec![
        EditFileTool::spec(),
        ListDirectoryTool::spec(),
        ReadFileTool::spec(),
        RunCommandTool::spec(),
        WriteFileTool::spec(),
    ]
}

/// Registers every built-in tool.
///
/// # Errors
///
/// Returns an error if a tool with a built-in name is already registered.
pub fn register_all(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    for spec in specs() {
        registry.register(spec)?;
    }
    Ok(())
}

/// Deserializes already-validated arguments into a tool's argument struct.
pub(crate) fn parse_args<T: DeserializeOwned>(
    tool_name: &str,
    args: Map<String, Value>,
) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| ToolError::schema_violation(tool_name, format!("invalid arguments: {e}")))
}

/// Cuts a string to at most `max` bytes on a character boundary.
pub(crate) fn truncate_at_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
