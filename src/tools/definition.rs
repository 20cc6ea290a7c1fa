//! Tool specifications and the executor trait.
//!
//! A [`ToolSpec`] declares a tool's name, description, typed parameters and
//! the executor that runs it. The parameter kinds tell the dispatcher which
//! arguments must pass through the sandbox before the executor sees them.

use crate::sandbox::Workspace;
use crate::tools::error::ToolError;
use crate::tools::result::ToolPayload;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Debug};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// The declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Free-form string
    String,
    /// Signed or unsigned integer
    Integer,
    /// Boolean flag
    Boolean,
    /// List of strings
    StringList,
    /// Path to an existing entry, or a new entry whose parent exists
    Path,
    /// Path to a file that may live in directories not yet created
    NewPath,
    /// Program name checked against the command allow-list
    Command,
    /// Program arguments checked against the denied patterns
    Arguments,
}

impl ParamKind {
    /// The JSON Schema type for this kind.
    #[must_use]
    pub fn json_type(self) -> &'static str {
        match self {
            Self::String | Self::Path | Self::NewPath | Self::Command => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::StringList | Self::Arguments => "array",
        }
    }

    /// Returns true if arguments of this kind are list-valued.
    #[must_use]
    pub fn is_list(self) -> bool {
        matches!(self, Self::StringList | Self::Arguments)
    }

    /// Returns true if arguments of this kind are workspace paths.
    #[must_use]
    pub fn is_path(self) -> bool {
        matches!(self, Self::Path | Self::NewPath)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::StringList => "string list",
            Self::Path => "path",
            Self::NewPath => "path",
            Self::Command => "command",
            Self::Arguments => "argument list",
        };
        f.write_str(name)
    }
}

/// A declared tool parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name as it appears in arguments
    pub name: String,
    /// Declared type
    pub kind: ParamKind,
    /// Whether the parameter must be present
    pub required: bool,
    /// Description shown to the model
    pub description: String,
}

impl ParamSpec {
    /// Declares a required parameter.
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
        }
    }

    /// Declares an optional parameter.
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: description.into(),
        }
    }
}

/// What an executor is given besides its arguments.
#[derive(Debug, Clone)]
pub struct ToolContext {
    workspace: Workspace,
    timeout: Duration,
}

impl ToolContext {
    /// Creates a context for one execution.
    #[must_use]
    pub fn new(workspace: Workspace, timeout: Duration) -> Self {
        Self { workspace, timeout }
    }

    /// The workspace the invocation runs in.
    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// The timeout the dispatcher enforces on this execution.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// The result type for tool execution futures.
pub type ToolExecutionFuture =
    Pin<Box<dyn Future<Output = Result<ToolPayload, ToolError>> + Send + 'static>>;

/// Trait for executing tools.
///
/// Executors receive arguments that have already been checked against the
/// tool's parameters. Path parameters arrive as canonical absolute paths
/// inside the workspace, and command parameters have passed the allow-list.
///
/// # Example
///
/// ```rust
/// use acton_engine::tools::{ToolContext, ToolExecutionFuture, ToolExecutorTrait, ToolPayload};
/// use serde_json::{Map, Value};
///
/// #[derive(Debug)]
/// struct EchoTool;
///
/// impl ToolExecutorTrait for EchoTool {
///     fn execute(&self, _ctx: ToolContext, args: Map<String, Value>) -> ToolExecutionFuture {
///         Box::pin(async move {
///             Ok(ToolPayload::Json {
///                 value: Value::Object(args),
///             })
///         })
///     }
/// }
/// ```
pub trait ToolExecutorTrait: Send + Sync + Debug {
    /// Executes the tool with the given arguments.
    fn execute(&self, ctx: ToolContext, args: Map<String, Value>) -> ToolExecutionFuture;
}

/// A registered tool: declaration plus executor.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Unique tool name
    pub name: String,
    /// Description shown to the model
    pub description: String,
    /// Declared parameters, in display order
    pub params: Vec<ParamSpec>,
    /// The executor that runs the tool
    pub executor: Arc<dyn ToolExecutorTrait>,
}

impl ToolSpec {
    /// Creates a tool spec with no parameters.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        executor: Arc<dyn ToolExecutorTrait>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            executor,
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Looks up a declared parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}
