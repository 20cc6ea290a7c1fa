//! Tool registry and dispatcher.
//!
//! The registry maps tool names to [`ToolSpec`]s. Dispatch resolves an
//! invocation to its spec, checks the arguments against the declared
//! parameters, authorizes paths and commands through the workspace sandbox,
//! and only then runs the executor under a timeout. Every outcome, including
//! a panic inside the executor, comes back as a [`ToolResult`].

use crate::protocol::{ToolInvocation, COMPLETION_TOOL};
use crate::sandbox::Workspace;
use crate::tools::catalog::{CatalogEntry, ToolCatalog};
use crate::tools::definition::{ParamKind, ToolContext, ToolSpec};
use crate::tools::error::ToolError;
use crate::tools::result::ToolResult;
use crate::tools::schema::validate_arguments;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Registered tools, keyed by name.
///
/// Registration happens before a task starts; during a task the registry is
/// only read, so it can be shared behind an `Arc` across concurrent tasks.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolSpec>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in tool.
    #[must_use]
    pub fn with_builtins() -> Self {
        let tools = crate::tools::builtins::specs()
            .into_iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect();
        Self { tools }
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already registered or is reserved for
    /// the completion signal.
    pub fn register(&mut self, spec: ToolSpec) -> Result<(), ToolError> {
        if spec.name == COMPLETION_TOOL {
            return Err(ToolError::reserved_name(&spec.name));
        }
        if self.tools.contains_key(&spec.name) {
            return Err(ToolError::already_registered(&spec.name));
        }

        tracing::debug!(
            tool_name = %spec.name,
            params = spec.params.len(),
            "Tool registered"
        );
        self.tools.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Checks if a tool is registered.
    #[must_use]
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Looks up a tool spec by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// Builds the catalog advertised to the model.
    #[must_use]
    pub fn catalog(&self) -> ToolCatalog {
        ToolCatalog::new(
            self.tools
                .values()
                .map(|spec| CatalogEntry {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    params: spec.params.clone(),
                })
                .collect(),
        )
    }

    /// Runs one invocation inside the workspace.
    ///
    /// Never fails: unknown tools, bad arguments, sandbox violations,
    /// executor errors, timeouts and panics all become failed results. A
    /// timed-out executor is aborted before this returns, which drops and
    /// kills any process it spawned. Dropping the returned future aborts the
    /// executor too.
    pub async fn dispatch(
        &self,
        invocation: &ToolInvocation,
        workspace: &Workspace,
        timeout: Duration,
    ) -> ToolResult {
        let tool_name = invocation.tool.as_str();
        let call_id = invocation.call_id.as_str();

        let Some(spec) = self.tools.get(tool_name) else {
            tracing::warn!(tool_name = %tool_name, call_id = %call_id, "Unknown tool requested");
            return ToolResult::from_error(call_id, tool_name, &ToolError::not_found(tool_name));
        };

        let args = match validate_arguments(spec, &invocation.args)
            .and_then(|args| authorize(spec, args, workspace))
        {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(
                    tool_name = %tool_name,
                    call_id = %call_id,
                    class = %e.class(),
                    "Tool invocation rejected"
                );
                return ToolResult::from_error(call_id, tool_name, &e);
            }
        };

        tracing::debug!(tool_name = %tool_name, call_id = %call_id, "Executing tool");

        let ctx = ToolContext::new(workspace.clone(), timeout);
        let mut handle = tokio::spawn(spec.executor.execute(ctx, args));
        let _abort = AbortOnDrop(handle.abort_handle());

        let outcome = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(join_error)) => {
                let reason = if join_error.is_panic() {
                    "tool panicked during execution"
                } else {
                    "tool task was cancelled"
                };
                Err(ToolError::execution_failed(tool_name, reason))
            }
            Err(_) => {
                handle.abort();
                // Wait for the abort so the executor's resources are dropped
                // before the result is reported.
                let _ = handle.await;
                Err(ToolError::timed_out(tool_name, timeout))
            }
        };

        match outcome {
            Ok(payload) => {
                tracing::info!(tool_name = %tool_name, call_id = %call_id, "Tool succeeded");
                ToolResult::success(call_id, tool_name, payload)
            }
            Err(e) => {
                tracing::warn!(
                    tool_name = %tool_name,
                    call_id = %call_id,
                    class = %e.class(),
                    error = %e,
                    "Tool failed"
                );
                ToolResult::from_error(call_id, tool_name, &e)
            }
        }
    }
}

/// Aborts the executor task if dispatch itself is cancelled, for example
/// when the task deadline passes mid-call.
struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Passes path and command arguments through the sandbox.
///
/// Path arguments are replaced by their canonical form so executors never
/// see the requested spelling.
fn authorize(
    spec: &ToolSpec,
    mut args: Map<String, Value>,
    workspace: &Workspace,
) -> Result<Map<String, Value>, ToolError> {
    let enforcer = workspace.enforcer();

    for param in spec.params.iter().filter(|p| p.kind.is_path()) {
        let Some(requested) = args.get(&param.name).and_then(Value::as_str) else {
            continue;
        };
        let canonical = if param.kind == ParamKind::NewPath {
            enforcer.authorize_new_path(requested)?
        } else {
            enforcer.authorize_path(requested)?
        };
        let Some(canonical) = canonical.to_str().map(str::to_owned) else {
            return Err(ToolError::execution_failed(
                &spec.name,
                format!("path for '{}' is not valid UTF-8", param.name),
            ));
        };
        args.insert(param.name.clone(), Value::String(canonical));
    }

    let arguments: Vec<String> = spec
        .params
        .iter()
        .filter(|p| p.kind == ParamKind::Arguments)
        .filter_map(|p| args.get(&p.name).and_then(Value::as_array))
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_owned))
        .collect();

    for param in spec.params.iter().filter(|p| p.kind == ParamKind::Command) {
        if let Some(command) = args.get(&param.name).and_then(Value::as_str) {
            enforcer.authorize_command(command, &arguments)?;
        }
    }

    Ok(args)
}
