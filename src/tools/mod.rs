//! Tool registry and dispatch.
//!
//! This module provides the infrastructure for tool registration and execution:
//!
//! - **Tool Specs**: name, description, typed parameters and an executor
//! - **Tool Registry**: name-keyed lookup, catalog generation and dispatch
//! - **Built-ins**: filesystem and command tools confined to a workspace
//!
//! ## Dispatch Pipeline
//!
//! ```text
//! ToolInvocation
//!       |
//!       v
//! +-------------+   unknown tool / bad args   +-------------------+
//! | lookup +    | --------------------------> | SchemaViolation   |
//! | validate    |                             +-------------------+
//! +-------------+
//!       |
//!       v
//! +-------------+   escaping path / command   +-------------------+
//! | sandbox     | --------------------------> | Path/Command      |
//! | authorize   |                             | Violation         |
//! +-------------+                             +-------------------+
//!       |
//!       v
//! +-------------+   error / panic / timeout   +-------------------+
//! | execute     | --------------------------> | ExecutionFailed / |
//! | (spawned)   |                             | TimedOut          |
//! +-------------+                             +-------------------+
//!       |
//!       v
//!  ToolResult (success)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use acton_engine::tools::ToolRegistry;
//!
//! let registry = ToolRegistry::with_builtins();
//! let result = registry.dispatch(&invocation, &workspace, timeout).await;
//! ```

pub mod builtins;
mod catalog;
mod definition;
mod error;
pub(crate) mod process;
mod registry;
mod result;
mod schema;

pub use crate::messages::ToolDefinition;
pub use catalog::{CatalogEntry, ToolCatalog};
pub use definition::{
    ParamKind, ParamSpec, ToolContext, ToolExecutionFuture, ToolExecutorTrait, ToolSpec,
};
pub use error::{ToolError, ToolErrorKind};
pub use registry::ToolRegistry;
pub use result::{FailureClass, ToolFailure, ToolPayload, ToolResult};
pub use schema::{input_schema, validate_arguments};
