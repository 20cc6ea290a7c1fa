//! # Acton Engine: sandboxed tool-augmented agent execution
//!
//! Turns a task description into a bounded sequence of model-proposed tool
//! calls, runs them inside a sandboxed workspace, and feeds the results back
//! until the model signals completion, the turn budget runs out, or the
//! transport or deadline fails the run. A bounded iteration controller wraps
//! the loop in produce/validate/fix attempts with a hard ceiling.
//!
//! ## Architecture
//!
//! - **Sandbox**: confines paths to a workspace root and commands to an
//!   allow-list
//! - **Tools**: typed tool specs, a registry, and a dispatcher that never
//!   lets a tool failure escape as an error
//! - **Protocol**: the tagged-inline and structured-call wire formats, and
//!   the canonical encoding of tool results
//! - **Engine**: the agent loop state machine and bounded iteration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use acton_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo(transport: Arc<dyn ModelTransport>) -> Result<(), EngineError> {
//! let config = EngineConfig::default();
//! let agent = AgentLoop::new(Arc::new(ToolRegistry::with_builtins()), transport, &config)?;
//! let iteration = BoundedIteration::new(agent, config.task_deadline());
//!
//! let workspace = Workspace::new("/srv/tasks/42", ["cargo"], DEFAULT_DENIED_PATTERNS.iter().copied())?;
//! let validator = CommandValidator::new("cargo", ["test"]);
//! let outcome = iteration
//!     .run("make the tests pass", &workspace, &validator, config.max_attempts)
//!     .await;
//! println!("success: {}", outcome.is_success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod messages;
pub mod protocol;
pub mod sandbox;
pub mod tools;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::engine::{
        AgentLoop, ArtifactSet, BoundedIteration, CommandValidator, Conversation,
        ConversationSeed, Deadline, EngineEvent, EventSink, IterationOutcome, LoopOutcome,
        LoopState, ModelTransport, ScriptedTransport, Validator, Verdict,
    };
    pub use crate::error::{EngineError, TransportError};
    pub use crate::protocol::{ModelOutput, ProtocolFormat};
    pub use crate::sandbox::{Workspace, DEFAULT_DENIED_PATTERNS};
    pub use crate::tools::{ToolPayload, ToolRegistry, ToolResult, ToolSpec};
    pub use crate::types::{RunId, TaskId};
}
