//! The agent loop and bounded iteration controllers.
//!
//! ```text
//! BoundedIteration ── attempt ──> AgentLoop ── complete ──> ModelTransport
//!        │                           │
//!        │                           └── dispatch ──> ToolRegistry ──> Workspace
//!        └── validate ──> Validator
//! ```
//!
//! The transport and the validator are the two seams to the outside world.
//! Progress is reported through an optional [`EventSink`].

mod agent_loop;
mod conversation;
mod events;
mod iteration;
mod transport;

pub use agent_loop::{AgentLoop, Deadline, LoopOutcome, LoopRun, LoopState};
pub use conversation::{AttemptFeedback, Conversation, ConversationSeed, ConversationTurn};
pub use events::{ChannelEventSink, EngineEvent, EventSink, NoopEventSink, TracingEventSink};
pub use iteration::{
    ArtifactSet, BoundedIteration, CommandValidator, IterationAttempt, IterationOutcome,
    Validator, Verdict,
};
pub use transport::{ModelTransport, ScriptedTransport};
