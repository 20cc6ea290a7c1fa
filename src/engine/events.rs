//! Engine progress events.
//!
//! The loop and iteration controllers report progress through an optional
//! [`EventSink`]. Sinks must not block; the engine calls them inline.

use crate::engine::agent_loop::LoopState;
use crate::tools::FailureClass;
use crate::types::{RunId, TaskId};
use std::fmt;
use tokio::sync::broadcast;

/// Something that happened while running a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A loop run is about to request the model for a new turn
    TurnStarted {
        /// The loop run
        run_id: RunId,
        /// Turn index, starting at 1
        turn: u32,
    },
    /// A tool invocation finished
    ToolDispatched {
        /// The loop run
        run_id: RunId,
        /// Turn the invocation belongs to
        turn: u32,
        /// Invocation call id
        call_id: String,
        /// Tool name
        tool: String,
        /// Failure class, if the invocation failed
        failure: Option<FailureClass>,
    },
    /// A loop run reached a terminal state
    LoopFinished {
        /// The loop run
        run_id: RunId,
        /// Terminal state
        state: LoopState,
        /// Turns taken
        turns: u32,
    },
    /// A bounded-iteration attempt was judged
    AttemptCompleted {
        /// The task being iterated
        task_id: TaskId,
        /// Attempt index, starting at 1
        attempt: u32,
        /// Whether the attempt passed validation
        passed: bool,
    },
}

/// Receives engine events.
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Handles one event.
    fn emit(&self, event: EngineEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Writes events to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::TurnStarted { run_id, turn } => {
                tracing::info!(run_id = %run_id, turn, "Turn started");
            }
            EngineEvent::ToolDispatched {
                run_id,
                turn,
                call_id,
                tool,
                failure,
            } => match failure {
                None => tracing::info!(
                    run_id = %run_id,
                    turn,
                    call_id = %call_id,
                    tool_name = %tool,
                    "Tool dispatched"
                ),
                Some(class) => tracing::warn!(
                    run_id = %run_id,
                    turn,
                    call_id = %call_id,
                    tool_name = %tool,
                    class = %class,
                    "Tool dispatch failed"
                ),
            },
            EngineEvent::LoopFinished {
                run_id,
                state,
                turns,
            } => {
                tracing::info!(run_id = %run_id, state = %state, turns, "Loop finished");
            }
            EngineEvent::AttemptCompleted {
                task_id,
                attempt,
                passed,
            } => {
                tracing::info!(task_id = %task_id, attempt, passed, "Attempt completed");
            }
        }
    }
}

/// Publishes events on a tokio broadcast channel.
///
/// Events sent while nobody is subscribed are dropped. Slow subscribers
/// observe `RecvError::Lagged` rather than slowing the engine down.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: broadcast::Sender<EngineEvent>,
}

impl ChannelEventSink {
    /// Creates a sink buffering up to `capacity` events per subscriber,
    /// together with a first subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<EngineEvent>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Adds a subscriber.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}
