//! The agent loop state machine.
//!
//! One loop run drives a conversation turn by turn:
//!
//! ```text
//! Requesting ──> Decoding ──> Dispatching ──┬──> Requesting
//!     │                                     ├──> Completed
//!     └──> Failed                           └──> Exhausted
//! ```
//!
//! A turn completes the run only when the model signalled completion and
//! nothing from that turn is pending: every invocation succeeded and no call
//! was malformed. Otherwise the results are fed back and the loop continues
//! until the turn budget runs out. Only an unreachable transport or the task
//! deadline fail a run.

use crate::config::EngineConfig;
use crate::engine::conversation::{Conversation, ConversationSeed, ConversationTurn};
use crate::engine::events::{EngineEvent, EventSink, NoopEventSink};
use crate::engine::transport::ModelTransport;
use crate::error::EngineError;
use crate::protocol::{DecodedOutput, ModelOutput, ProtocolCodec, ProtocolFormat};
use crate::sandbox::Workspace;
use crate::tools::ToolRegistry;
use crate::types::RunId;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Where a loop run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    /// Waiting for the model
    Requesting,
    /// Decoding the model output
    Decoding,
    /// Running the decoded invocations
    Dispatching,
    /// The model finished cleanly
    Completed,
    /// The turn budget ran out
    Exhausted,
    /// The transport or the deadline ended the run
    Failed,
}

impl LoopState {
    /// Returns true for `Completed`, `Exhausted` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exhausted | Self::Failed)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requesting => write!(f, "requesting"),
            Self::Decoding => write!(f, "decoding"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Completed => write!(f, "completed"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A point in time by which a task must be finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// A deadline `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// The instant the deadline expires.
    #[must_use]
    pub fn at(&self) -> Instant {
        self.at
    }

    /// The total budget the deadline was created with.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Returns true once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// The error reported when this deadline passes.
    #[must_use]
    pub fn exceeded(&self) -> EngineError {
        EngineError::deadline_exceeded(self.budget)
    }
}

/// The conversation and artifacts a loop run leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopRun {
    /// Identifies the run in events and logs
    pub run_id: RunId,
    /// Full history of the run
    pub conversation: Conversation,
    /// Every file reported changed by a successful tool call
    pub artifacts: BTreeSet<PathBuf>,
}

impl LoopRun {
    /// Number of turns taken.
    #[must_use]
    pub fn turns(&self) -> u32 {
        self.conversation.last_turn().map_or(0, |turn| turn.index)
    }
}

/// How a loop run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model signalled completion on a clean turn
    Completed(LoopRun),
    /// The turn budget ran out without completion
    Exhausted(LoopRun),
    /// The transport became unavailable or the deadline passed
    Failed {
        /// What ended the run
        error: EngineError,
        /// History up to the failure
        run: LoopRun,
    },
}

impl LoopOutcome {
    /// The terminal state this outcome corresponds to.
    #[must_use]
    pub fn state(&self) -> LoopState {
        match self {
            Self::Completed(_) => LoopState::Completed,
            Self::Exhausted(_) => LoopState::Exhausted,
            Self::Failed { .. } => LoopState::Failed,
        }
    }

    /// Returns true if the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The run history.
    #[must_use]
    pub fn run(&self) -> &LoopRun {
        match self {
            Self::Completed(run) | Self::Exhausted(run) | Self::Failed { run, .. } => run,
        }
    }

    /// Consumes the outcome, returning the run history.
    #[must_use]
    pub fn into_run(self) -> LoopRun {
        match self {
            Self::Completed(run) | Self::Exhausted(run) | Self::Failed { run, .. } => run,
        }
    }

    /// The final conversation.
    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.run().conversation
    }

    /// Files changed during the run.
    #[must_use]
    pub fn artifacts(&self) -> &BTreeSet<PathBuf> {
        &self.run().artifacts
    }

    /// The error that failed the run, if any.
    #[must_use]
    pub fn error(&self) -> Option<&EngineError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Internal position in the state machine, carrying the data each step
/// hands to the next.
enum Step {
    Requesting,
    Decoding(ModelOutput),
    Dispatching(ModelOutput, DecodedOutput),
    Finished(LoopState),
    Aborted(EngineError),
}

impl Step {
    fn state(&self) -> LoopState {
        match self {
            Self::Requesting => LoopState::Requesting,
            Self::Decoding(_) => LoopState::Decoding,
            Self::Dispatching(..) => LoopState::Dispatching,
            Self::Finished(state) => *state,
            Self::Aborted(_) => LoopState::Failed,
        }
    }
}

/// Drives one conversation against a transport and a tool registry.
///
/// # Example
///
/// ```rust,no_run
/// use acton_engine::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn demo() -> Result<(), EngineError> {
/// let registry = Arc::new(ToolRegistry::with_builtins());
/// let transport = Arc::new(ScriptedTransport::from_texts([
///     "<tool_call name=\"write_file\">{\"path\": \"out.txt\", \"content\": \"hi\"}</tool_call>\n<task_complete/>",
/// ]));
/// let agent = AgentLoop::new(registry, transport, &EngineConfig::default())?;
///
/// let workspace = Workspace::new("/tmp/task", ["ls"], DEFAULT_DENIED_PATTERNS.iter().copied())?;
/// let outcome = agent
///     .run(ConversationSeed::new("write hi to out.txt"), &workspace, Deadline::after(Duration::from_secs(60)))
///     .await;
/// assert!(outcome.is_completed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AgentLoop {
    registry: Arc<ToolRegistry>,
    transport: Arc<dyn ModelTransport>,
    codec: ProtocolCodec,
    max_turns: u32,
    tool_timeout: Duration,
    events: Arc<dyn EventSink>,
}

impl AgentLoop {
    /// Creates a loop controller from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid.
    pub fn new(
        registry: Arc<ToolRegistry>,
        transport: Arc<dyn ModelTransport>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            registry,
            transport,
            codec: ProtocolCodec::new(config.protocol),
            max_turns: config.max_turns,
            tool_timeout: config.tool_timeout(),
            events: Arc::new(NoopEventSink),
        })
    }

    /// Reports progress to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// The wire format of this loop.
    #[must_use]
    pub fn format(&self) -> ProtocolFormat {
        self.codec.format()
    }

    /// The turn budget.
    #[must_use]
    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// The event sink.
    pub(crate) fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Runs a conversation from `seed` until it completes, exhausts its
    /// turns, or fails.
    ///
    /// Model requests and tool dispatches are both bounded by `deadline`.
    pub async fn run(
        &self,
        seed: ConversationSeed,
        workspace: &Workspace,
        deadline: Deadline,
    ) -> LoopOutcome {
        let run_id = RunId::new();
        let catalog = self.registry.catalog();
        let mut conversation = Conversation::new(seed);
        let mut artifacts = BTreeSet::new();
        let mut turn: u32 = 0;
        let mut step = Step::Requesting;

        tracing::debug!(
            run_id = %run_id,
            format = %self.codec.format(),
            max_turns = self.max_turns,
            tools = catalog.len(),
            "Loop run started"
        );

        let end = loop {
            tracing::trace!(run_id = %run_id, turn, state = %step.state(), "Loop step");
            step = match step {
                Step::Requesting => {
                    turn += 1;
                    self.events.emit(EngineEvent::TurnStarted {
                        run_id: run_id.clone(),
                        turn,
                    });
                    let request =
                        self.transport
                            .complete(&conversation, &catalog, self.codec.format());
                    match timeout_at(deadline.at(), request).await {
                        Ok(Ok(output)) => Step::Decoding(output),
                        Ok(Err(e)) => {
                            tracing::error!(run_id = %run_id, turn, error = %e, "Transport unavailable");
                            Step::Aborted(e.into())
                        }
                        Err(_) => Step::Aborted(deadline.exceeded()),
                    }
                }
                Step::Decoding(output) => {
                    let decoded = self.codec.decode(&output, turn);
                    tracing::debug!(
                        run_id = %run_id,
                        turn,
                        invocations = decoded.invocations.len(),
                        warnings = decoded.warnings.len(),
                        completion = decoded.completion,
                        "Model output decoded"
                    );
                    Step::Dispatching(output, decoded)
                }
                Step::Dispatching(output, decoded) => {
                    let mut results = Vec::with_capacity(decoded.invocations.len());
                    let mut expired = false;
                    for invocation in &decoded.invocations {
                        let dispatch =
                            self.registry
                                .dispatch(invocation, workspace, self.tool_timeout);
                        let Ok(result) = timeout_at(deadline.at(), dispatch).await else {
                            expired = true;
                            break;
                        };
                        if result.success {
                            artifacts.extend(result.payload.changed_files().iter().cloned());
                        }
                        self.events.emit(EngineEvent::ToolDispatched {
                            run_id: run_id.clone(),
                            turn,
                            call_id: result.call_id.clone(),
                            tool: result.tool.clone(),
                            failure: result.failure_class(),
                        });
                        results.push(result);
                    }

                    let DecodedOutput {
                        invocations,
                        narrative,
                        warnings,
                        completion,
                    } = decoded;
                    let record = ConversationTurn {
                        index: turn,
                        output,
                        invocations,
                        results,
                        warnings,
                        narrative,
                        completion,
                    };
                    let accepted = !expired && record.accepted_completion();
                    conversation.push(record);

                    if expired {
                        Step::Aborted(deadline.exceeded())
                    } else if accepted {
                        Step::Finished(LoopState::Completed)
                    } else if turn >= self.max_turns {
                        Step::Finished(LoopState::Exhausted)
                    } else {
                        Step::Requesting
                    }
                }
                Step::Finished(state) => break Ok(state),
                Step::Aborted(error) => break Err(error),
            };
        };

        let run = LoopRun {
            run_id: run_id.clone(),
            conversation,
            artifacts,
        };
        let outcome = match end {
            Ok(LoopState::Completed) => LoopOutcome::Completed(run),
            Ok(_) => LoopOutcome::Exhausted(run),
            Err(error) => LoopOutcome::Failed { error, run },
        };

        tracing::info!(
            run_id = %run_id,
            state = %outcome.state(),
            turns = turn,
            artifacts = outcome.artifacts().len(),
            "Loop run finished"
        );
        self.events.emit(EngineEvent::LoopFinished {
            run_id,
            state: outcome.state(),
            turns: turn,
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::ChannelEventSink;
    use crate::engine::transport::ScriptedTransport;
    use crate::error::TransportError;
    use crate::tools::{
        FailureClass, ToolContext, ToolExecutionFuture, ToolExecutorTrait, ToolPayload, ToolSpec,
    };
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use tempfile::TempDir;

    fn workspace(dir: &TempDir) -> Workspace {
        Workspace::new(dir.path(), ["ls"], Vec::<String>::new()).unwrap()
    }

    fn agent(script: Vec<&str>, max_turns: u32) -> AgentLoop {
        AgentLoop::new(
            Arc::new(ToolRegistry::with_builtins()),
            Arc::new(ScriptedTransport::from_texts(script)),
            &EngineConfig::new().with_max_turns(max_turns),
        )
        .unwrap()
    }

    fn minute() -> Deadline {
        Deadline::after(Duration::from_secs(60))
    }

    #[test]
    fn terminal_states() {
        assert!(LoopState::Completed.is_terminal());
        assert!(LoopState::Exhausted.is_terminal());
        assert!(LoopState::Failed.is_terminal());
        assert!(!LoopState::Requesting.is_terminal());
        assert_eq!(LoopState::Dispatching.to_string(), "dispatching");
    }

    #[test]
    fn zero_turn_budget_is_rejected() {
        let result = AgentLoop::new(
            Arc::new(ToolRegistry::new()),
            Arc::new(ScriptedTransport::default()),
            &EngineConfig::new().with_max_turns(0),
        );
        assert!(result.unwrap_err().is_configuration());
    }

    #[tokio::test]
    async fn completes_on_clean_turn_with_signal() {
        let dir = TempDir::new().unwrap();
        let agent = agent(
            vec!["<tool_call name=\"write_file\">{\"path\": \"out.txt\", \"content\": \"hi\"}</tool_call>\n<task_complete/>"],
            5,
        );

        let outcome = agent
            .run(ConversationSeed::new("write"), &workspace(&dir), minute())
            .await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.run().turns(), 1);
        assert_eq!(outcome.artifacts().len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.txt")).unwrap(),
            "hi"
        );
    }

    #[tokio::test]
    async fn completion_with_failed_call_is_not_accepted() {
        let dir = TempDir::new().unwrap();
        let agent = agent(
            vec![
                "<tool_call name=\"read_file\">{\"path\": \"missing.txt\"}</tool_call><task_complete/>",
                "<task_complete/>",
            ],
            5,
        );

        let outcome = agent
            .run(ConversationSeed::new("read"), &workspace(&dir), minute())
            .await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.run().turns(), 2);
        let first = &outcome.conversation().turns()[0];
        assert!(first.completion);
        assert!(!first.accepted_completion());
    }

    #[tokio::test]
    async fn completion_with_malformed_call_is_not_accepted() {
        let dir = TempDir::new().unwrap();
        let agent = agent(
            vec!["<tool_call name=\"write_file\">{not json}</tool_call><task_complete/>"],
            1,
        );

        let outcome = agent
            .run(ConversationSeed::new("write"), &workspace(&dir), minute())
            .await;

        assert_eq!(outcome.state(), LoopState::Exhausted);
        assert_eq!(outcome.conversation().turns()[0].warnings.len(), 1);
    }

    #[tokio::test]
    async fn single_turn_budget_exhausts_after_one_cycle() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::from_texts(["still thinking", "done"]));
        let agent = AgentLoop::new(
            Arc::new(ToolRegistry::with_builtins()),
            transport.clone(),
            &EngineConfig::new().with_max_turns(1),
        )
        .unwrap();

        let outcome = agent
            .run(ConversationSeed::new("task"), &workspace(&dir), minute())
            .await;

        assert_eq!(outcome.state(), LoopState::Exhausted);
        assert_eq!(outcome.run().turns(), 1);
        assert_eq!(transport.requests(), 1);
        assert!(outcome.error().is_none());
    }

    #[tokio::test]
    async fn exhausted_script_fails_as_transport_unavailable() {
        let dir = TempDir::new().unwrap();
        let agent = agent(vec!["hmm"], 5);

        let outcome = agent
            .run(ConversationSeed::new("task"), &workspace(&dir), minute())
            .await;

        assert_eq!(outcome.state(), LoopState::Failed);
        assert!(outcome.error().unwrap().is_transport_unavailable());
        assert_eq!(outcome.conversation().turns().len(), 1);
    }

    #[derive(Debug)]
    struct StalledTransport;

    #[async_trait]
    impl ModelTransport for StalledTransport {
        async fn complete(
            &self,
            _conversation: &Conversation,
            _catalog: &crate::tools::ToolCatalog,
            _format: ProtocolFormat,
        ) -> Result<ModelOutput, TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ModelOutput::text("too late"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fails_the_run() {
        let dir = TempDir::new().unwrap();
        let agent = AgentLoop::new(
            Arc::new(ToolRegistry::new()),
            Arc::new(StalledTransport),
            &EngineConfig::default(),
        )
        .unwrap();

        let outcome = agent
            .run(
                ConversationSeed::new("task"),
                &workspace(&dir),
                Deadline::after(Duration::from_secs(5)),
            )
            .await;

        assert!(outcome.error().unwrap().is_deadline_exceeded());
        assert!(outcome.conversation().turns().is_empty());
    }

    #[derive(Debug)]
    struct SleepTool;

    impl ToolExecutorTrait for SleepTool {
        fn execute(&self, _ctx: ToolContext, _args: Map<String, Value>) -> ToolExecutionFuture {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ToolPayload::Empty)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_dispatch_fails_the_run() {
        let dir = TempDir::new().unwrap();
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolSpec::new("sleep", "Sleeps", Arc::new(SleepTool)))
            .unwrap();
        let agent = AgentLoop::new(
            Arc::new(registry),
            Arc::new(ScriptedTransport::from_texts([
                "<tool_call name=\"sleep\">{}</tool_call>\n<task_complete/>",
            ])),
            &EngineConfig::new().with_tool_timeout(Duration::from_secs(600)),
        )
        .unwrap();
        let started = Instant::now();

        let outcome = agent
            .run(
                ConversationSeed::new("task"),
                &workspace(&dir),
                Deadline::after(Duration::from_secs(5)),
            )
            .await;

        assert_eq!(outcome.state(), LoopState::Failed);
        assert!(outcome.error().unwrap().is_deadline_exceeded());
        assert!(started.elapsed() < Duration::from_secs(600));
        let turns = outcome.conversation().turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].invocations.len(), 1);
        assert!(turns[0].results.is_empty());
    }

    #[tokio::test]
    async fn results_follow_request_order_and_events_are_emitted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let (sink, mut events) = ChannelEventSink::new(64);
        let agent = agent(
            vec![concat!(
                "<tool_call name=\"read_file\">{\"path\": \"a.txt\"}</tool_call>\n",
                "<tool_call name=\"read_file\">{\"path\": \"../outside.txt\"}</tool_call>\n",
                "<tool_call name=\"write_file\">{\"path\": \"b.txt\", \"content\": \"b\"}</tool_call>",
            )],
            1,
        )
        .with_event_sink(Arc::new(sink));

        let outcome = agent
            .run(ConversationSeed::new("task"), &workspace(&dir), minute())
            .await;

        let turn = &outcome.conversation().turns()[0];
        let ids: Vec<&str> = turn.results.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["call_1_1", "call_1_2", "call_1_3"]);
        assert_eq!(
            turn.results[1].failure_class(),
            Some(FailureClass::PathViolation)
        );

        assert!(matches!(
            events.recv().await.unwrap(),
            EngineEvent::TurnStarted { turn: 1, .. }
        ));
        let mut dispatched = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, EngineEvent::ToolDispatched { .. }) {
                dispatched += 1;
            }
        }
        assert_eq!(dispatched, 3);
    }
}
