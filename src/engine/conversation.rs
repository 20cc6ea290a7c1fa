//! Conversation history for one loop run.
//!
//! A [`Conversation`] is the seed that started the run plus an append-only
//! list of [`ConversationTurn`]s. It is passed explicitly to the transport
//! each turn and rendered into [`Message`]s on demand, so the rendered form
//! is always a pure function of the recorded history.

use crate::messages::{Message, ToolCall};
use crate::protocol::{
    encode_result, encode_warning, generated_call_id, ModelOutput, ParseWarning, ProtocolCodec,
    ProtocolFormat, ToolInvocation, COMPLETION_TAG, COMPLETION_TOOL,
};
use crate::tools::{ToolCatalog, ToolResult};
use std::fmt::Write as _;

const PREAMBLE: &str = "You are an autonomous software agent working inside a sandboxed workspace. \
Accomplish the task with the tools available. Tool calls outside the workspace or with \
disallowed commands are rejected.";

/// What a loop run starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSeed {
    /// The task description
    pub task: String,
    /// Feedback carried over from the previous failed attempt
    pub feedback: Option<AttemptFeedback>,
}

impl ConversationSeed {
    /// Seeds a clean conversation with the task alone.
    #[must_use]
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            feedback: None,
        }
    }

    /// Attaches feedback from a previous attempt.
    #[must_use]
    pub fn with_feedback(mut self, feedback: AttemptFeedback) -> Self {
        self.feedback = Some(feedback);
        self
    }

    /// The opening user message.
    #[must_use]
    pub fn render(&self) -> String {
        let Some(feedback) = &self.feedback else {
            return self.task.clone();
        };

        let mut text = self.task.clone();
        let _ = write!(
            text,
            "\n\nAttempt {} did not pass validation.",
            feedback.attempt
        );
        if feedback.artifacts.is_empty() {
            text.push_str("\nNo files were changed.");
        } else {
            text.push_str("\nFiles changed so far:");
            for artifact in &feedback.artifacts {
                let _ = write!(text, "\n- {artifact}");
            }
        }
        let _ = write!(text, "\nDiagnostic:\n{}", feedback.diagnostic);
        text
    }
}

/// The parts of a failed attempt that feed into the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFeedback {
    /// Index (1-based) of the attempt that failed
    pub attempt: u32,
    /// Files that attempt changed, relative to the workspace root
    pub artifacts: Vec<String>,
    /// Validator or loop diagnostic, verbatim
    pub diagnostic: String,
}

/// One request/decode/dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    /// Turn index, starting at 1
    pub index: u32,
    /// What the model returned
    pub output: ModelOutput,
    /// Invocations decoded from the output, in order
    pub invocations: Vec<ToolInvocation>,
    /// Results, in invocation order
    pub results: Vec<ToolResult>,
    /// Malformed calls skipped during decoding
    pub warnings: Vec<ParseWarning>,
    /// Text outside of tool calls
    pub narrative: String,
    /// Whether the model signalled completion this turn
    pub completion: bool,
}

impl ConversationTurn {
    /// Returns true if every invocation succeeded and nothing was malformed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.results.iter().all(|r| r.success)
    }

    /// Returns true if this turn ended the run as completed.
    #[must_use]
    pub fn accepted_completion(&self) -> bool {
        self.completion && self.is_clean()
    }

    /// Failed results of this turn.
    pub fn failures(&self) -> impl Iterator<Item = &ToolResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// The seed plus every turn taken so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    seed: ConversationSeed,
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    /// Starts a conversation with no turns.
    #[must_use]
    pub fn new(seed: ConversationSeed) -> Self {
        Self {
            seed,
            turns: Vec::new(),
        }
    }

    /// The seed this conversation started from.
    #[must_use]
    pub fn seed(&self) -> &ConversationSeed {
        &self.seed
    }

    /// Turns taken so far, oldest first.
    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The most recent turn.
    #[must_use]
    pub fn last_turn(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// Appends a completed turn.
    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Renders the conversation into transport messages.
    ///
    /// The system message carries the tool-calling instructions for the
    /// format. Tagged-inline results come back as one user message per
    /// turn; structured-call results come back as one tool message per call.
    #[must_use]
    pub fn messages(&self, format: ProtocolFormat, catalog: &ToolCatalog) -> Vec<Message> {
        let codec = ProtocolCodec::new(format);
        let mut messages = vec![
            Message::system(format!(
                "{PREAMBLE}\n\n{}",
                codec.render_instructions(catalog)
            )),
            Message::user(self.seed.render()),
        ];

        for turn in &self.turns {
            match format {
                ProtocolFormat::TaggedInline => render_tagged_turn(turn, &mut messages),
                ProtocolFormat::StructuredCall => render_structured_turn(turn, &mut messages),
            }
        }
        messages
    }
}

fn render_tagged_turn(turn: &ConversationTurn, messages: &mut Vec<Message>) {
    messages.push(Message::assistant(&turn.output.text));

    let mut sections: Vec<String> = turn.results.iter().map(encode_result).collect();
    sections.extend(turn.warnings.iter().map(encode_warning));
    sections.extend(follow_up(turn, COMPLETION_TAG));

    if !sections.is_empty() {
        messages.push(Message::user(sections.join("\n\n")));
    }
}

fn render_structured_turn(turn: &ConversationTurn, messages: &mut Vec<Message>) {
    // Calls without ids were assigned generated ones while decoding; the
    // replayed calls must carry the same ids as their answers.
    let calls: Vec<ToolCall> = turn
        .output
        .tool_calls
        .iter()
        .enumerate()
        .map(|(position, call)| {
            let mut call = call.clone();
            if call.id.trim().is_empty() {
                call.id = generated_call_id(turn.index, position + 1);
            }
            call
        })
        .collect();

    if calls.is_empty() {
        messages.push(Message::assistant(&turn.output.text));
    } else {
        messages.push(Message::assistant_with_tools(
            &turn.output.text,
            calls.clone(),
        ));
    }

    // Decoding keeps call order and yields exactly one invocation or one
    // warning per non-completion call, and results follow invocation order.
    let mut results = turn.results.iter().peekable();
    let mut warnings = turn.warnings.iter().peekable();
    for call in &calls {
        let content = if call.name == COMPLETION_TOOL {
            "Completion signal received.".to_string()
        } else if let Some(result) = results.next_if(|r| r.call_id == call.id) {
            encode_result(result)
        } else if let Some(warning) = warnings.next_if(|w| w.call_id.as_deref() == Some(call.id.as_str())) {
            encode_warning(warning)
        } else {
            "This call was not executed.".to_string()
        };
        messages.push(Message::tool(&call.id, content));
    }

    let notes: Vec<String> = follow_up(turn, COMPLETION_TOOL).into_iter().collect();
    if !notes.is_empty() {
        messages.push(Message::user(notes.join("\n\n")));
    }
}

/// A nudge for turns that made no progress or signalled completion too early.
fn follow_up(turn: &ConversationTurn, signal: &str) -> Option<String> {
    if turn.completion && !turn.is_clean() {
        return Some(format!(
            "Completion was not accepted: {} tool call(s) failed and {} were malformed this turn. \
             Fix the problems, then signal completion again.",
            turn.failures().count(),
            turn.warnings.len()
        ));
    }
    if !turn.completion && turn.results.is_empty() && turn.warnings.is_empty() {
        return Some(format!(
            "No tool calls were found in your reply. Continue the task, or use {signal} when it is finished."
        ));
    }
    None
}
