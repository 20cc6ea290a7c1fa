//! Protocol codec between model output and tool invocations.
//!
//! Two wire formats are supported, chosen once per loop run:
//!
//! - **Tagged inline**: tool calls are embedded in the model's free text as
//!   `<tool_call name="...">{json}</tool_call>` blocks, and completion is
//!   signalled with `<task_complete/>`.
//! - **Structured call**: the transport returns tool calls as discrete
//!   records; completion is a call to the reserved `task_complete` tool.
//!
//! Both decode into the same [`DecodedOutput`]. Malformed calls never abort
//! decoding; they become [`ParseWarning`]s fed back to the model.
//!
//! ```rust
//! use acton_engine::protocol::{ModelOutput, ProtocolCodec, ProtocolFormat};
//!
//! let codec = ProtocolCodec::new(ProtocolFormat::TaggedInline);
//! let output = ModelOutput::text(
//!     "Writing it now.\n<tool_call name=\"write_file\">{\"path\": \"out.txt\", \"content\": \"hi\"}</tool_call>\n<task_complete/>",
//! );
//! let decoded = codec.decode(&output, 1);
//! assert_eq!(decoded.invocations.len(), 1);
//! assert!(decoded.completion);
//! assert_eq!(decoded.narrative, "Writing it now.");
//! ```

mod encode;
mod structured;
mod tagged;

pub use encode::{decode_result, encode_result, encode_warning, ResultDecodeError};

use crate::messages::{ToolCall, ToolDefinition};
use crate::tools::ToolCatalog;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Reserved tool name used as the completion signal.
pub const COMPLETION_TOOL: &str = "task_complete";

/// The completion marker in tagged-inline output.
pub const COMPLETION_TAG: &str = "<task_complete/>";

/// How tool calls travel between the model and the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolFormat {
    /// Calls embedded as tagged blocks in free text
    #[default]
    TaggedInline,
    /// Calls returned as discrete structured records
    StructuredCall,
}

impl fmt::Display for ProtocolFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaggedInline => write!(f, "tagged-inline"),
            Self::StructuredCall => write!(f, "structured-call"),
        }
    }
}

impl FromStr for ProtocolFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tagged-inline" | "tagged" => Ok(Self::TaggedInline),
            "structured-call" | "structured" => Ok(Self::StructuredCall),
            other => Err(format!(
                "unknown protocol '{other}'; expected 'tagged-inline' or 'structured-call'"
            )),
        }
    }
}

/// Raw output of one model completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOutput {
    /// Free text produced by the model
    #[serde(default)]
    pub text: String,
    /// Structured tool calls, when the transport supports them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ModelOutput {
    /// Creates output consisting only of text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Creates output with structured tool calls.
    #[must_use]
    pub fn with_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
        }
    }
}

/// A decoded request to run a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Identifier echoed back in the result
    pub call_id: String,
    /// Requested tool name
    pub tool: String,
    /// Arguments by parameter name
    pub args: Map<String, Value>,
    /// Which wire format produced this invocation
    pub provenance: ProtocolFormat,
    /// Turn index (1-based) the invocation was decoded in
    pub turn: u32,
}

/// A malformed tool call that was skipped during decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// Call id, when the format supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// The offending text, verbatim
    pub raw: String,
    /// Why it could not be decoded
    pub reason: String,
}

impl ParseWarning {
    pub(crate) fn new(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            call_id: None,
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed tool call skipped: {}", self.reason)
    }
}

/// Everything decoded from one model output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedOutput {
    /// Well-formed invocations, in the order they appeared
    pub invocations: Vec<ToolInvocation>,
    /// Text outside of tool call blocks
    pub narrative: String,
    /// Malformed calls that were skipped
    pub warnings: Vec<ParseWarning>,
    /// Whether the model signalled completion
    pub completion: bool,
}

/// Call id assigned to the `index`-th (1-based) call of a turn when the
/// format does not supply one.
#[must_use]
pub fn generated_call_id(turn: u32, index: usize) -> String {
    format!("call_{turn}_{index}")
}

/// The wire format codec used for one loop run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolCodec {
    /// Tagged blocks inside free text
    TaggedInline,
    /// Structured tool call records
    StructuredCall,
}

impl ProtocolCodec {
    /// Selects the codec for a format.
    #[must_use]
    pub fn new(format: ProtocolFormat) -> Self {
        match format {
            ProtocolFormat::TaggedInline => Self::TaggedInline,
            ProtocolFormat::StructuredCall => Self::StructuredCall,
        }
    }

    /// The format this codec speaks.
    #[must_use]
    pub fn format(self) -> ProtocolFormat {
        match self {
            Self::TaggedInline => ProtocolFormat::TaggedInline,
            Self::StructuredCall => ProtocolFormat::StructuredCall,
        }
    }

    /// Decodes one model output produced in the given turn.
    #[must_use]
    pub fn decode(self, output: &ModelOutput, turn: u32) -> DecodedOutput {
        match self {
            Self::TaggedInline => tagged::decode(&output.text, turn),
            Self::StructuredCall => structured::decode(output, turn),
        }
    }

    /// Instructions for the system prompt describing how to call tools.
    #[must_use]
    pub fn render_instructions(self, catalog: &ToolCatalog) -> String {
        match self {
            Self::TaggedInline => tagged::render_instructions(catalog),
            Self::StructuredCall => structured::render_instructions(),
        }
    }

    /// Tool definitions a structured-call transport should advertise.
    ///
    /// Includes the reserved completion tool. Tagged-inline transports
    /// advertise nothing; the instructions carry the catalog instead.
    #[must_use]
    pub fn tool_definitions(self, catalog: &ToolCatalog) -> Vec<ToolDefinition> {
        match self {
            Self::TaggedInline => Vec::new(),
            Self::StructuredCall => {
                let mut definitions = catalog.definitions();
                definitions.push(structured::completion_definition());
                definitions
            }
        }
    }
}
