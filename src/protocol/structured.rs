//! Structured-call wire format.
//!
//! Tool calls arrive as discrete [`ToolCall`] records next to the model's
//! text. Completion is a call to the reserved [`COMPLETION_TOOL`].

use crate::messages::{ToolCall, ToolDefinition};
use crate::protocol::{
    generated_call_id, DecodedOutput, ModelOutput, ParseWarning, ProtocolFormat, ToolInvocation,
    COMPLETION_TOOL,
};
use serde_json::{json, Map, Value};

/// Decodes the structured calls of one model output produced in `turn`.
pub(super) fn decode(output: &ModelOutput, turn: u32) -> DecodedOutput {
    let mut decoded = DecodedOutput {
        narrative: output.text.trim().to_string(),
        ..DecodedOutput::default()
    };

    for (position, call) in output.tool_calls.iter().enumerate() {
        if call.name == COMPLETION_TOOL {
            decoded.completion = true;
            continue;
        }

        let call_id = if call.id.trim().is_empty() {
            generated_call_id(turn, position + 1)
        } else {
            call.id.clone()
        };

        if call.name.trim().is_empty() {
            decoded.warnings.push(warning(call, call_id, "tool call has no name"));
            continue;
        }

        match arguments(&call.arguments) {
            Ok(args) => decoded.invocations.push(ToolInvocation {
                call_id,
                tool: call.name.clone(),
                args,
                provenance: ProtocolFormat::StructuredCall,
                turn,
            }),
            Err(reason) => decoded.warnings.push(warning(call, call_id, reason)),
        }
    }

    decoded
}

/// Normalizes call arguments into an object.
///
/// Some providers deliver arguments as a JSON-encoded string.
fn arguments(value: &Value) -> Result<Map<String, Value>, String> {
    match value {
        Value::Object(args) => Ok(args.clone()),
        Value::Null => Ok(Map::new()),
        Value::String(encoded) if encoded.trim().is_empty() => Ok(Map::new()),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(args)) => Ok(args),
            Ok(_) => Err("tool call arguments must be a JSON object".to_string()),
            Err(e) => Err(format!("tool call arguments are not valid JSON: {e}")),
        },
        _ => Err("tool call arguments must be a JSON object".to_string()),
    }
}

fn warning(call: &ToolCall, call_id: String, reason: impl Into<String>) -> ParseWarning {
    let raw = serde_json::to_string(call).unwrap_or_else(|_| call.name.clone());
    ParseWarning {
        call_id: Some(call_id),
        ..ParseWarning::new(raw, reason)
    }
}

/// Definition of the reserved completion tool.
pub(super) fn completion_definition() -> ToolDefinition {
    ToolDefinition {
        name: COMPLETION_TOOL.to_string(),
        description: "Signal that the task is finished. Call it only after every other tool call has succeeded.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {},
            "required": [],
            "additionalProperties": false,
        }),
    }
}

/// System prompt instructions for the structured-call format.
pub(super) fn render_instructions() -> String {
    format!(
        "Use the provided tools to complete the task. Paths are relative to the workspace root. \
         When the task is finished and every tool call has succeeded, call the {COMPLETION_TOOL} tool."
    )
}
