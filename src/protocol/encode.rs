//! Canonical text encoding of tool results and parse warnings.
//!
//! A result is encoded as a header line carrying the call id, tool name and
//! status, followed by the result as JSON with object keys sorted:
//!
//! ```text
//! <tool_result call_id="call_1_1" tool="write_file" status="ok">
//! {"call_id":"call_1_1","payload":{...},"success":true,"tool":"write_file"}
//! </tool_result>
//! ```
//!
//! Encoding is deterministic and [`decode_result`] inverts it exactly.

use crate::protocol::ParseWarning;
use crate::tools::ToolResult;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;

const RESULT_CLOSE: &str = "</tool_result>";

static RESULT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<tool_result call_id="([^"]*)" tool="([^"]*)" status="(ok|error)">$"#)
        .expect("result header pattern is valid")
});

/// Error returned when text is not an encoded tool result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultDecodeError {
    reason: String,
}

impl ResultDecodeError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// What was wrong with the input.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for ResultDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not an encoded tool result: {}", self.reason)
    }
}

impl std::error::Error for ResultDecodeError {}

/// Encodes a tool result as deterministic text for the model.
#[must_use]
pub fn encode_result(result: &ToolResult) -> String {
    let body = serde_json::to_value(result)
        .map(canonical)
        .and_then(|value| serde_json::to_string(&value))
        .unwrap_or_else(|e| format!("{{\"encoding_error\":{:?}}}", e.to_string()));

    format!(
        "<tool_result call_id=\"{}\" tool=\"{}\" status=\"{}\">\n{}\n{}",
        escape_attr(&result.call_id),
        escape_attr(&result.tool),
        if result.success { "ok" } else { "error" },
        body,
        RESULT_CLOSE
    )
}

/// Parses text produced by [`encode_result`].
///
/// # Errors
///
/// Returns `ResultDecodeError` if the header or body is malformed, or if
/// the header disagrees with the body.
pub fn decode_result(encoded: &str) -> Result<ToolResult, ResultDecodeError> {
    let (header, rest) = encoded
        .split_once('\n')
        .ok_or_else(|| ResultDecodeError::new("missing header line"))?;
    let captures = RESULT_HEADER
        .captures(header)
        .ok_or_else(|| ResultDecodeError::new("malformed header"))?;
    let body = rest
        .strip_suffix(RESULT_CLOSE)
        .and_then(|body| body.strip_suffix('\n'))
        .ok_or_else(|| ResultDecodeError::new("missing </tool_result> terminator"))?;

    let result: ToolResult = serde_json::from_str(body)
        .map_err(|e| ResultDecodeError::new(format!("invalid body: {e}")))?;

    let status_ok = &captures[3] == "ok";
    if unescape_attr(&captures[1]) != result.call_id
        || unescape_attr(&captures[2]) != result.tool
        || status_ok != result.success
    {
        return Err(ResultDecodeError::new("header does not match body"));
    }
    Ok(result)
}

/// Encodes a parse warning, including the offending text, for the model.
#[must_use]
pub fn encode_warning(warning: &ParseWarning) -> String {
    let call = warning
        .call_id
        .as_deref()
        .map(|id| format!(" call_id=\"{}\"", escape_attr(id)))
        .unwrap_or_default();
    format!(
        "<parse_warning{}>\n{}\nOffending text:\n{}\n</parse_warning>",
        call, warning, warning.raw
    )
}

/// Rebuilds a JSON value with every object's keys in sorted order.
fn canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonical(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        other => other,
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' => out.push_str("&#10;"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_attr(value: &str) -> String {
    value
        .replace("&#10;", "\n")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}
