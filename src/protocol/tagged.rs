//! Tagged-inline wire format.
//!
//! ```text
//! narrative text
//! <tool_call name="write_file">
//! {"path": "out.txt", "content": "hi"}
//! </tool_call>
//! <task_complete/>
//! ```
//!
//! A block without a `name` attribute may instead carry a call expression,
//! `write_file(path="out.txt", content="hi")`, or a JSON object of the form
//! `{"name": "...", "arguments": {...}}`.

use crate::protocol::{
    generated_call_id, DecodedOutput, ParseWarning, ProtocolFormat, ToolInvocation,
    COMPLETION_TAG, COMPLETION_TOOL,
};
use crate::tools::ToolCatalog;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::fmt::Write as _;
use std::iter::Peekable;
use std::str::CharIndices;
use std::sync::LazyLock;

const CLOSE_TAG: &str = "</tool_call>";

static OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<tool_call\b([^>]*)>").expect("open tag pattern is valid"));

static NAME_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:name\s*=\s*"([^"]*)")?\s*/?\s*$"#).expect("name pattern is valid")
});

static COMPLETION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<task_complete\s*/>|<task_complete>\s*</task_complete>")
        .expect("completion pattern is valid")
});

static TOOL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("tool name pattern is valid")
});

/// What one well-formed block asked for.
enum Block {
    Call { name: String, args: Map<String, Value> },
    Complete,
}

/// Decodes tagged-inline text produced in `turn`.
pub(super) fn decode(text: &str, turn: u32) -> DecodedOutput {
    let mut decoded = DecodedOutput::default();
    let mut segments: Vec<&str> = Vec::new();
    let mut cursor = 0;

    while let Some(open) = OPEN_TAG.captures_at(text, cursor) {
        let Some(whole) = open.get(0) else { break };
        segments.push(&text[cursor..whole.start()]);

        let next_open = OPEN_TAG
            .find_at(text, whole.end())
            .map(|m| m.start())
            .unwrap_or(text.len());
        let close = text[whole.end()..next_open]
            .find(CLOSE_TAG)
            .map(|offset| whole.end() + offset);

        // Self-closing blocks carry no body.
        let self_closing = whole.as_str().ends_with("/>");

        let (body, end) = match (self_closing, close) {
            (true, _) => ("", whole.end()),
            (false, Some(close)) => (&text[whole.end()..close], close + CLOSE_TAG.len()),
            (false, None) => {
                decoded.warnings.push(ParseWarning::new(
                    text[whole.start()..next_open].trim_end(),
                    "unterminated <tool_call> block; close it with </tool_call>",
                ));
                cursor = next_open;
                continue;
            }
        };
        let raw = &text[whole.start()..end];
        let attrs = open.get(1).map_or("", |m| m.as_str());

        match parse_block(attrs, body) {
            Ok(Block::Complete) => decoded.completion = true,
            Ok(Block::Call { name, args }) => {
                let index = decoded.invocations.len() + 1;
                decoded.invocations.push(ToolInvocation {
                    call_id: generated_call_id(turn, index),
                    tool: name,
                    args,
                    provenance: ProtocolFormat::TaggedInline,
                    turn,
                });
            }
            Err(reason) => decoded.warnings.push(ParseWarning::new(raw, reason)),
        }
        cursor = end;
    }
    segments.push(&text[cursor..]);

    let mut narrative = Vec::new();
    for segment in segments {
        if COMPLETION.is_match(segment) {
            decoded.completion = true;
        }
        let cleaned = COMPLETION.replace_all(segment, "");
        let cleaned = cleaned.trim();
        if !cleaned.is_empty() {
            narrative.push(cleaned.to_string());
        }
    }
    decoded.narrative = narrative.join("\n");
    decoded
}

fn parse_block(attrs: &str, body: &str) -> Result<Block, String> {
    let Some(captures) = NAME_ATTR.captures(attrs) else {
        return Err(format!(
            "unsupported attributes '{}'; only name=\"...\" is allowed",
            attrs.trim()
        ));
    };
    let body = body.trim();

    let (name, args) = match captures.get(1) {
        Some(name) => (name.as_str().to_string(), parse_json_args(body)?),
        None if body.starts_with('{') => parse_json_envelope(body)?,
        None if body.is_empty() => {
            return Err("missing tool name; use <tool_call name=\"...\">".to_string())
        }
        None => CallParser::new(body).parse()?,
    };

    if name == COMPLETION_TOOL {
        return Ok(Block::Complete);
    }
    if !TOOL_NAME.is_match(&name) {
        return Err(format!("invalid tool name '{name}'"));
    }
    Ok(Block::Call { name, args })
}

fn parse_json_args(body: &str) -> Result<Map<String, Value>, String> {
    if body.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(args)) => Ok(args),
        Ok(_) => Err("tool_call body must be a JSON object of arguments".to_string()),
        Err(e) => Err(format!("tool_call body is not valid JSON: {e}")),
    }
}

fn parse_json_envelope(body: &str) -> Result<(String, Map<String, Value>), String> {
    let Value::Object(mut envelope) = serde_json::from_str::<Value>(body)
        .map_err(|e| format!("tool_call body is not valid JSON: {e}"))?
    else {
        return Err("tool_call body must be a JSON object".to_string());
    };
    let Some(Value::String(name)) = envelope.remove("name") else {
        return Err("missing tool name; use <tool_call name=\"...\">".to_string());
    };
    let args = match envelope.remove("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(args)) => args,
        Some(_) => return Err("\"arguments\" must be a JSON object".to_string()),
    };
    Ok((name, args))
}

/// Parser for `name(key=literal, ...)` call expressions.
struct CallParser<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> CallParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn parse(mut self) -> Result<(String, Map<String, Value>), String> {
        let name = self.ident()?;
        self.expect('(')?;

        let mut args = Map::new();
        loop {
            self.skip_ws();
            if self.eat(')') {
                break;
            }
            let key = self.ident()?;
            self.expect('=')?;
            let value = self.literal()?;
            if args.insert(key.clone(), value).is_some() {
                return Err(format!("argument '{key}' given twice"));
            }
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            self.expect(')')?;
            break;
        }

        self.skip_ws();
        if let Some((pos, _)) = self.chars.peek() {
            return Err(format!(
                "unexpected text after call expression: '{}'",
                &self.src[*pos..]
            ));
        }
        Ok((name, args))
    }

    fn skip_ws(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        self.skip_ws();
        if self.eat(expected) {
            Ok(())
        } else {
            Err(format!("expected '{expected}' in call expression"))
        }
    }

    fn ident(&mut self) -> Result<String, String> {
        self.skip_ws();
        let mut ident = String::new();
        while let Some((_, c)) = self
            .chars
            .next_if(|(_, c)| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            ident.push(c);
        }
        if ident.is_empty() {
            Err("expected an identifier in call expression".to_string())
        } else {
            Ok(ident)
        }
    }

    fn literal(&mut self) -> Result<Value, String> {
        self.skip_ws();
        match self.chars.peek().map(|(_, c)| *c) {
            Some(quote @ ('"' | '\'')) => {
                self.chars.next();
                self.string(quote).map(Value::String)
            }
            Some('[') => {
                self.chars.next();
                self.list()
            }
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(_) => match self.ident()?.as_str() {
                "true" | "True" => Ok(Value::Bool(true)),
                "false" | "False" => Ok(Value::Bool(false)),
                "null" | "None" => Ok(Value::Null),
                other => Err(format!("unsupported literal '{other}'")),
            },
            None => Err("expected a value in call expression".to_string()),
        }
    }

    fn string(&mut self, quote: char) -> Result<String, String> {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                c if c == quote => return Ok(out),
                '\\' => match self.chars.next().map(|(_, c)| c) {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(other) => out.push(other),
                    None => break,
                },
                c => out.push(c),
            }
        }
        Err("unterminated string literal".to_string())
    }

    fn list(&mut self) -> Result<Value, String> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(']') {
                return Ok(Value::Array(items));
            }
            items.push(self.literal()?);
            self.skip_ws();
            if !self.eat(',') {
                self.expect(']')?;
                return Ok(Value::Array(items));
            }
        }
    }

    fn number(&mut self) -> Result<Value, String> {
        let mut text = String::new();
        while let Some((_, c)) = self
            .chars
            .next_if(|(_, c)| c.is_ascii_digit() || matches!(c, '-' | '.'))
        {
            text.push(c);
        }
        if let Ok(int) = text.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("invalid number '{text}'"))
    }
}

/// System prompt instructions for the tagged-inline format.
pub(super) fn render_instructions(catalog: &ToolCatalog) -> String {
    let mut out = String::from(
        "You can use tools by writing a block like this anywhere in your reply:\n\n\
         <tool_call name=\"TOOL_NAME\">\n{\"argument\": \"value\"}\n</tool_call>\n\n\
         The body must be a JSON object of arguments. You may write several blocks; \
         they run in order and their results are returned in the next message. \
         Paths are relative to the workspace root.\n",
    );
    let _ = writeln!(
        out,
        "When the task is finished and every tool call has succeeded, write {COMPLETION_TAG}."
    );

    if catalog.is_empty() {
        return out;
    }
    out.push_str("\nAvailable tools:\n");
    for entry in catalog.entries() {
        let _ = writeln!(out, "\n- {}: {}", entry.name, entry.description);
        for param in &entry.params {
            let _ = writeln!(
                out,
                "    {} ({}, {}): {}",
                param.name,
                param.kind,
                if param.required { "required" } else { "optional" },
                param.description
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn decodes_named_json_block() {
        let text = "I'll write the file.\n<tool_call name=\"write_file\">\n{\"path\": \"out.txt\", \"content\": \"hi\"}\n</tool_call>";
        let decoded = decode(text, 1);

        assert!(decoded.warnings.is_empty());
        assert!(!decoded.completion);
        assert_eq!(decoded.narrative, "I'll write the file.");
        assert_eq!(decoded.invocations.len(), 1);

        let call = &decoded.invocations[0];
        assert_eq!(call.tool, "write_file");
        assert_eq!(call.call_id, "call_1_1");
        assert_eq!(call.turn, 1);
        assert_eq!(call.provenance, ProtocolFormat::TaggedInline);
        assert_eq!(call.args, args(json!({"path": "out.txt", "content": "hi"})));
    }

    #[test]
    fn decodes_multiple_blocks_in_order_with_narrative() {
        let text = "first\n<tool_call name=\"a\">{}</tool_call>\nbetween\n<tool_call name=\"b\"></tool_call>\nlast";
        let decoded = decode(text, 3);

        let tools: Vec<&str> = decoded.invocations.iter().map(|i| i.tool.as_str()).collect();
        assert_eq!(tools, vec!["a", "b"]);
        assert_eq!(decoded.invocations[1].call_id, "call_3_2");
        assert!(decoded.invocations[1].args.is_empty());
        assert_eq!(decoded.narrative, "first\nbetween\nlast");
    }

    #[test]
    fn completion_tag_is_detected_and_removed() {
        let decoded = decode("All done.\n<task_complete/>", 2);
        assert!(decoded.completion);
        assert_eq!(decoded.narrative, "All done.");

        assert!(decode("<task_complete />", 1).completion);
        assert!(decode("<task_complete></task_complete>", 1).completion);
        assert!(decode("<tool_call name=\"task_complete\"/>", 1).completion);
        assert!(!decode("the task_complete tag", 1).completion);
    }

    #[test]
    fn completion_inside_block_body_is_not_a_signal() {
        let text = "<tool_call name=\"write_file\">{\"path\": \"a\", \"content\": \"<task_complete/>\"}</tool_call>";
        let decoded = decode(text, 1);
        assert!(!decoded.completion);
        assert_eq!(decoded.invocations[0].args["content"], "<task_complete/>");
    }

    #[test]
    fn one_malformed_block_among_many() {
        let text = "<tool_call name=\"a\">{}</tool_call>\n\
                    <tool_call name=\"b\">{not json}</tool_call>\n\
                    <tool_call name=\"c\">{\"x\": 1}</tool_call>";
        let decoded = decode(text, 1);

        assert_eq!(decoded.invocations.len(), 2);
        assert_eq!(decoded.warnings.len(), 1);
        assert_eq!(
            decoded.warnings[0].raw,
            "<tool_call name=\"b\">{not json}</tool_call>"
        );
        assert!(decoded.warnings[0].reason.contains("not valid JSON"));
    }

    #[test]
    fn unterminated_block_is_skipped_up_to_next_block() {
        let text = "<tool_call name=\"a\">{\"x\": 1}\n<tool_call name=\"b\">{}</tool_call>";
        let decoded = decode(text, 1);

        assert_eq!(decoded.invocations.len(), 1);
        assert_eq!(decoded.invocations[0].tool, "b");
        assert_eq!(decoded.warnings.len(), 1);
        assert_eq!(decoded.warnings[0].raw, "<tool_call name=\"a\">{\"x\": 1}");
        assert!(decoded.warnings[0].reason.contains("unterminated"));
    }

    #[test]
    fn trailing_unterminated_block() {
        let decoded = decode("text <tool_call name=\"a\">{", 1);
        assert!(decoded.invocations.is_empty());
        assert_eq!(decoded.warnings.len(), 1);
        assert_eq!(decoded.narrative, "text");
    }

    #[test]
    fn non_object_body_is_rejected() {
        let decoded = decode("<tool_call name=\"a\">[1, 2]</tool_call>", 1);
        assert_eq!(decoded.warnings.len(), 1);
        assert!(decoded.warnings[0].reason.contains("JSON object"));
    }

    #[test]
    fn bad_attributes_are_rejected() {
        let decoded = decode("<tool_call tool=write_file>{}</tool_call>", 1);
        assert_eq!(decoded.warnings.len(), 1);
        assert!(decoded.warnings[0].reason.contains("unsupported attributes"));

        let decoded = decode("<tool_call name=\"../x\">{}</tool_call>", 1);
        assert!(decoded.warnings[0].reason.contains("invalid tool name"));
    }

    #[test]
    fn decodes_call_expression() {
        let text = r#"<tool_call>run_command(command="cargo", args=["test", "--quiet"], verbose=true, retries=-2)</tool_call>"#;
        let decoded = decode(text, 1);

        assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
        let call = &decoded.invocations[0];
        assert_eq!(call.tool, "run_command");
        assert_eq!(
            call.args,
            args(json!({
                "command": "cargo",
                "args": ["test", "--quiet"],
                "verbose": true,
                "retries": -2
            }))
        );
    }

    #[test]
    fn call_expression_escapes_and_empty_args() {
        let decoded = decode(r#"<tool_call>write_file(path='a.txt', content="line\n\"q\"",)</tool_call>"#, 1);
        assert_eq!(decoded.invocations[0].args["content"], "line\n\"q\"");

        let decoded = decode("<tool_call>list_tools()</tool_call>", 1);
        assert!(decoded.invocations[0].args.is_empty());
    }

    #[test]
    fn malformed_call_expressions() {
        for body in [
            "write_file(path=\"a\"",
            "write_file(path=\"a\", path=\"b\")",
            "write_file(path=unquoted)",
            "write_file(path=\"a\") trailing",
            "(path=\"a\")",
        ] {
            let decoded = decode(&format!("<tool_call>{body}</tool_call>"), 1);
            assert_eq!(decoded.warnings.len(), 1, "{body}");
            assert!(decoded.invocations.is_empty(), "{body}");
        }
    }

    #[test]
    fn decodes_json_envelope() {
        let text = r#"<tool_call>{"name": "read_file", "arguments": {"path": "a"}}</tool_call>"#;
        let decoded = decode(text, 1);
        assert_eq!(decoded.invocations[0].tool, "read_file");
        assert_eq!(decoded.invocations[0].args["path"], "a");
    }

    #[test]
    fn missing_name_is_a_warning() {
        let decoded = decode("<tool_call></tool_call>", 1);
        assert!(decoded.warnings[0].reason.contains("missing tool name"));
    }

    #[test]
    fn instructions_list_tools() {
        let catalog = crate::tools::ToolRegistry::with_builtins().catalog();
        let text = render_instructions(&catalog);
        assert!(text.contains("<tool_call name=\"TOOL_NAME\">"));
        assert!(text.contains(COMPLETION_TAG));
        assert!(text.contains("- write_file:"));
        assert!(text.contains("path (path, required)"));
    }
}
