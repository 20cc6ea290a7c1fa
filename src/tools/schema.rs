//! Argument schemas for tool parameters.
//!
//! Builds the JSON Schema advertised to structured-call transports and
//! checks invocation arguments against a tool's declared parameters.

use crate::tools::definition::{ParamKind, ParamSpec, ToolSpec};
use crate::tools::error::ToolError;
use serde_json::{json, Map, Value};

/// Builds the JSON Schema object describing a tool's parameters.
#[must_use]
pub fn input_schema(params: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in params {
        let mut property = json!({
            "type": param.kind.json_type(),
            "description": param.description,
        });
        if param.kind.is_list() {
            property["items"] = json!({ "type": "string" });
        }
        properties.insert(param.name.clone(), property);
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Checks arguments against the tool's parameters.
///
/// Returns the arguments with explicit `null` values for optional
/// parameters removed.
///
/// # Errors
///
/// Returns a schema violation for an unknown field, a missing required
/// field, or a value of the wrong type.
pub fn validate_arguments(
    spec: &ToolSpec,
    args: &Map<String, Value>,
) -> Result<Map<String, Value>, ToolError> {
    let mut checked = Map::new();

    for (name, value) in args {
        let Some(param) = spec.param(name) else {
            return Err(ToolError::schema_violation(
                &spec.name,
                format!("unknown field '{}'", name),
            ));
        };
        if value.is_null() && !param.required {
            continue;
        }
        if !matches_kind(param.kind, value) {
            return Err(ToolError::schema_violation(
                &spec.name,
                format!(
                    "field '{}' must be a {}, got {}",
                    name,
                    param.kind,
                    describe(value)
                ),
            ));
        }
        checked.insert(name.clone(), value.clone());
    }

    if let Some(missing) = spec
        .params
        .iter()
        .find(|p| p.required && !checked.contains_key(&p.name))
    {
        return Err(ToolError::schema_violation(
            &spec.name,
            format!("missing required field '{}'", missing.name),
        ));
    }

    Ok(checked)
}

fn matches_kind(kind: ParamKind, value: &Value) -> bool {
    match kind {
        ParamKind::String | ParamKind::Path | ParamKind::NewPath | ParamKind::Command => {
            value.is_string()
        }
        ParamKind::Integer => value.is_i64() || value.is_u64(),
        ParamKind::Boolean => value.is_boolean(),
        ParamKind::StringList | ParamKind::Arguments => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_f64() => "a decimal number",
        Value::Number(_) => "an integer",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::definition::{ToolContext, ToolExecutionFuture, ToolExecutorTrait};
    use crate::tools::result::ToolPayload;
    use crate::tools::result::FailureClass;
    use std::sync::Arc;

    #[derive(Debug)]
    struct NoopTool;

    impl ToolExecutorTrait for NoopTool {
        fn execute(&self, _ctx: ToolContext, _args: Map<String, Value>) -> ToolExecutionFuture {
            Box::pin(async { Ok(ToolPayload::Empty) })
        }
    }

    fn spec() -> ToolSpec {
        ToolSpec::new("write_file", "Write a file", Arc::new(NoopTool))
            .with_param(ParamSpec::required("path", ParamKind::NewPath, "Target"))
            .with_param(ParamSpec::required("content", ParamKind::String, "Body"))
            .with_param(ParamSpec::optional("mode", ParamKind::Integer, "Mode"))
            .with_param(ParamSpec::optional("tags", ParamKind::StringList, "Tags"))
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn schema_lists_required_fields() {
        let schema = input_schema(&spec().params);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["path", "content"]));
        assert_eq!(schema["properties"]["mode"]["type"], "integer");
        assert_eq!(schema["properties"]["tags"]["items"]["type"], "string");
    }

    #[test]
    fn accepts_valid_arguments() {
        let checked =
            validate_arguments(&spec(), &args(json!({"path": "a.txt", "content": "hi"}))).unwrap();
        assert_eq!(checked.len(), 2);
    }

    #[test]
    fn drops_null_optionals() {
        let checked = validate_arguments(
            &spec(),
            &args(json!({"path": "a.txt", "content": "hi", "mode": null})),
        )
        .unwrap();
        assert!(!checked.contains_key("mode"));
    }

    #[test]
    fn rejects_missing_required_field() {
        let err = validate_arguments(&spec(), &args(json!({"content": "hi"}))).unwrap_err();
        assert_eq!(err.class(), FailureClass::SchemaViolation);
        assert!(err.to_string().contains("missing required field 'path'"));
    }

    #[test]
    fn rejects_unknown_field() {
        let err = validate_arguments(
            &spec(),
            &args(json!({"path": "a", "content": "b", "owner": "root"})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown field 'owner'"));
    }

    #[test]
    fn rejects_wrong_types() {
        let err =
            validate_arguments(&spec(), &args(json!({"path": 7, "content": "b"}))).unwrap_err();
        assert!(err.to_string().contains("field 'path' must be a path"));

        let err = validate_arguments(
            &spec(),
            &args(json!({"path": "a", "content": "b", "mode": 1.5})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("decimal number"));

        let err = validate_arguments(
            &spec(),
            &args(json!({"path": "a", "content": "b", "tags": ["x", 1]})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("field 'tags'"));
    }

    #[test]
    fn null_required_field_is_a_type_error() {
        let err = validate_arguments(&spec(), &args(json!({"path": null, "content": "b"})))
            .unwrap_err();
        assert!(err.to_string().contains("got null"));
    }
}
