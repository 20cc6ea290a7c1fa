//! Sandbox and dispatch properties checked through the public API.

use acton_engine::protocol::{
    decode_result, encode_result, ModelOutput, ProtocolCodec, ProtocolFormat, ToolInvocation,
};
use acton_engine::sandbox::{CommandViolation, Workspace, DEFAULT_DENIED_PATTERNS};
use acton_engine::tools::{FailureClass, ToolPayload, ToolRegistry, ToolResult};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn workspace(dir: &TempDir) -> Workspace {
    Workspace::new(
        dir.path(),
        ["ls", "echo"],
        DEFAULT_DENIED_PATTERNS.iter().copied(),
    )
    .unwrap()
}

fn invocation(tool: &str, args: Value) -> ToolInvocation {
    let Value::Object(args) = args else {
        panic!("arguments must be an object");
    };
    ToolInvocation {
        call_id: "c1".into(),
        tool: tool.into(),
        args,
        provenance: ProtocolFormat::TaggedInline,
        turn: 1,
    }
}

#[test]
fn escaping_paths_are_violations() {
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
    let ws = workspace(&dir);
    let enforcer = ws.enforcer();

    let outside_file = outside.path().join("secret.txt");
    let cases = vec![
        "../etc/passwd".to_string(),
        "a/../../x".to_string(),
        "/etc/passwd".to_string(),
        outside_file.display().to_string(),
        String::new(),
    ];
    for requested in &cases {
        assert!(
            enforcer.authorize_path(requested).is_err(),
            "{requested:?} should be rejected"
        );
        assert!(
            enforcer.authorize_new_path(requested).is_err(),
            "{requested:?} should be rejected for new files"
        );
    }
}

#[cfg(unix)]
#[test]
fn symlinks_out_of_the_root_are_violations() {
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
    std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
    let ws = workspace(&dir);

    assert!(ws.enforcer().authorize_path("link/secret.txt").is_err());
    assert!(ws.enforcer().authorize_new_path("link/new.txt").is_err());
}

#[test]
fn paths_inside_the_root_resolve_canonically() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    let ws = workspace(&dir);

    let resolved = ws.enforcer().authorize_path("src/../src/main.rs").unwrap();
    assert_eq!(
        resolved,
        dir.path().canonicalize().unwrap().join("src/main.rs")
    );
    assert!(ws.enforcer().authorize_new_path("deep/new/file.txt").is_ok());
}

#[test]
fn commands_must_be_allow_listed_and_clean() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir);
    let enforcer = ws.enforcer();

    assert!(enforcer.authorize_command("ls", &["-la".into()]).is_ok());
    assert!(matches!(
        enforcer.authorize_command("rm", &["-rf".into()]),
        Err(CommandViolation::NotAllowed { .. })
    ));
    assert!(matches!(
        enforcer.authorize_command("/bin/ls", &[]),
        Err(CommandViolation::NotAllowed { .. })
    ));
    assert!(matches!(
        enforcer.authorize_command("echo", &["hi; rm -rf /".into()]),
        Err(CommandViolation::DeniedArgument { .. })
    ));
}

#[tokio::test]
async fn violations_never_reach_the_tool() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir);
    let registry = ToolRegistry::with_builtins();

    let result = registry
        .dispatch(
            &invocation(
                "write_file",
                json!({"path": "../escaped.txt", "content": "x"}),
            ),
            &ws,
            Duration::from_secs(5),
        )
        .await;
    assert_eq!(result.failure_class(), Some(FailureClass::PathViolation));
    assert!(!dir.path().join("../escaped.txt").exists());

    let result = registry
        .dispatch(
            &invocation("run_command", json!({"command": "touch", "args": ["x"]})),
            &ws,
            Duration::from_secs(5),
        )
        .await;
    assert_eq!(result.failure_class(), Some(FailureClass::CommandViolation));
    assert!(!dir.path().join("x").exists());
}

#[tokio::test]
async fn schema_problems_are_schema_violations() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir);
    let registry = ToolRegistry::with_builtins();

    for (tool, args) in [
        ("no_such_tool", json!({})),
        ("read_file", json!({})),
        ("read_file", json!({"path": 7})),
        ("read_file", json!({"path": "a", "colour": "red"})),
    ] {
        let result = registry
            .dispatch(&invocation(tool, args), &ws, Duration::from_secs(5))
            .await;
        assert_eq!(
            result.failure_class(),
            Some(FailureClass::SchemaViolation),
            "{tool}"
        );
    }
}

#[cfg(unix)]
#[tokio::test]
async fn timed_out_command_is_killed() {
    let dir = TempDir::new().unwrap();
    let ws = Workspace::new(dir.path(), ["sh"], Vec::<String>::new()).unwrap();
    let registry = ToolRegistry::with_builtins();

    let result = registry
        .dispatch(
            &invocation(
                "run_command",
                json!({"command": "sh", "args": ["-c", "sleep 1 && touch late.txt"]}),
            ),
            &ws,
            Duration::from_millis(200),
        )
        .await;
    assert_eq!(result.failure_class(), Some(FailureClass::TimedOut));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!dir.path().join("late.txt").exists());
}

#[test]
fn one_malformed_block_among_many() {
    let text = concat!(
        "Plan first.\n",
        "<tool_call name=\"read_file\">{\"path\": \"a\"}</tool_call>\n",
        "between\n",
        "<tool_call name=\"read_file\">not json</tool_call>\n",
        "<tool_call>write_file(path=\"b\", content=\"hi\")</tool_call>\n",
        "<tool_call name=\"list_directory\"></tool_call>\n",
    );

    let decoded =
        ProtocolCodec::new(ProtocolFormat::TaggedInline).decode(&ModelOutput::text(text), 2);

    assert_eq!(decoded.invocations.len(), 3);
    assert_eq!(decoded.warnings.len(), 1);
    assert_eq!(
        decoded.warnings[0].raw,
        "<tool_call name=\"read_file\">not json</tool_call>"
    );
    let tools: Vec<&str> = decoded.invocations.iter().map(|i| i.tool.as_str()).collect();
    assert_eq!(tools, vec!["read_file", "write_file", "list_directory"]);
    assert_eq!(decoded.invocations[1].args["content"], "hi");
    assert!(decoded.narrative.contains("Plan first."));
    assert!(decoded.narrative.contains("between"));
    assert!(!decoded.completion);
}

#[test]
fn result_encoding_round_trips() {
    let results = vec![
        ToolResult::success(
            "call_3_1",
            "write_file",
            ToolPayload::ChangedFiles {
                paths: vec![PathBuf::from("/ws/a.txt")],
                summary: "wrote 1 bytes to a.txt".into(),
            },
        ),
        ToolResult::success(
            "call_3_2",
            "read_file",
            ToolPayload::Json {
                value: json!({"content": "     1\tfn main() {}\n", "total_lines": 1}),
            },
        ),
        ToolResult::failure(
            "call_3_3",
            "run_command",
            FailureClass::TimedOut,
            "run_command timed out after 30 s",
        ),
        ToolResult::success("call_3_4", "noop", ToolPayload::Text { text: "ok".into() }),
    ];

    for result in results {
        let encoded = encode_result(&result);
        assert_eq!(encoded, encode_result(&result.clone()));
        assert_eq!(decode_result(&encoded).unwrap(), result);
    }
}
