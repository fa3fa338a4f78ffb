use super::*;
use serde_json::json;

// Helper to build the common fields every hook input needs.
fn common_fields() -> serde_json::Value {
    json!({
        "session_id": "sess-1",
        "transcript_path": "/tmp/transcript.jsonl",
        "cwd": "/home/user/project",
        "permission_mode": "default"
    })
}

fn merge(base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    let mut map = base.as_object().unwrap().clone();
    map.extend(extra.as_object().unwrap().clone());
    serde_json::Value::Object(map)
}

fn parse(extra: serde_json::Value) -> HookInput {
    serde_json::from_value(merge(common_fields(), extra)).unwrap()
}

// =================================================================
// Input deserialization
// =================================================================

#[test]
fn deserialize_session_start_sources() {
    for (raw, expected) in [
        ("startup", SessionStartSource::Startup),
        ("resume", SessionStartSource::Resume),
        ("clear", SessionStartSource::Clear),
        ("compact", SessionStartSource::Compact),
        ("teleport", SessionStartSource::Other),
    ] {
        let hook = parse(json!({"hook_event_name": "SessionStart", "source": raw}));
        let HookInput::SessionStart(e) = hook else {
            panic!("wrong variant");
        };
        assert_eq!(e.source, Some(expected));
        assert_eq!(e.after_compaction(), expected == SessionStartSource::Compact);
    }
}

#[test]
fn common_fields_are_optional() {
    let hook: HookInput =
        serde_json::from_value(json!({"hook_event_name": "PreCompact"})).unwrap();
    assert_eq!(hook.common().session_id, "");
    assert_eq!(hook.common().cwd, "");
    assert_eq!(hook.event_name(), "PreCompact");
}

#[test]
fn unknown_event_is_an_error() {
    let result: Result<HookInput, _> =
        serde_json::from_value(merge(common_fields(), json!({"hook_event_name": "Notification"})));
    assert!(result.is_err());
    let result: Result<HookInput, _> = serde_json::from_value(common_fields());
    assert!(result.is_err());
}

#[test]
fn prompt_falls_back_to_tool_input() {
    let hook = parse(json!({"hook_event_name": "UserPromptSubmit", "prompt": "Explain the cache"}));
    let HookInput::UserPromptSubmit(e) = hook else {
        panic!("wrong variant");
    };
    assert_eq!(e.prompt(), "Explain the cache");

    let hook = parse(json!({
        "hook_event_name": "UserPromptSubmit",
        "tool_input": {"prompt": "legacy shape"}
    }));
    let HookInput::UserPromptSubmit(e) = hook else {
        panic!("wrong variant");
    };
    assert_eq!(e.prompt(), "legacy shape");
}

#[test]
fn post_tool_use_response_text() {
    let hook = parse(json!({
        "hook_event_name": "PostToolUse",
        "tool_name": "Bash",
        "tool_input": {"command": "cargo test"},
        "tool_response": {"stdout": "ok", "exitCode": 0}
    }));
    let HookInput::PostToolUse(e) = hook else {
        panic!("wrong variant");
    };
    assert_eq!(e.command(), Some("cargo test"));
    assert_eq!(e.file_path(), None);
    let text = e.response_text();
    assert!(text.contains("\"stdout\":\"ok\""), "got {text}");
}

#[test]
fn post_tool_use_accepts_tool_result_alias() {
    let hook = parse(json!({
        "hook_event_name": "PostToolUse",
        "tool_name": "Read",
        "tool_input": {"file_path": "/src/lib.rs"},
        "tool_result": "fn main() {}"
    }));
    let HookInput::PostToolUse(e) = hook else {
        panic!("wrong variant");
    };
    assert_eq!(e.response_text(), "fn main() {}");
    assert_eq!(e.file_path(), Some("/src/lib.rs"));

    let hook = parse(json!({"hook_event_name": "PostToolUse", "tool_name": "Glob"}));
    let HookInput::PostToolUse(e) = hook else {
        panic!("wrong variant");
    };
    assert_eq!(e.response_text(), "");
}

#[test]
fn pre_tool_use_file_path() {
    let hook = parse(json!({
        "hook_event_name": "PreToolUse",
        "tool_name": "Edit",
        "tool_input": {"file_path": "/f", "old_string": "x", "new_string": "y"},
        "tool_use_id": "toolu_1"
    }));
    let HookInput::PreToolUse(e) = hook else {
        panic!("wrong variant");
    };
    assert_eq!(e.tool_name, "Edit");
    assert_eq!(e.file_path(), Some("/f"));
}

#[test]
fn stop_reason_sources() {
    let stop = |extra: serde_json::Value| -> StopInput {
        let mut fields = json!({"hook_event_name": "Stop", "stop_hook_active": false});
        fields.as_object_mut().unwrap().extend(extra.as_object().unwrap().clone());
        match parse(fields) {
            HookInput::Stop(e) => e,
            other => panic!("Expected Stop, got {other:?}"),
        }
    };

    let e = stop(json!({}));
    assert_eq!(e.stop_reason(), "");
    assert!(e.is_normal_stop());

    let e = stop(json!({"stop_reason": "end_turn"}));
    assert!(e.is_normal_stop());

    let e = stop(json!({"stopReason": "max_tokens"}));
    assert_eq!(e.stop_reason(), "max_tokens");
    assert!(!e.is_normal_stop());

    let e = stop(json!({"tool_input": {"reason": "stop_sequence"}}));
    assert_eq!(e.stop_reason(), "stop_sequence");
    assert!(e.is_normal_stop());

    let e = stop(json!({"tool_input": {"stopReason": "interrupted", "reason": "end_turn"}}));
    assert_eq!(e.stop_reason(), "interrupted");
}

#[test]
fn subagent_fields_fall_back_to_tool_input() {
    let hook = parse(json!({
        "hook_event_name": "SubagentStop",
        "agent_type": "fic-researcher",
        "output": "Confidence: 80%"
    }));
    let HookInput::SubagentStop(e) = hook else {
        panic!("wrong variant");
    };
    assert_eq!(e.agent_type(), "fic-researcher");
    assert_eq!(e.output(), "Confidence: 80%");
    assert_eq!(e.description(), "");

    let hook = parse(json!({
        "hook_event_name": "SubagentStop",
        "tool_input": {
            "subagent_type": "Explore",
            "description": "map the auth flow",
            "output": "findings"
        }
    }));
    let HookInput::SubagentStop(e) = hook else {
        panic!("wrong variant");
    };
    assert_eq!(e.agent_type(), "Explore");
    assert_eq!(e.description(), "map the auth flow");
    assert_eq!(e.output(), "findings");

    let hook = parse(json!({"hook_event_name": "SubagentStop", "subagent_type": "fic-plan-validator"}));
    let HookInput::SubagentStop(e) = hook else {
        panic!("wrong variant");
    };
    assert_eq!(e.agent_type(), "fic-plan-validator");
}

// =================================================================
// Output serialization
// =================================================================

#[test]
fn empty_output_is_empty_object() {
    assert_eq!(serde_json::to_string(&HookOutput::default()).unwrap(), "{}");
}

#[test]
fn serialize_message_output() {
    let v = serde_json::to_value(HookOutput::message("heads up")).unwrap();
    assert_eq!(v, json!({"systemMessage": "heads up"}));
}

#[test]
fn serialize_stop_block_output() {
    let v = serde_json::to_value(HookOutput::block_stop("run the tests")).unwrap();
    assert_eq!(v, json!({"decision": "block", "reason": "run the tests"}));
}

#[test]
fn serialize_pre_tool_use_deny_output() {
    let v = serde_json::to_value(HookOutput::deny_tool("research first")).unwrap();
    assert_eq!(v["systemMessage"], "research first");
    assert_eq!(v["hookSpecificOutput"]["hookEventName"], "PreToolUse");
    assert_eq!(v["hookSpecificOutput"]["permissionDecision"], "deny");
    assert_eq!(v["hookSpecificOutput"]["permissionDecisionReason"], "research first");
}

#[test]
fn hook_error_includes_context_chain() {
    let err = anyhow::anyhow!("bad json").context("parsing .claude/fic-state.json");
    let out = HookOutput::hook_error(&err);
    assert_eq!(
        out.system_message.as_deref(),
        Some("[Harness] Hook error: parsing .claude/fic-state.json: bad json")
    );
}
