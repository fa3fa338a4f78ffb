use serde::{Deserialize, Serialize};
use serde_json::Value;

// ===================================================================
// Shared Enums
// ===================================================================

/// How a session was started (used by SessionStart).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStartSource {
    Startup,
    Resume,
    Clear,
    Compact,
    #[serde(other)]
    Other,
}

// ===================================================================
// Hook Input Types (received via stdin, snake_case JSON)
// ===================================================================

/// Fields shared by all hook event inputs. Hosts omit some of them on some
/// events, so every field defaults to empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonInput {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub transcript_path: String,
    #[serde(default)]
    pub cwd: String,
}

/// A string field of a JSON object, if present.
fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// `primary` unless empty, else `tool_input[key]`.
fn or_tool_input<'a>(primary: &'a str, tool_input: &'a Value, key: &str) -> &'a str {
    if primary.is_empty() {
        str_field(tool_input, key).unwrap_or_default()
    } else {
        primary
    }
}

// --- Per-event input structs ---

#[derive(Debug, Deserialize)]
pub struct SessionStartInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub source: Option<SessionStartSource>,
}

impl SessionStartInput {
    pub fn after_compaction(&self) -> bool {
        self.source == Some(SessionStartSource::Compact)
    }
}

#[derive(Debug, Deserialize)]
pub struct UserPromptSubmitInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub tool_input: Value,
}

impl UserPromptSubmitInput {
    pub fn prompt(&self) -> &str {
        or_tool_input(&self.prompt, &self.tool_input, "prompt")
    }
}

#[derive(Debug, Deserialize)]
pub struct PreToolUseInput {
    #[serde(flatten)]
    pub common: CommonInput,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Value,
}

impl PreToolUseInput {
    pub fn file_path(&self) -> Option<&str> {
        str_field(&self.tool_input, "file_path")
    }
}

#[derive(Debug, Deserialize)]
pub struct PostToolUseInput {
    #[serde(flatten)]
    pub common: CommonInput,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default, alias = "tool_result")]
    pub tool_response: Value,
}

impl PostToolUseInput {
    pub fn file_path(&self) -> Option<&str> {
        str_field(&self.tool_input, "file_path")
    }

    pub fn command(&self) -> Option<&str> {
        str_field(&self.tool_input, "command")
    }

    /// The tool result as text. Structured responses are measured and
    /// scanned as their JSON encoding.
    pub fn response_text(&self) -> String {
        match &self.tool_response {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PreCompactInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub trigger: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StopInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub stop_hook_active: bool,
    #[serde(default, alias = "stopReason")]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub tool_input: Value,
}

impl StopInput {
    pub fn stop_reason(&self) -> &str {
        match &self.stop_reason {
            Some(r) if !r.is_empty() => r,
            _ => str_field(&self.tool_input, "stopReason")
                .or_else(|| str_field(&self.tool_input, "reason"))
                .unwrap_or_default(),
        }
    }

    /// Normal end-of-turn stops are the only ones worth checking.
    pub fn is_normal_stop(&self) -> bool {
        matches!(self.stop_reason(), "" | "end_turn" | "stop_sequence" | "unknown")
    }
}

#[derive(Debug, Deserialize)]
pub struct SubagentStopInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default, alias = "subagent_type")]
    pub agent_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub agent_transcript_path: Option<String>,
    #[serde(default)]
    pub tool_input: Value,
}

impl SubagentStopInput {
    pub fn agent_type(&self) -> &str {
        or_tool_input(&self.agent_type, &self.tool_input, "subagent_type")
    }

    pub fn description(&self) -> &str {
        or_tool_input(&self.description, &self.tool_input, "description")
    }

    pub fn output(&self) -> &str {
        or_tool_input(&self.output, &self.tool_input, "output")
    }
}

/// Top-level hook input, deserialized from stdin JSON.
///
/// Tagged by the `hook_event_name` field to determine which event fired.
#[derive(Debug, Deserialize)]
#[serde(tag = "hook_event_name")]
pub enum HookInput {
    SessionStart(SessionStartInput),
    UserPromptSubmit(UserPromptSubmitInput),
    PreToolUse(PreToolUseInput),
    PostToolUse(PostToolUseInput),
    PreCompact(PreCompactInput),
    Stop(StopInput),
    SubagentStop(SubagentStopInput),
}

impl HookInput {
    /// Access the common fields shared by all hook events.
    pub fn common(&self) -> &CommonInput {
        match self {
            Self::SessionStart(e) => &e.common,
            Self::UserPromptSubmit(e) => &e.common,
            Self::PreToolUse(e) => &e.common,
            Self::PostToolUse(e) => &e.common,
            Self::PreCompact(e) => &e.common,
            Self::Stop(e) => &e.common,
            Self::SubagentStop(e) => &e.common,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::SessionStart(_) => "SessionStart",
            Self::UserPromptSubmit(_) => "UserPromptSubmit",
            Self::PreToolUse(_) => "PreToolUse",
            Self::PostToolUse(_) => "PostToolUse",
            Self::PreCompact(_) => "PreCompact",
            Self::Stop(_) => "Stop",
            Self::SubagentStop(_) => "SubagentStop",
        }
    }
}

// ===================================================================
// Hook Output Types (written to stdout as JSON, camelCase)
// ===================================================================

/// Top-level hook output. Serializes to `{}` when nothing is set.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    /// Message shown to the agent and user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    /// Set to `"block"` to keep a Stop from going through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,

    /// Explanation shown to the agent when `decision` is `"block"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

impl HookOutput {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            system_message: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn hook_error(err: &anyhow::Error) -> Self {
        Self::message(format!("[Harness] Hook error: {err:#}"))
    }

    pub fn block_stop(reason: impl Into<String>) -> Self {
        Self {
            decision: Some("block".to_string()),
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn deny_tool(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            system_message: Some(reason.clone()),
            hook_specific_output: Some(HookSpecificOutput::PreToolUse(PreToolUseOutput {
                permission_decision: Some(PreToolUsePermissionDecision::Deny),
                permission_decision_reason: Some(reason),
            })),
            ..Default::default()
        }
    }
}

/// Event-specific output, tagged by `hookEventName`.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "hookEventName")]
pub enum HookSpecificOutput {
    PreToolUse(PreToolUseOutput),
}

/// PreToolUse permission decision values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreToolUsePermissionDecision {
    Allow,
    Deny,
    Ask,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreToolUseOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_decision: Option<PreToolUsePermissionDecision>,

    /// Shown to the agent on deny.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,
}

#[cfg(test)]
mod tests;
