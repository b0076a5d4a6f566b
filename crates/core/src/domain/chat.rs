use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Opaque conversation identifier. History keyed by this id persists across
/// requests as a strictly append-ordered log.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    /// New-thread ids are the current timestamp in milliseconds, matching the
    /// shape callers already treat as opaque.
    pub fn from_timestamp(now: DateTime<Utc>) -> Self {
        Self(now.timestamp_millis().to_string())
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }
}

/// A structured tool invocation decided by the model. This replaces the
/// original text-sniffing heuristic: the model either responds or invokes,
/// never both, and arguments arrive as a JSON object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub tool_call: Option<ToolCall>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: Role, content: String, tool_call: Option<ToolCall>) -> Self {
        Self { id: Uuid::new_v4(), role, content, tool_call, created_at: Utc::now() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), None)
    }

    /// Assistant turn that carries a tool invocation instead of user-facing
    /// text. The content records the call for transcript readers.
    pub fn assistant_invocation(call: ToolCall) -> Self {
        let content = format!("[invoking {}]", call.name);
        Self::new(Role::Assistant, content, Some(call))
    }

    /// Tool execution result. `call` echoes the invocation it answers so the
    /// provider transcript can pair request and response.
    pub fn tool_result(call: ToolCall, content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content.into(), Some(call))
    }
}
