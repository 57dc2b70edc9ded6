//! Chat protocol messages as they are kept in history and sent on the wire.

use async_openai::types::{ChatCompletionMessageToolCall, ChatCompletionToolType, FunctionCall};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// One model-issued tool call. `arguments` is the raw text the model produced,
/// expected (not guaranteed) to be a JSON object.
///
/// Serialized in the OpenAI `{"id", "type": "function", "function": {...}}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ChatCompletionMessageToolCall", from = "ChatCompletionMessageToolCall")]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), arguments: arguments.into() }
    }
}

impl From<ToolCallRequest> for ChatCompletionMessageToolCall {
    fn from(call: ToolCallRequest) -> Self {
        ChatCompletionMessageToolCall {
            id: call.id,
            r#type: ChatCompletionToolType::Function,
            function: FunctionCall { name: call.name, arguments: call.arguments },
        }
    }
}

impl From<ChatCompletionMessageToolCall> for ToolCallRequest {
    fn from(call: ChatCompletionMessageToolCall) -> Self {
        ToolCallRequest {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        }
    }
}

impl Display for ToolCallRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) id={}", self.name, self.arguments, self.id)
    }
}

/// A single history entry.
///
/// `tool_calls` is only populated on assistant messages, `tool_call_id` and
/// `name` only on tool messages. Use the constructors instead of building the
/// struct by hand so that pairing stays intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Assistant message. Empty text is sent as an empty string, which every
    /// OpenAI-compatible server accepts next to `tool_calls`.
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self { tool_calls, ..Self::plain(Role::Assistant, content) }
    }

    pub fn tool(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assistant_with_calls_serializes_openai_shape() {
        let msg = Message::assistant("", vec![ToolCallRequest::new("call_1", "calculate", r#"{"num1":2}"#)]);
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["role"], "assistant");
        assert_eq!(v["tool_calls"][0]["id"], "call_1");
        assert_eq!(v["tool_calls"][0]["type"], "function");
        assert_eq!(v["tool_calls"][0]["function"]["name"], "calculate");
        assert_eq!(v["tool_calls"][0]["function"]["arguments"], r#"{"num1":2}"#);
        assert!(v.get("tool_call_id").is_none());
    }

    #[test]
    fn tool_message_carries_id_and_name() {
        let v = serde_json::to_value(Message::tool("call_1", "calculate", "4")).unwrap();
        assert_eq!(v, json!({"role": "tool", "content": "4", "tool_call_id": "call_1", "name": "calculate"}));
    }

    #[test]
    fn system_message_has_no_tool_fields() {
        let v = serde_json::to_value(Message::system("be brief")).unwrap();
        assert_eq!(v, json!({"role": "system", "content": "be brief"}));
    }

    #[test]
    fn user_message_round_trips_from_wire() {
        let msg: Message = serde_json::from_value(json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(msg, Message::user("hi"));
        assert!(!msg.has_tool_calls());
    }
}
