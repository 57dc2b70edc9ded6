use crate::openai::message::{Message, Role, ToolCallRequest};
use crate::openai::call::ToolResult;

/// Append-only conversation history.
/// Wraps a `Vec<Message>` and provides ergonomic builder-style helpers.
///
/// Messages keep push order (which is also send order) and
/// nothing is removed except through `clear`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    /// Create empty history.
    pub fn new() -> Self { Self { messages: Vec::new() } }

    /// Start from messages supplied by the caller.
    pub fn from_messages(messages: Vec<Message>) -> Self { Self { messages } }

    /// Current length.
    pub fn len(&self) -> usize { self.messages.len() }
    /// Is empty.
    pub fn is_empty(&self) -> bool { self.messages.is_empty() }

    /// Slice view, sent as-is on every request.
    pub fn as_slice(&self) -> &[Message] { &self.messages }

    pub fn last(&self) -> Option<&Message> { self.messages.last() }

    /// Push raw message (advanced use).
    pub fn push(&mut self, msg: Message) { self.messages.push(msg); }

    /// Drop everything. Owned by the caller (e.g. the REPL `/clear` command).
    pub fn clear(&mut self) { self.messages.clear(); }

    /// Add user message.
    pub fn add_user<S: AsRef<str>>(&mut self, content: S) -> &mut Self {
        self.messages.push(Message::user(content.as_ref()));
        self
    }

    /// Add assistant message, with or without tool calls.
    pub fn add_assistant<S: AsRef<str>>(&mut self, content: S, tool_calls: Vec<ToolCallRequest>) -> &mut Self {
        self.messages.push(Message::assistant(content.as_ref(), tool_calls));
        self
    }

    /// Add a tool result message. Results must answer calls of the most recent
    /// assistant message; the orchestrator is the only caller that does this.
    pub fn add_tool_result(&mut self, result: &ToolResult) -> &mut Self {
        self.messages.push(Message::tool(&result.tool_call_id, &result.name, &result.content));
        self
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}
