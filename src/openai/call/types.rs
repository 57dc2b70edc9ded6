use std::fmt::{self, Display};

use crate::openai::message::ToolCallRequest;

/// One normalized model turn: text plus zero or more complete tool calls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssistantTurn {
    pub text: String,
    /// `reasoning_content`, when the server exposes it. Never sent back.
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantTurn {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// How a tool call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    /// Argument text was not a JSON object.
    InvalidArguments,
    UnknownTool,
    /// The handler returned an error or panicked.
    ExecutionFailed,
    /// Requested but never dispatched (the round limit was reached first).
    NotExecuted,
}

/// The outcome of one tool call, already rendered as the text the model sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    pub status: ToolStatus,
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// Final status of a `chat()` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    /// The model answered without requesting more tools.
    Completed,
    /// The model still wanted tools after `max_iterations` dispatch rounds.
    IterationLimitExceeded { max_iterations: usize },
}

/// 実行結果: 最終回答テキストと途中の各ツール結果
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub final_answer: String,
    pub status: ChatStatus,
    /// モデル呼び出し回数
    pub iterations: usize,
    /// ツール実行ラウンド数
    pub tool_rounds: usize,
    pub steps: Vec<ToolResult>,
}

impl ChatAnswer {
    pub fn is_iteration_limit_exceeded(&self) -> bool {
        matches!(self.status, ChatStatus::IterationLimitExceeded { .. })
    }
}

#[derive(Debug, Clone)]
pub enum ChatLogEvent {
    IterationStart { iteration: usize, messages: usize, tools: usize },
    TurnAssembled { iteration: usize, text_len: usize, tool_calls: usize },
    ToolCall { iteration: usize, call: ToolCallRequest },
    ToolResult { iteration: usize, result: ToolResult },
    FinalAnswer { iteration: usize, text: String },
    IterationLimitExceeded { max_iterations: usize },
}

impl Display for ToolResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} name={} id={} content={}", self.status, self.name, self.tool_call_id, self.content)
    }
}

impl Display for ChatLogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatLogEvent::IterationStart { iteration, messages, tools } => {
                write!(f, "IterationStart #{} messages={} tools={}", iteration, messages, tools)
            }
            ChatLogEvent::TurnAssembled { iteration, text_len, tool_calls } => {
                write!(f, "TurnAssembled @{} text_len={} tool_calls={}", iteration, text_len, tool_calls)
            }
            ChatLogEvent::ToolCall { iteration, call } => write!(f, "ToolCall @{} => {}", iteration, call),
            ChatLogEvent::ToolResult { iteration, result } => write!(f, "ToolResult @{} => {}", iteration, result),
            ChatLogEvent::FinalAnswer { iteration, text } => write!(f, "FinalAnswer @{} len={}", iteration, text.len()),
            ChatLogEvent::IterationLimitExceeded { max_iterations } => {
                write!(f, "IterationLimitExceeded after {} rounds", max_iterations)
            }
        }
    }
}
