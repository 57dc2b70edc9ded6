//! OpenAI 互換 API まわり（メッセージ・履歴・ツール・呼び出しループ）

pub mod message;
pub mod history;
pub mod tools;
pub mod call;

// 代表的な公開APIを再エクスポート
pub use message::{Message, Role, ToolCallRequest};
pub use history::ConversationHistory;
pub use call::{
	AssistantTurn,
	ChatAnswer,
	ChatClient,
	ChatLogEvent,
	ChatStatus,
	ConversationState,
	OpenAiTransport,
	ToolResult,
	ToolStatus,
	Transport,
	TransportResponse,
};
pub use tools::{
	ToolDefinition,
	ToolDescriptor,
	ToolHandler,
	ToolParameters,
	ToolParametersBuilder,
	ToolRegistry,
	sample_registry,
};
