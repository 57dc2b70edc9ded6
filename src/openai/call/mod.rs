// Tool-calling loop: request building, transport, response assembly, tool dispatch and the orchestrator.

pub mod types;
pub mod request;
pub mod transport;
pub mod assembler;
pub mod resolver;
pub mod multi_step;

pub use types::{AssistantTurn, ChatAnswer, ChatLogEvent, ChatStatus, ToolResult, ToolStatus};
pub use request::{build_chat_request, determine_token_limit_strategy, ChatRequest, ChatTemplateKwargs, TokenLimitStrategy};
pub use transport::{
    ChatChunk, ChatResponse, ChunkChoice, ChunkDelta, FragmentStream, FunctionPart, OpenAiTransport, ResponseChoice,
    ResponseMessage, ResponseToolCall, ToolCallFragment, Transport, TransportResponse,
};
pub use assembler::{assemble, assemble_response, assemble_stream, StreamAssembler};
pub use resolver::{execute, execute_all, not_executed};
pub use multi_step::{ChatClient, ConversationState};
