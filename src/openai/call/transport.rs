//! Transport boundary: send one chat-completion request, get back either a
//! complete response or a stream of fragments.
//!
//! The wire types below are deliberately lenient (every field optional) so the
//! assembler, not serde, decides what counts as malformed. They also accept the
//! `reasoning_content` field that reasoning-capable servers add.

use std::pin::Pin;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::Client;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};

use super::request::ChatRequest;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseChoice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseToolCall {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionPart>,
}

/// Name/arguments pair, complete in a response and partial in a fragment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionPart {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// One `data:` event of a streamed response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallFragment>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallFragment {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionPart>,
}

/// Fragments in arrival order; the stream ending is the end-of-stream marker.
pub type FragmentStream = Pin<Box<dyn Stream<Item = ChatResult<ChatChunk>> + Send>>;

pub enum TransportResponse {
    Complete(ChatResponse),
    Stream(FragmentStream),
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportResponse::Complete(r) => f.debug_tuple("Complete").field(r).finish(),
            TransportResponse::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Anything that can carry a `ChatRequest` to a model.
///
/// `request.stream` decides which `TransportResponse` variant comes back.
/// Implementations do not retry on their own behalf unless they say so.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> ChatResult<TransportResponse>;
}

/// OpenAI-compatible HTTP transport backed by `async_openai::Client`.
///
/// Uses the bring-your-own-types calls so the payload can carry
/// `chat_template_kwargs` and the response can carry `reasoning_content`.
#[derive(Clone)]
pub struct OpenAiTransport {
    client: Client<OpenAIConfig>,
    api_base: String,
}

impl OpenAiTransport {
    pub fn new(api_base: &str, api_key: &str) -> Self {
        let config = OpenAIConfig::new().with_api_base(api_base).with_api_key(api_key);
        Self { client: Client::with_config(config), api_base: api_base.to_string() }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(&config.api_base, &config.api_key)
    }
}

/// Bodies that arrived but did not decode are the server's shape problem, not
/// the network's.
fn map_openai_error(err: OpenAIError) -> ChatError {
    match err {
        OpenAIError::JSONDeserialize(..) => ChatError::malformed(err.to_string()),
        other => ChatError::transport(other.to_string()),
    }
}

#[async_trait]
impl Transport for OpenAiTransport {
    #[instrument(name = "openai_send", skip(self, request), fields(model = %request.model, messages = request.messages.len(), stream = request.stream))]
    async fn send(&self, request: &ChatRequest) -> ChatResult<TransportResponse> {
        info!(target: "openai", api_base = %self.api_base, tools = request.tools.len(), "chat_request");
        if request.stream {
            let stream = self
                .client
                .chat()
                .create_stream_byot(request)
                .await
                .map_err(map_openai_error)?;
            debug!(target: "openai", "chat_stream_opened");
            let fragments = stream.map(|item: Result<ChatChunk, OpenAIError>| item.map_err(map_openai_error));
            Ok(TransportResponse::Stream(Box::pin(fragments)))
        } else {
            let response: ChatResponse = self
                .client
                .chat()
                .create_byot(request)
                .await
                .map_err(map_openai_error)?;
            debug!(target: "openai", choices = response.choices.len(), "chat_response");
            Ok(TransportResponse::Complete(response))
        }
    }
}
