//! Scripted stand-ins for the transport and the display, for driving the chat
//! loop without a server.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::display::DisplaySink;
use crate::error::{ChatError, ChatResult};
use crate::openai::call::{
    ChatChunk, ChatRequest, ChatResponse, ChunkChoice, ChunkDelta, FunctionPart, ResponseChoice, ResponseMessage,
    ResponseToolCall, ToolCallFragment, Transport, TransportResponse,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One queued reply of a `MockTransport`.
#[derive(Debug)]
pub enum Scripted {
    Complete(ChatResponse),
    Stream(Vec<ChatResult<ChatChunk>>),
    Error(ChatError),
}

/// Replays queued replies in order and records every request it was sent.
///
/// When the queue runs dry the `repeat` response (if any) is returned forever,
/// otherwise the call fails with a transport error.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    repeat: Option<ChatResponse>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self { script: Mutex::new(script.into_iter().collect()), ..Self::default() }
    }

    /// Answer every request with the same complete response.
    pub fn repeating(response: ChatResponse) -> Self {
        Self { repeat: Some(response), ..Self::default() }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ChatRequest) -> ChatResult<TransportResponse> {
        lock(&self.requests).push(request.clone());
        let next = lock(&self.script).pop_front();
        match next {
            Some(Scripted::Complete(resp)) => Ok(TransportResponse::Complete(resp)),
            Some(Scripted::Stream(items)) => Ok(TransportResponse::Stream(Box::pin(futures::stream::iter(items)))),
            Some(Scripted::Error(err)) => Err(err),
            None => match &self.repeat {
                Some(resp) => Ok(TransportResponse::Complete(resp.clone())),
                None => Err(ChatError::transport("mock transport script exhausted")),
            },
        }
    }
}

/// Complete response carrying only text.
pub fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        choices: vec![ResponseChoice {
            message: Some(ResponseMessage { content: Some(text.to_string()), ..Default::default() }),
            finish_reason: Some("stop".to_string()),
        }],
    }
}

/// Complete response requesting the given `(id, name, arguments)` calls.
pub fn tool_call_response(calls: &[(&str, &str, &str)]) -> ChatResponse {
    let tool_calls = calls
        .iter()
        .map(|(id, name, args)| ResponseToolCall {
            id: Some(id.to_string()),
            function: Some(FunctionPart { name: Some(name.to_string()), arguments: Some(args.to_string()) }),
        })
        .collect();
    ChatResponse {
        choices: vec![ResponseChoice {
            message: Some(ResponseMessage { tool_calls: Some(tool_calls), ..Default::default() }),
            finish_reason: Some("tool_calls".to_string()),
        }],
    }
}

fn delta_chunk(delta: ChunkDelta) -> ChatChunk {
    ChatChunk { choices: vec![ChunkChoice { delta, finish_reason: None }] }
}

pub fn text_chunk(text: &str) -> ChatChunk {
    delta_chunk(ChunkDelta { content: Some(text.to_string()), ..Default::default() })
}

pub fn reasoning_chunk(text: &str) -> ChatChunk {
    delta_chunk(ChunkDelta { reasoning_content: Some(text.to_string()), ..Default::default() })
}

/// A tool-call fragment for slot `index`; any part may be absent.
pub fn tool_call_chunk(index: u32, id: Option<&str>, name: Option<&str>, arguments: Option<&str>) -> ChatChunk {
    let function = (name.is_some() || arguments.is_some()).then(|| FunctionPart {
        name: name.map(str::to_string),
        arguments: arguments.map(str::to_string),
    });
    delta_chunk(ChunkDelta {
        tool_calls: Some(vec![ToolCallFragment { index: Some(index), id: id.map(str::to_string), function }]),
        ..Default::default()
    })
}

/// Keeps everything it is shown.
#[derive(Debug, Default)]
pub struct RecordingSink {
    content: Mutex<Vec<String>>,
    reasoning: Mutex<Vec<String>>,
    ends: Mutex<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> Vec<String> {
        lock(&self.content).clone()
    }

    pub fn reasoning(&self) -> Vec<String> {
        lock(&self.reasoning).clone()
    }

    pub fn stream_ends(&self) -> usize {
        *lock(&self.ends)
    }
}

impl DisplaySink for RecordingSink {
    fn on_content(&self, chunk: &str) {
        lock(&self.content).push(chunk.to_string());
    }

    fn on_reasoning(&self, chunk: &str) {
        lock(&self.reasoning).push(chunk.to_string());
    }

    fn on_stream_end(&self) {
        *lock(&self.ends) += 1;
    }
}
