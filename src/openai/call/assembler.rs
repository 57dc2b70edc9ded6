//! Turns a transport response into exactly one `AssistantTurn`.
//!
//! Complete responses are checked and copied out. Streams are buffered per
//! tool-call slot and only released once the stream has ended, so callers never
//! see a half-built tool call.

use std::collections::BTreeMap;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::display::DisplaySink;
use crate::error::{ChatError, ChatResult};
use crate::openai::message::ToolCallRequest;

use super::transport::{ChatChunk, ChatResponse, FragmentStream, TransportResponse};
use super::types::AssistantTurn;

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(str::to_string)
}

/// Assemble a complete (non-streamed) response.
///
/// Only the first choice is used. Pure function of its input, so assembling the
/// same response twice gives the same turn.
pub fn assemble_response(response: &ChatResponse) -> ChatResult<AssistantTurn> {
    let choice = response
        .choices
        .first()
        .ok_or_else(|| ChatError::malformed("response has no choices"))?;
    let message = choice
        .message
        .as_ref()
        .ok_or_else(|| ChatError::malformed("first choice has no message"))?;

    let mut tool_calls = Vec::new();
    for (index, call) in message.tool_calls.iter().flatten().enumerate() {
        let function = call
            .function
            .as_ref()
            .ok_or_else(|| ChatError::malformed(format!("tool call #{index} has no function")))?;
        let name = non_empty(function.name.as_deref())
            .ok_or_else(|| ChatError::malformed(format!("tool call #{index} has no function name")))?;
        let id = non_empty(call.id.as_deref()).unwrap_or_else(|| format!("call_{index}"));
        let arguments = function.arguments.clone().unwrap_or_default();
        tool_calls.push(ToolCallRequest { id, name, arguments });
    }

    Ok(AssistantTurn {
        text: message.content.clone().unwrap_or_default(),
        reasoning: non_empty(message.reasoning_content.as_deref()),
        tool_calls,
    })
}

/// Accumulating buffers for one tool-call slot.
#[derive(Debug, Default, Clone)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn arguments_parse(&self) -> bool {
        self.arguments.trim().is_empty() || serde_json::from_str::<serde_json::Value>(&self.arguments).is_ok()
    }
}

/// Incremental merge state for a streamed turn.
///
/// Every field merges by plain concatenation in arrival order, keyed by slot
/// index (missing index means slot 0).
#[derive(Debug, Default)]
pub struct StreamAssembler {
    text: String,
    reasoning: String,
    slots: BTreeMap<u32, PartialToolCall>,
    chunks: usize,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one chunk, forwarding text to `sink` as it arrives.
    pub fn push(&mut self, chunk: &ChatChunk, sink: &dyn DisplaySink) {
        self.chunks += 1;
        let Some(choice) = chunk.choices.first() else {
            return;
        };
        let delta = &choice.delta;

        if let Some(reasoning) = delta.reasoning_content.as_deref().filter(|s| !s.is_empty()) {
            self.reasoning.push_str(reasoning);
            sink.on_reasoning(reasoning);
        }
        if let Some(content) = delta.content.as_deref().filter(|s| !s.is_empty()) {
            self.text.push_str(content);
            sink.on_content(content);
        }
        // id / name も引数と同じく連結する。毎回フルの id を送り直すサーバーでは
        // `call_1call_1` になり、その呼び出しは unknown tool として返る。
        for frag in delta.tool_calls.iter().flatten() {
            let slot = self.slots.entry(frag.index.unwrap_or(0)).or_default();
            if let Some(id) = &frag.id {
                slot.id.push_str(id);
            }
            if let Some(function) = &frag.function {
                if let Some(name) = &function.name {
                    slot.name.push_str(name);
                }
                if let Some(args) = &function.arguments {
                    slot.arguments.push_str(args);
                }
            }
        }
    }

    /// Close the stream and produce the turn. Slots still missing an id or a
    /// name are dropped.
    pub fn finish(self) -> AssistantTurn {
        let mut tool_calls = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots {
            if slot.id.is_empty() || slot.name.is_empty() {
                warn!(target: "openai", index, id = %slot.id, name = %slot.name, "dropping_incomplete_tool_call");
                continue;
            }
            if !slot.arguments_parse() {
                warn!(target: "openai", index, name = %slot.name, args = %slot.arguments, "tool_call_arguments_not_json");
            }
            tool_calls.push(ToolCallRequest { id: slot.id, name: slot.name, arguments: slot.arguments });
        }
        debug!(target: "openai", chunks = self.chunks, text_len = self.text.len(), tool_calls = tool_calls.len(), "stream_assembled");
        AssistantTurn {
            text: self.text,
            reasoning: (!self.reasoning.is_empty()).then_some(self.reasoning),
            tool_calls,
        }
    }
}

/// Pull fragments until end of stream.
///
/// Chunks that failed to decode are logged and skipped; any other error aborts.
pub async fn assemble_stream(mut stream: FragmentStream, sink: &dyn DisplaySink) -> ChatResult<AssistantTurn> {
    let mut assembler = StreamAssembler::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => assembler.push(&chunk, sink),
            Err(e) if e.is_malformed() => {
                warn!(target: "openai", error = %e, "skipping_undecodable_chunk");
            }
            Err(e) => {
                sink.on_stream_end();
                return Err(e);
            }
        }
    }
    sink.on_stream_end();
    Ok(assembler.finish())
}

pub async fn assemble(response: TransportResponse, sink: &dyn DisplaySink) -> ChatResult<AssistantTurn> {
    match response {
        TransportResponse::Complete(resp) => assemble_response(&resp),
        TransportResponse::Stream(stream) => assemble_stream(stream, sink).await,
    }
}
