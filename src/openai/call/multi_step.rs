use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::{ChatConfig, ChatOptions};
use crate::display::{DisplaySink, NullSink};
use crate::error::ChatResult;
use crate::openai::history::ConversationHistory;
use crate::openai::message::Message;
use crate::openai::tools::{ToolDescriptor, ToolRegistry};

use super::assembler::assemble;
use super::request::build_chat_request;
use super::resolver::{execute_all, not_executed};
use super::transport::{OpenAiTransport, Transport};
use super::types::{ChatAnswer, ChatLogEvent, ChatStatus, ToolResult};

type EventLogger<'a> = &'a mut (dyn FnMut(&ChatLogEvent) + Send);

/// 1 回の `chat()` 呼び出しが所有する会話状態
///
/// `iteration_count` は完了したツール実行ラウンド数。`run` を同じ状態で続けて呼ぶ場合は
/// 呼び出し側が `reset_iterations` で戻す。
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub history: ConversationHistory,
    pub iteration_count: usize,
    pub options: ChatOptions,
}

impl ConversationState {
    pub fn new(messages: Vec<Message>, options: ChatOptions) -> Self {
        Self { history: ConversationHistory::from_messages(messages), iteration_count: 0, options }
    }

    pub fn reset_iterations(&mut self) {
        self.iteration_count = 0;
    }

    /// 末尾の assistant メッセージに未応答の tool_calls があれば、実行しないまま
    /// エラー結果で応答を付ける。上限で打ち切った会話を続ける前に呼ぶ。
    ///
    /// 追記のみで、既存メッセージは変更しない。付けた結果を返す。
    pub fn close_pending_tool_calls(&mut self, reason: &str) -> Vec<ToolResult> {
        let pending = match self.history.last() {
            Some(msg) if msg.has_tool_calls() => msg.tool_calls.clone(),
            _ => return Vec::new(),
        };
        let results: Vec<ToolResult> = pending.iter().map(|call| not_executed(call, reason)).collect();
        for result in &results {
            self.history.add_tool_result(result);
        }
        debug!(target: "openai", closed = results.len(), "pending_tool_calls_closed");
        results
    }
}

/// モデル呼び出しとツール実行を交互に回すクライアント
///
/// transport / registry / sink はすべて `Arc` で共有されるので `Clone` は安い。
#[derive(Clone)]
pub struct ChatClient {
    transport: Arc<dyn Transport>,
    registry: Arc<ToolRegistry>,
    model: String,
    task_name: String,
    parallel_tool_calls: bool,
    sink: Arc<dyn DisplaySink>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("model", &self.model)
            .field("task_name", &self.task_name)
            .field("parallel_tool_calls", &self.parallel_tool_calls)
            .field("tools", &self.registry.len())
            .finish()
    }
}

impl ChatClient {
    pub fn new(transport: Arc<dyn Transport>, registry: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        Self {
            transport,
            registry,
            model: model.into(),
            task_name: "main".to_string(),
            parallel_tool_calls: false,
            sink: Arc::new(NullSink),
        }
    }

    /// 設定から OpenAI 互換 transport を組み立てる
    pub fn from_config(config: &ChatConfig, registry: Arc<ToolRegistry>) -> Self {
        Self::new(Arc::new(OpenAiTransport::from_config(config)), registry, config.model.clone())
            .with_task_name(config.task_name.clone())
            .with_parallel_tool_calls(config.parallel_tool_calls)
    }

    pub fn with_sink(mut self, sink: Arc<dyn DisplaySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_task_name(mut self, task_name: impl Into<String>) -> Self {
        self.task_name = task_name.into();
        self
    }

    pub fn with_parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.parallel_tool_calls = parallel;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// 公開エントリポイント: メッセージ列から最終回答まで回す
    pub async fn chat(&self, messages: Vec<Message>, tools: &[ToolDescriptor], options: &ChatOptions) -> ChatResult<ChatAnswer> {
        let mut state = ConversationState::new(messages, options.clone());
        self.run(&mut state, tools).await
    }

    pub async fn chat_with_logger(
        &self,
        messages: Vec<Message>,
        tools: &[ToolDescriptor],
        options: &ChatOptions,
        logger: impl FnMut(&ChatLogEvent) + Send,
    ) -> ChatResult<ChatAnswer> {
        let mut state = ConversationState::new(messages, options.clone());
        self.run_with_logger(&mut state, tools, logger).await
    }

    /// 既存の状態で実行する。履歴は `state.history` にそのまま残る。
    pub async fn run(&self, state: &mut ConversationState, tools: &[ToolDescriptor]) -> ChatResult<ChatAnswer> {
        let mut noop = |_: &ChatLogEvent| {};
        self.run_internal(state, tools, &mut noop).await
    }

    pub async fn run_with_logger(
        &self,
        state: &mut ConversationState,
        tools: &[ToolDescriptor],
        logger: impl FnMut(&ChatLogEvent) + Send,
    ) -> ChatResult<ChatAnswer> {
        let mut logger = logger;
        self.run_internal(state, tools, &mut logger).await
    }

    #[instrument(
        name = "chat_run",
        skip(self, state, tools, logger),
        fields(task = %self.task_name, model = %self.model, max_iterations = state.options.max_iterations)
    )]
    async fn run_internal(
        &self,
        state: &mut ConversationState,
        tools: &[ToolDescriptor],
        logger: EventLogger<'_>,
    ) -> ChatResult<ChatAnswer> {
        let mut emit = |ev: ChatLogEvent| {
            debug!(target: "openai", event = %ev, "chat_event");
            logger(&ev);
        };

        let max_iterations = state.options.max_iterations;
        let mut steps = Vec::new();
        let mut requests = 0usize;

        loop {
            requests += 1;
            emit(ChatLogEvent::IterationStart { iteration: requests, messages: state.history.len(), tools: tools.len() });

            let request = build_chat_request(&self.model, state.history.as_slice(), tools, &state.options);
            let response = self.transport.send(&request).await?;
            let turn = assemble(response, self.sink.as_ref()).await?;
            emit(ChatLogEvent::TurnAssembled {
                iteration: requests,
                text_len: turn.text.len(),
                tool_calls: turn.tool_calls.len(),
            });

            state.history.add_assistant(&turn.text, turn.tool_calls.clone());

            if !turn.has_tool_calls() {
                info!(target: "openai", iterations = requests, tool_rounds = state.iteration_count, "chat_completed");
                emit(ChatLogEvent::FinalAnswer { iteration: requests, text: turn.text.clone() });
                return Ok(ChatAnswer {
                    final_answer: turn.text,
                    status: ChatStatus::Completed,
                    iterations: requests,
                    tool_rounds: state.iteration_count,
                    steps,
                });
            }

            if state.iteration_count >= max_iterations {
                warn!(target: "openai", max_iterations, pending = turn.tool_calls.len(), "iteration_limit_exceeded");
                emit(ChatLogEvent::IterationLimitExceeded { max_iterations });
                return Ok(ChatAnswer {
                    final_answer: turn.text,
                    status: ChatStatus::IterationLimitExceeded { max_iterations },
                    iterations: requests,
                    tool_rounds: state.iteration_count,
                    steps,
                });
            }

            for call in &turn.tool_calls {
                info!(target: "openai", tool = %call.name, args = %call.arguments, "tool_call");
                emit(ChatLogEvent::ToolCall { iteration: requests, call: call.clone() });
            }

            let results = execute_all(turn.tool_calls, Arc::clone(&self.registry), self.parallel_tool_calls).await;
            for result in &results {
                state.history.add_tool_result(result);
                emit(ChatLogEvent::ToolResult { iteration: requests, result: result.clone() });
            }
            steps.extend(results);
            state.iteration_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::call::ToolStatus;
    use crate::openai::message::{Role, ToolCallRequest};

    #[test]
    fn pending_calls_are_closed_with_error_results() {
        let mut state = ConversationState::new(vec![Message::user("time?")], ChatOptions::default());
        state.history.add_assistant(
            "",
            vec![
                ToolCallRequest::new("c1", "get_current_time", "{}"),
                ToolCallRequest::new("c2", "calculate", "{}"),
            ],
        );

        let closed = state.close_pending_tool_calls("iteration limit reached");
        assert_eq!(closed.len(), 2);
        assert!(closed.iter().all(|r| r.status == ToolStatus::NotExecuted));

        let tail: Vec<(Role, Option<&str>)> = state.history.as_slice()[2..]
            .iter()
            .map(|m| (m.role, m.tool_call_id.as_deref()))
            .collect();
        assert_eq!(tail, vec![(Role::Tool, Some("c1")), (Role::Tool, Some("c2"))]);
        assert_eq!(state.history.as_slice()[2].text(), r#"{"error":"not executed: iteration limit reached"}"#);

        // 既に応答済みなら何もしない
        assert!(state.close_pending_tool_calls("again").is_empty());
        assert_eq!(state.history.len(), 4);
    }
}
