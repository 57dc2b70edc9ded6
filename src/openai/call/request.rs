use crate::config::{ChatOptions, ReasoningEffort};
use crate::openai::message::Message;
use crate::openai::tools::ToolDescriptor;
use async_openai::types::ChatCompletionTool;
use serde::Serialize;
use tracing::debug;

/// トークン制限戦略を表現する列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLimitStrategy {
    /// `max_tokens` を使用（OpenAI互換サーバ・4o系）
    MaxTokens,
    /// `max_completion_tokens` を使用（5系・o系モデル向け）
    MaxCompletionTokens,
}

/// モデル名からトークン制限戦略を判定する
pub fn determine_token_limit_strategy(model: &str) -> TokenLimitStrategy {
    let m = model.to_ascii_lowercase();
    let completion_family = ["gpt-5", "o1", "o3", "o4"].iter().any(|p| m.starts_with(p));
    if completion_family {
        debug!(model = %model, strategy = "MaxCompletionTokens", "reasoning-family model");
        TokenLimitStrategy::MaxCompletionTokens
    } else {
        debug!(model = %model, strategy = "MaxTokens", "default token field");
        TokenLimitStrategy::MaxTokens
    }
}

/// サーバ側チャットテンプレートに渡す追加パラメータ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTemplateKwargs {
    pub reasoning_effort: ReasoningEffort,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builtin_tools: Option<Vec<String>>,
}

/// `/chat/completions` に送るリクエスト本体
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ChatCompletionTool>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    pub stream: bool,
    pub chat_template_kwargs: ChatTemplateKwargs,
}

impl ChatRequest {
    /// リクエスト中のツール名（テスト・ログ用）
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.function.name.as_str()).collect()
    }
}

/// 会話履歴・ツール・オプションからリクエストを構築する
///
/// 履歴は毎回まるごと送る（切り詰めや要約はしない）。
pub fn build_chat_request(
    model: &str,
    history: &[Message],
    tools: &[ToolDescriptor],
    options: &ChatOptions,
) -> ChatRequest {
    let (max_tokens, max_completion_tokens) = match determine_token_limit_strategy(model) {
        TokenLimitStrategy::MaxTokens => (Some(options.max_tokens), None),
        TokenLimitStrategy::MaxCompletionTokens => (None, Some(options.max_tokens)),
    };

    ChatRequest {
        model: model.to_string(),
        messages: history.to_vec(),
        tools: tools.iter().map(|t| t.as_chat_tool()).collect(),
        temperature: options.temperature,
        max_tokens,
        max_completion_tokens,
        stream: options.stream,
        chat_template_kwargs: ChatTemplateKwargs {
            reasoning_effort: options.reasoning_effort,
            model_identity: options.model_identity.clone(),
            builtin_tools: options.builtin_tools.clone(),
        },
    }
}
