//! アプリケーション設定
//!
//! `ChatConfig` はエンドポイント情報と会話オプションをまとめる。
//! 値は `Default` を起点に、環境変数（`.env` 含む）で上書きする。

use crate::error::{ChatError, ChatResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 推論の深さ（`chat_template_kwargs.reasoning_effort` に渡す）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    #[default]
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(ReasoningEffort::Low),
            "medium" => Ok(ReasoningEffort::Medium),
            "high" => Ok(ReasoningEffort::High),
            other => Err(format!("unknown reasoning effort '{other}' (expected low, medium or high)")),
        }
    }
}

/// 1 回の `chat()` 呼び出しに効くオプション
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    /// ツール実行ラウンドの上限
    pub max_iterations: usize,
    pub reasoning_effort: ReasoningEffort,
    /// システム側のモデル人格（`chat_template_kwargs.model_identity`）
    pub model_identity: Option<String>,
    /// サーバ内蔵ツール名（browser, python など）
    pub builtin_tools: Option<Vec<String>>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// ストリーミングで受信するか
    pub stream: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            reasoning_effort: ReasoningEffort::Medium,
            model_identity: None,
            builtin_tools: None,
            temperature: 0.7,
            max_tokens: 2000,
            stream: false,
        }
    }
}

impl ChatOptions {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = effort;
        self
    }

    pub fn with_model_identity(mut self, identity: impl Into<String>) -> Self {
        self.model_identity = Some(identity.into());
        self
    }
}

/// アプリケーション設定
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// OpenAI互換エンドポイントのベースURL（`/chat/completions` は付けない）
    pub api_base: String,
    pub api_key: String,
    /// モデル名
    pub model: String,
    /// ログ上でこの会話を識別する名前
    pub task_name: String,
    /// 同一ターン内のツール呼び出しを並列実行するか
    pub parallel_tool_calls: bool,
    pub tool_groups_path: PathBuf,
    pub agents_path: PathBuf,
    /// メイン会話に見せるツールグループ。`None` なら全ツール
    pub main_tool_groups: Option<Vec<String>>,
    pub options: ChatOptions,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8974/v1".to_string(),
            api_key: String::new(),
            model: "gpt-oss-120b".to_string(),
            task_name: "main".to_string(),
            parallel_tool_calls: false,
            tool_groups_path: PathBuf::from("config/tool_groups.yaml"),
            agents_path: PathBuf::from("config/agents.yaml"),
            main_tool_groups: None,
            options: ChatOptions::default(),
        }
    }
}

impl ChatConfig {
    /// 新しい設定インスタンスを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// プロセス環境変数から読み込む（`dotenvy::dotenv()` は呼び出し側で済ませておく）
    pub fn from_env() -> ChatResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー検索関数から読み込む。テストでは HashMap を渡す。
    pub fn from_lookup<F>(lookup: F) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("CHAT_API_BASE") {
            cfg.api_base = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("CHAT_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            cfg.api_key = v;
        }
        if let Some(v) = get("CHAT_MODEL") {
            cfg.model = v;
        }
        if let Some(v) = get("CHAT_TASK_NAME") {
            cfg.task_name = v;
        }
        if let Some(v) = get("CHAT_PARALLEL_TOOLS") {
            cfg.parallel_tool_calls = parse_bool("CHAT_PARALLEL_TOOLS", &v)?;
        }
        if let Some(v) = get("CHAT_TOOL_GROUPS") {
            cfg.tool_groups_path = PathBuf::from(v);
        }
        if let Some(v) = get("CHAT_AGENTS") {
            cfg.agents_path = PathBuf::from(v);
        }
        if let Some(v) = get("CHAT_MAIN_TOOL_GROUPS") {
            // カンマ区切り: "math,clock"
            let groups: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect();
            cfg.main_tool_groups = (!groups.is_empty()).then_some(groups);
        }

        let opts = &mut cfg.options;
        if let Some(v) = get("CHAT_MAX_ITERATIONS") {
            opts.max_iterations = parse_num("CHAT_MAX_ITERATIONS", &v)?;
        }
        if let Some(v) = get("CHAT_TEMPERATURE") {
            opts.temperature = parse_num("CHAT_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("CHAT_MAX_TOKENS") {
            opts.max_tokens = parse_num("CHAT_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("CHAT_REASONING_EFFORT") {
            opts.reasoning_effort = v
                .parse()
                .map_err(|e: String| ChatError::config("CHAT_REASONING_EFFORT", e))?;
        }
        if let Some(v) = get("CHAT_STREAM") {
            opts.stream = parse_bool("CHAT_STREAM", &v)?;
        }
        if let Some(v) = get("CHAT_MODEL_IDENTITY") {
            opts.model_identity = Some(v);
        }

        Ok(cfg)
    }
}

fn parse_num<T>(key: &str, raw: &str) -> ChatResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>().map_err(|e| ChatError::config(key, format!("'{raw}': {e}")))
}

fn parse_bool(key: &str, raw: &str) -> ChatResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ChatError::config(key, format!("'{raw}' is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_lookup_keeps_defaults() {
        let cfg = ChatConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.model, "gpt-oss-120b");
        assert_eq!(cfg.options, ChatOptions::default());
        assert!(!cfg.parallel_tool_calls);
        assert!(cfg.main_tool_groups.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = ChatConfig::from_lookup(lookup_from(&[
            ("CHAT_API_BASE", "http://localhost:9000/v1/"),
            ("OPENAI_API_KEY", "sk-test"),
            ("CHAT_MAX_ITERATIONS", "15"),
            ("CHAT_REASONING_EFFORT", "HIGH"),
            ("CHAT_STREAM", "yes"),
            ("CHAT_PARALLEL_TOOLS", "1"),
            ("CHAT_MAIN_TOOL_GROUPS", " math, clock ,"),
        ]))
        .unwrap();
        assert_eq!(cfg.main_tool_groups, Some(vec!["math".to_string(), "clock".to_string()]));
        assert_eq!(cfg.api_base, "http://localhost:9000/v1");
        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.options.max_iterations, 15);
        assert_eq!(cfg.options.reasoning_effort, ReasoningEffort::High);
        assert!(cfg.options.stream);
        assert!(cfg.parallel_tool_calls);
    }

    #[test]
    fn chat_api_key_wins_over_openai_key() {
        let cfg = ChatConfig::from_lookup(lookup_from(&[
            ("CHAT_API_KEY", "primary"),
            ("OPENAI_API_KEY", "fallback"),
        ]))
        .unwrap();
        assert_eq!(cfg.api_key, "primary");
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let err = ChatConfig::from_lookup(lookup_from(&[("CHAT_TEMPERATURE", "warm")])).unwrap_err();
        assert!(matches!(err, ChatError::Config { ref key, .. } if key == "CHAT_TEMPERATURE"));

        let err = ChatConfig::from_lookup(lookup_from(&[("CHAT_STREAM", "maybe")])).unwrap_err();
        assert!(matches!(err, ChatError::Config { ref key, .. } if key == "CHAT_STREAM"));

        let err = ChatConfig::from_lookup(lookup_from(&[("CHAT_REASONING_EFFORT", "extreme")])).unwrap_err();
        assert!(matches!(err, ChatError::Config { .. }));
    }

    #[test]
    fn reasoning_effort_serializes_lowercase() {
        let v = serde_json::to_value(ReasoningEffort::Low).unwrap();
        assert_eq!(v, serde_json::json!("low"));
        assert_eq!(ReasoningEffort::High.to_string(), "high");
    }
}
