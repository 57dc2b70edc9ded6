//! サブエージェントへのタスク委譲
//!
//! `config/agents.yaml` に定義された専門エージェント（固有のツールグループと人格を持つ）
//! を、メイン会話とは独立した会話として実行する。
//!
//! ```yaml
//! math_agent:
//!   name: Math Agent
//!   identity: You are a careful calculator.
//!   tool_groups: [math]
//!   reasoning_effort: low
//!   max_iterations: 10
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::eyre;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tracing::{error, info, instrument, warn};

use crate::config::{ChatOptions, ReasoningEffort};
use crate::error::{ChatError, ChatResult};
use crate::openai::call::ChatClient;
use crate::openai::message::Message;
use crate::openai::tools::{ToolDefinition, ToolParametersBuilder};

/// サブ会話の温度（メインより低め）
pub const SUBTASK_TEMPERATURE: f32 = 0.3;
pub const SUBTASK_MAX_TOKENS: u32 = 1500;

fn default_reasoning_effort() -> ReasoningEffort {
    ReasoningEffort::Low
}

fn default_max_iterations() -> usize {
    10
}

/// エージェント 1 件分の定義
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentProfile {
    /// 表示名。省略時はエージェント種別キーを使う
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub tool_groups: Vec<String>,
    #[serde(default = "default_reasoning_effort")]
    pub reasoning_effort: ReasoningEffort,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl AgentProfile {
    /// このエージェントでサブ会話を回すときのオプション
    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            max_iterations: self.max_iterations,
            reasoning_effort: self.reasoning_effort,
            model_identity: (!self.identity.trim().is_empty()).then(|| self.identity.clone()),
            builtin_tools: None,
            temperature: SUBTASK_TEMPERATURE,
            max_tokens: SUBTASK_MAX_TOKENS,
            stream: false,
        }
    }
}

pub type AgentProfiles = BTreeMap<String, AgentProfile>;

pub fn parse_agents_yaml(text: &str) -> ChatResult<AgentProfiles> {
    if text.trim().is_empty() {
        return Ok(AgentProfiles::new());
    }
    serde_yaml::from_str(text).map_err(|e| ChatError::Agents { reason: format!("YAML parse error: {e}") })
}

/// ファイルが無ければ空の定義で続行する（警告のみ）
pub fn load_agents_from_yaml(path: &Path) -> ChatResult<AgentProfiles> {
    if !path.exists() {
        warn!(target: "subtask", path = %path.display(), "agents_config_missing_using_empty");
        return Ok(AgentProfiles::new());
    }
    let text = std::fs::read_to_string(path).map_err(|e| ChatError::Agents {
        reason: format!("cannot read {}: {e}", path.display()),
    })?;
    let profiles = parse_agents_yaml(&text)?;
    info!(target: "subtask", path = %path.display(), agents = profiles.len(), "agents_loaded");
    Ok(profiles)
}

/// サブタスクの実行結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtaskReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub agent_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub task_description: String,
}

impl SubtaskReport {
    /// `delegate_task` ツールがメインモデルに返す形
    pub fn to_tool_payload(&self) -> Value {
        let agent = self.agent_name.as_deref().unwrap_or(&self.agent_type);
        if self.success {
            json!({
                "status": "success",
                "agent": agent,
                "result": self.result.as_deref().unwrap_or(""),
                "task": self.task_description,
            })
        } else {
            json!({
                "status": "error",
                "agent": agent,
                "error": self.error.as_deref().unwrap_or(""),
                "task": self.task_description,
            })
        }
    }
}

/// エージェント定義とサブ会話用クライアントを持つ実行器
#[derive(Debug, Clone)]
pub struct SubtaskExecutor {
    client: ChatClient,
    profiles: AgentProfiles,
}

impl SubtaskExecutor {
    /// `client` のレジストリがサブエージェントから見えるツールの母集合になる
    pub fn new(client: ChatClient, profiles: AgentProfiles) -> Self {
        info!(target: "subtask", agents = profiles.len(), "subtask_executor_ready");
        Self { client, profiles }
    }

    pub fn available_agents(&self) -> Vec<&str> {
        self.profiles.keys().map(|k| k.as_str()).collect()
    }

    pub fn agent(&self, agent_type: &str) -> Option<&AgentProfile> {
        self.profiles.get(agent_type)
    }

    /// 指定エージェントで独立した会話を 1 回実行する。失敗もレポートとして返す。
    #[instrument(name = "subtask_execute", skip(self, task_description))]
    pub async fn execute(&self, agent_type: &str, task_description: &str) -> SubtaskReport {
        let Some(profile) = self.profiles.get(agent_type) else {
            let msg = format!(
                "unknown agent type: {agent_type}. available agents: {}",
                self.available_agents().join(", ")
            );
            error!(target: "subtask", agent_type, "{msg}");
            return SubtaskReport {
                success: false,
                result: None,
                error: Some(msg),
                agent_type: agent_type.to_string(),
                agent_name: None,
                task_description: task_description.to_string(),
            };
        };

        let agent_name = profile.name.clone().unwrap_or_else(|| agent_type.to_string());
        let tools = self.client.registry().tools_for_groups(profile.tool_groups.as_slice());
        info!(
            target: "subtask",
            agent = %agent_name,
            groups = ?profile.tool_groups,
            tools = tools.len(),
            task = %task_description,
            "subtask_started"
        );

        let client = self.client.clone().with_task_name(agent_name.clone());
        let messages = vec![Message::user(task_description)];
        let outcome = client.chat(messages, &tools, &profile.chat_options()).await;

        let mut report = SubtaskReport {
            success: false,
            result: None,
            error: None,
            agent_type: agent_type.to_string(),
            agent_name: Some(agent_name.clone()),
            task_description: task_description.to_string(),
        };
        match outcome {
            Ok(answer) => {
                if answer.is_iteration_limit_exceeded() {
                    warn!(target: "subtask", agent = %agent_name, "subtask_hit_iteration_limit");
                }
                info!(target: "subtask", agent = %agent_name, rounds = answer.tool_rounds, "subtask_finished");
                report.success = true;
                report.result = Some(answer.final_answer);
            }
            Err(e) => {
                error!(target: "subtask", agent = %agent_name, error = %e, "subtask_failed");
                report.error = Some(e.to_string());
            }
        }
        report
    }
}

fn string_arg<'a>(args: &'a Value, key: &str) -> color_eyre::Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| eyre!("missing required string parameter '{key}'"))
}

/// `delegate_task` ツールの名前
pub const DELEGATE_TOOL_NAME: &str = "delegate_task";

/// サブエージェントに委譲する `delegate_task` ツール
///
/// ツールはブロッキングプール上で呼ばれるので、`handle` でサブ会話を同期的に待つ。
pub fn build_delegate_task_tool(executor: Arc<SubtaskExecutor>, handle: Handle) -> ToolDefinition {
    let agents = executor.available_agents().join(", ");
    let description = format!(
        "Delegate a task to a specialised agent that has its own tools and identity. Available agents: {agents}"
    );
    let params = ToolParametersBuilder::new_object()
        .add_string("agent_type", Some("Agent to delegate to"))
        .required("agent_type")
        .add_string("task_description", Some("Clear description of what the agent must do"))
        .required("task_description")
        .build();

    ToolDefinition::new(
        DELEGATE_TOOL_NAME,
        description,
        params,
        Arc::new(move |v: &Value| {
            let agent_type = string_arg(v, "agent_type")?;
            let task = string_arg(v, "task_description")?;
            let report = handle.block_on(executor.execute(agent_type, task));
            Ok(report.to_tool_payload())
        }),
    )
}
