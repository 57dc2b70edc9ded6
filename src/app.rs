//! アプリケーション組み立て（設定 → ツールレジストリ → クライアント）

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::config::{ChatConfig, ChatOptions};
use crate::error::ChatResult;
use crate::openai::call::{ChatClient, OpenAiTransport, Transport};
use crate::openai::tools::{initialize_tool_groups, sample_registry, ToolDescriptor, ToolRegistry};
use crate::subtask::{build_delegate_task_tool, load_agents_from_yaml, SubtaskExecutor, DELEGATE_TOOL_NAME};

/// 起動時に一度だけ作る実行部品一式
#[derive(Debug, Clone)]
pub struct App {
    pub client: ChatClient,
    /// メイン会話でモデルに見せるツール
    pub tools: Vec<ToolDescriptor>,
    pub options: ChatOptions,
    pub executor: Option<Arc<SubtaskExecutor>>,
}

impl App {
    /// OpenAI 互換エンドポイントに接続する構成
    pub fn build(config: &ChatConfig, handle: Handle) -> ChatResult<Self> {
        let transport: Arc<dyn Transport> = Arc::new(OpenAiTransport::from_config(config));
        Self::build_with_transport(config, transport, handle)
    }

    /// 任意の transport で組み立てる（テストではモックを渡す）
    ///
    /// エージェント定義が 1 件以上あれば `delegate_task` をメイン側にだけ登録する。
    /// サブエージェント自身は委譲できない。
    pub fn build_with_transport(config: &ChatConfig, transport: Arc<dyn Transport>, handle: Handle) -> ChatResult<Self> {
        let mut registry = sample_registry();
        if config.tool_groups_path.exists() {
            initialize_tool_groups(&mut registry, &config.tool_groups_path)?;
        } else {
            warn!(target: "tools", path = %config.tool_groups_path.display(), "tool_groups_file_missing");
        }

        let profiles = load_agents_from_yaml(&config.agents_path)?;
        let executor = if profiles.is_empty() {
            None
        } else {
            let sub_client = ChatClient::new(Arc::clone(&transport), Arc::new(registry.clone()), config.model.clone())
                .with_parallel_tool_calls(config.parallel_tool_calls);
            let executor = Arc::new(SubtaskExecutor::new(sub_client, profiles));
            registry.register(build_delegate_task_tool(Arc::clone(&executor), handle));
            Some(executor)
        };

        let client = ChatClient::new(transport, Arc::new(registry), config.model.clone())
            .with_task_name(config.task_name.clone())
            .with_parallel_tool_calls(config.parallel_tool_calls);
        let tools = main_tools(client.registry(), config.main_tool_groups.as_deref());
        info!(
            target: "openai",
            model = %config.model,
            api_base = %config.api_base,
            tools = tools.len(),
            agents = executor.as_ref().map(|e| e.available_agents().len()).unwrap_or(0),
            "app_ready"
        );

        Ok(Self { client, tools, options: config.options.clone(), executor })
    }
}

/// メイン会話のツール一覧。グループ指定がなければ全ツール。
/// 指定があればその和集合に `delegate_task`（登録済みなら）を足す。
fn main_tools(registry: &ToolRegistry, groups: Option<&[String]>) -> Vec<ToolDescriptor> {
    let Some(groups) = groups else {
        return registry.get_all_tools();
    };
    let (_, unknown) = registry.validate_groups(groups);
    if !unknown.is_empty() {
        warn!(target: "tools", ?unknown, available = ?registry.available_groups(), "unknown_main_tool_groups");
    }
    let mut tools = registry.tools_for_groups(groups);
    if let Some(delegate) = registry.get(DELEGATE_TOOL_NAME) {
        if !tools.iter().any(|t| t.name == DELEGATE_TOOL_NAME) {
            tools.push(delegate.descriptor().clone());
        }
    }
    tools
}
