use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::openai::message::ToolCallRequest;
use crate::openai::tools::{InvokeError, ToolRegistry};

use super::types::{ToolResult, ToolStatus};

/// 引数テキストを JSON オブジェクトとして解釈する（空白のみは `{}` 扱い）
fn parse_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ Value::Object(_)) => Ok(v),
        Ok(other) => Err(format!("expected a JSON object, got {}", other)),
        Err(e) => Err(e.to_string()),
    }
}

/// 成功値をモデルに返すテキストへ変換: 文字列はそのまま、それ以外はコンパクト JSON
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn error_payload(message: String) -> String {
    json!({ "error": message }).to_string()
}

fn failure(call: &ToolCallRequest, status: ToolStatus, message: String) -> ToolResult {
    warn!(target: "tools", tool = %call.name, id = %call.id, ?status, error = %message, "tool_call_failed");
    ToolResult {
        tool_call_id: call.id.clone(),
        name: call.name.clone(),
        content: error_payload(message),
        status,
    }
}

/// 1 件のツール呼び出しを実行し、必ず `ToolResult` を返す（エラーも結果として包む）
///
/// 順序: 引数パース → ツール解決 → 実行。
pub fn execute(call: &ToolCallRequest, registry: &ToolRegistry) -> ToolResult {
    let args = match parse_arguments(&call.arguments) {
        Ok(v) => v,
        Err(e) => return failure(call, ToolStatus::InvalidArguments, format!("invalid arguments: {e}")),
    };

    match registry.invoke(&call.name, &args) {
        Ok(value) => {
            let content = render_value(&value);
            debug!(target: "tools", tool = %call.name, id = %call.id, len = content.len(), "tool_call_succeeded");
            ToolResult {
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
                content,
                status: ToolStatus::Success,
            }
        }
        Err(InvokeError::UnknownTool(name)) => failure(call, ToolStatus::UnknownTool, format!("unknown tool: {name}")),
        Err(InvokeError::Failed(e)) => {
            failure(call, ToolStatus::ExecutionFailed, format!("tool execution failed: {e}"))
        }
    }
}

/// 実行せずに閉じる呼び出しの結果。履歴上 assistant の tool_calls に必ず応答を付けるために使う。
pub fn not_executed(call: &ToolCallRequest, reason: &str) -> ToolResult {
    failure(call, ToolStatus::NotExecuted, format!("not executed: {reason}"))
}

/// ブロッキングプール上で 1 件実行する。ハンドラの panic は実行失敗として扱う。
async fn execute_blocking(call: ToolCallRequest, registry: Arc<ToolRegistry>) -> ToolResult {
    let fallback = call.clone();
    match tokio::task::spawn_blocking(move || execute(&call, &registry)).await {
        Ok(result) => result,
        Err(join_err) => failure(
            &fallback,
            ToolStatus::ExecutionFailed,
            format!("tool execution failed: {join_err}"),
        ),
    }
}

/// 複数のツール呼び出しを実行し、要求順で結果を返す
///
/// `parallel` のときは全件を同時に投げてすべて待つ（バリア）。そうでなければ順番に 1 件ずつ。
#[instrument(name = "execute_tool_calls", skip(calls, registry), fields(count = calls.len()))]
pub async fn execute_all(calls: Vec<ToolCallRequest>, registry: Arc<ToolRegistry>, parallel: bool) -> Vec<ToolResult> {
    if parallel {
        let futures = calls
            .into_iter()
            .map(|call| execute_blocking(call, Arc::clone(&registry)));
        join_all(futures).await
    } else {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(execute_blocking(call, Arc::clone(&registry)).await);
        }
        results
    }
}
