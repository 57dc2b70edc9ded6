use std::sync::Arc;
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use serde_json::{json, Map, Value};
use color_eyre::Result;

/// ランタイムで実行するツール関数の型。
/// 引数(JSON object)を受け取り、結果(JSON)を返す。
pub type ToolHandler = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync + 'static>;

/// JSON Schema の `object` 型パラメータ定義
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameters(Value);

impl ToolParameters {
    pub fn as_value(&self) -> &Value { &self.0 }

    /// `required` に列挙されたプロパティ名
    pub fn required(&self) -> Vec<&str> {
        self.0
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}

/// `ToolParameters` を組み立てるビルダー。
/// プロパティ追加順はそのまま JSON に残る。
#[derive(Debug, Clone)]
pub struct ToolParametersBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
    additional_properties: Option<bool>,
}

impl ToolParametersBuilder {
    pub fn new_object() -> Self {
        Self { properties: Map::new(), required: Vec::new(), additional_properties: None }
    }

    fn add_property(mut self, name: &str, mut schema: Map<String, Value>, description: Option<&str>) -> Self {
        if let Some(d) = description {
            schema.insert("description".into(), Value::String(d.to_string()));
        }
        self.properties.insert(name.to_string(), Value::Object(schema));
        self
    }

    fn typed(ty: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("type".into(), Value::String(ty.to_string()));
        m
    }

    pub fn add_string(self, name: &str, description: Option<&str>) -> Self {
        self.add_property(name, Self::typed("string"), description)
    }

    pub fn add_string_enum(self, name: &str, description: Option<&str>, allowed: &[&str]) -> Self {
        let mut schema = Self::typed("string");
        schema.insert("enum".into(), json!(allowed));
        self.add_property(name, schema, description)
    }

    pub fn add_number(self, name: &str, description: Option<&str>) -> Self {
        self.add_property(name, Self::typed("number"), description)
    }

    pub fn add_integer(self, name: &str, description: Option<&str>, min: Option<i64>, max: Option<i64>) -> Self {
        let mut schema = Self::typed("integer");
        if let Some(min) = min {
            schema.insert("minimum".into(), json!(min));
        }
        if let Some(max) = max {
            schema.insert("maximum".into(), json!(max));
        }
        self.add_property(name, schema, description)
    }

    /// 既に追加したプロパティにデフォルト値を付ける（未追加なら何もしない）
    pub fn default_value(mut self, name: &str, value: Value) -> Self {
        if let Some(Value::Object(schema)) = self.properties.get_mut(name) {
            schema.insert("default".into(), value);
        }
        self
    }

    pub fn required(mut self, name: &str) -> Self {
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn additional_properties(mut self, allowed: bool) -> Self {
        self.additional_properties = Some(allowed);
        self
    }

    pub fn build(self) -> ToolParameters {
        let mut root = Map::new();
        root.insert("type".into(), Value::String("object".into()));
        root.insert("properties".into(), Value::Object(self.properties));
        root.insert("required".into(), json!(self.required));
        if let Some(ap) = self.additional_properties {
            root.insert("additionalProperties".into(), Value::Bool(ap));
        }
        ToolParameters(Value::Object(root))
    }
}

/// モデルに見せるツールの説明（名前・説明・引数スキーマ）。
/// リクエストごとにそのまま送られる。
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
    pub strict: bool,
}

impl ToolDescriptor {
    /// OpenAI SDK の `FunctionObject` に変換
    pub fn function_object(&self) -> FunctionObject {
        FunctionObject {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            parameters: Some(self.parameters.as_value().clone()),
            strict: Some(self.strict),
        }
    }

    /// ChatCompletionTool 形式（APIへ渡す vector 用）
    pub fn as_chat_tool(&self) -> ChatCompletionTool {
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: self.function_object(),
        }
    }
}

/// function calling に渡す説明と実行ハンドラをまとめた定義。
#[derive(Clone)]
pub struct ToolDefinition {
    descriptor: ToolDescriptor,
    handler: ToolHandler,
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl ToolDefinition {
    /// 新規作成
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: ToolHandler,
    ) -> Self {
        let descriptor = ToolDescriptor {
            name: name.into(),
            description: description.into(),
            parameters,
            strict: false,
        };
        Self { descriptor, handler }
    }

    pub fn name(&self) -> &str { &self.descriptor.name }

    pub fn descriptor(&self) -> &ToolDescriptor { &self.descriptor }

    /// ツールを実行
    pub fn execute(&self, args: &Value) -> Result<Value> {
        (self.handler)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition_executes_closure() -> Result<()> {
        let params = ToolParametersBuilder::new_object()
            .add_property("payload", ToolParametersBuilder::typed("object"), None)
            .required("payload")
            .build();
        let tool = ToolDefinition::new(
            "echo_keys",
            "Return number of keys in object",
            params,
            Arc::new(|v| {
                let obj = v.get("payload").and_then(|p| p.as_object()).ok_or_else(|| color_eyre::eyre::eyre!("missing payload object"))?;
                Ok(json!({ "len": obj.len() }))
            })
        );

        let out = tool.execute(&json!({"payload": {"a": 1, "b": 2}}))?;
        assert_eq!(out["len"], 2);
        assert!(tool.execute(&json!({})).is_err());

        // Chat tool conversion sanity check
        let chat_tool = tool.descriptor().as_chat_tool();
        assert_eq!(chat_tool.function.name, "echo_keys");
        assert_eq!(chat_tool.function.strict, Some(false));
        Ok(())
    }

    #[test]
    fn builder_emits_object_schema() {
        let params = ToolParametersBuilder::new_object()
            .add_number("min_value", Some("lower bound"))
            .default_value("min_value", json!(0))
            .add_string_enum("operation", None, &["add", "subtract"])
            .add_integer("count", Some("how many"), Some(1), Some(10))
            .required("operation")
            .required("operation")
            .additional_properties(false)
            .build();
        let v = params.as_value();
        assert_eq!(v["type"], "object");
        assert_eq!(v["properties"]["min_value"]["default"], 0);
        assert_eq!(v["properties"]["min_value"]["description"], "lower bound");
        assert_eq!(v["properties"]["operation"]["enum"], json!(["add", "subtract"]));
        assert_eq!(v["properties"]["count"]["maximum"], 10);
        assert_eq!(v["additionalProperties"], false);
        assert_eq!(params.required(), vec!["operation"]);
    }

    #[test]
    fn chat_tool_serializes_as_function() {
        let tool = ToolDefinition::new(
            "noop",
            "does nothing",
            ToolParametersBuilder::new_object().build(),
            Arc::new(|_| Ok(Value::Null)),
        );
        let v = serde_json::to_value(tool.descriptor().as_chat_tool()).unwrap();
        assert_eq!(v["type"], "function");
        assert_eq!(v["function"]["name"], "noop");
        assert_eq!(v["function"]["parameters"]["type"], "object");
    }
}
