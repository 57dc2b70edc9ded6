//! Name → tool lookup, built once at startup and read-only afterwards.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::definition::{ToolDefinition, ToolDescriptor};

/// Why a registry invocation did not produce a value.
#[derive(Debug)]
pub enum InvokeError {
    UnknownTool(String),
    Failed(color_eyre::Report),
}

/// Registered tools in registration order, plus optional named groups.
///
/// Registering a name twice replaces the earlier definition but keeps its
/// original position. Cloning is cheap: handlers are behind `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolDefinition>,
    groups: HashMap<String, Vec<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolDefinition) -> &mut Self {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(target: "tools", tool = %name, "tool_registered_twice_replacing");
        } else {
            debug!(target: "tools", tool = %name, "tool_registered");
        }
        self
    }

    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(|k| k.as_str())
    }

    /// Descriptors of every registered tool, in registration order.
    pub fn get_all_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor().clone()).collect()
    }

    /// Run the named tool with already-parsed arguments.
    pub fn invoke(&self, name: &str, args: &Value) -> Result<Value, InvokeError> {
        let tool = self.get(name).ok_or_else(|| InvokeError::UnknownTool(name.to_string()))?;
        tool.execute(args).map_err(InvokeError::Failed)
    }

    /// Replace the group table (`group -> [tool names]`).
    pub fn set_groups(&mut self, groups: HashMap<String, Vec<String>>) {
        self.groups = groups;
    }

    pub fn available_groups(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.keys().cloned().collect();
        names.sort();
        names
    }

    /// Descriptors for the union of the given groups, without duplicates and in
    /// registration order. Unknown groups and unregistered names are skipped.
    pub fn tools_for_groups<S: AsRef<str>>(&self, group_names: &[S]) -> Vec<ToolDescriptor> {
        let wanted: Vec<&str> = group_names
            .iter()
            .filter_map(|g| self.groups.get(g.as_ref()))
            .flatten()
            .map(|s| s.as_str())
            .collect();
        self.tools
            .values()
            .filter(|t| wanted.contains(&t.name()))
            .map(|t| t.descriptor().clone())
            .collect()
    }

    /// Split group names into (known, unknown).
    pub fn validate_groups<S: AsRef<str>>(&self, group_names: &[S]) -> (Vec<String>, Vec<String>) {
        group_names
            .iter()
            .map(|g| g.as_ref().to_string())
            .partition(|g| self.groups.contains_key(g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::tools::ToolParametersBuilder;
    use serde_json::json;
    use std::sync::Arc;

    fn constant_tool(name: &str, value: i64) -> ToolDefinition {
        ToolDefinition::new(
            name,
            "returns a constant",
            ToolParametersBuilder::new_object().build(),
            Arc::new(move |_| Ok(json!(value))),
        )
    }

    fn sample_registry() -> ToolRegistry {
        let mut reg = ToolRegistry::new();
        reg.register(constant_tool("a", 1))
            .register(constant_tool("b", 2))
            .register(constant_tool("c", 3));
        reg.set_groups(HashMap::from([
            ("first".to_string(), vec!["a".to_string(), "b".to_string()]),
            ("second".to_string(), vec!["b".to_string(), "c".to_string(), "ghost".to_string()]),
        ]));
        reg
    }

    #[test]
    fn get_all_tools_keeps_registration_order() {
        let names: Vec<String> = sample_registry().get_all_tools().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn invoke_known_and_unknown() {
        let reg = sample_registry();
        assert_eq!(reg.invoke("b", &json!({})).unwrap(), json!(2));
        assert!(matches!(reg.invoke("zzz", &json!({})), Err(InvokeError::UnknownTool(ref n)) if n == "zzz"));
    }

    #[test]
    fn register_twice_replaces_in_place() {
        let mut reg = sample_registry();
        reg.register(constant_tool("a", 10));
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.names().next(), Some("a"));
        assert_eq!(reg.invoke("a", &json!({})).unwrap(), json!(10));
    }

    #[test]
    fn groups_union_is_deduplicated() {
        let reg = sample_registry();
        let names: Vec<String> = reg
            .tools_for_groups(&["second", "first", "missing"])
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn validate_groups_splits_names() {
        let reg = sample_registry();
        let (valid, invalid) = reg.validate_groups(&["first", "nope"]);
        assert_eq!(valid, vec!["first"]);
        assert_eq!(invalid, vec!["nope"]);
        assert_eq!(reg.available_groups(), vec!["first", "second"]);
    }
}
