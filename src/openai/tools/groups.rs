//! Tool group configuration (`config/tool_groups.yaml`).
//!
//! ```yaml
//! math: [calculate, get_random_number]
//! clock: [get_current_time]
//! ```

use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{ChatError, ChatResult};
use super::registry::ToolRegistry;

pub type ToolGroups = HashMap<String, Vec<String>>;

/// Parse group YAML. The root must be a map whose values are lists of names.
pub fn parse_groups_yaml(text: &str) -> ChatResult<ToolGroups> {
    let raw: serde_yaml::Value = serde_yaml::from_str(text)
        .map_err(|e| ChatError::ToolGroups { reason: format!("YAML parse error: {e}") })?;
    let map = raw
        .as_mapping()
        .ok_or_else(|| ChatError::ToolGroups { reason: "root element must be a mapping".into() })?;

    let mut groups = ToolGroups::new();
    for (key, value) in map {
        let group = key
            .as_str()
            .ok_or_else(|| ChatError::ToolGroups { reason: "group names must be strings".into() })?;
        let list = value.as_sequence().ok_or_else(|| ChatError::ToolGroups {
            reason: format!("group '{group}' must be a list"),
        })?;
        let names = list
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| ChatError::ToolGroups {
                    reason: format!("group '{group}' contains a non-string entry"),
                })
            })
            .collect::<ChatResult<Vec<_>>>()?;
        groups.insert(group.to_string(), names);
    }
    Ok(groups)
}

pub fn load_groups_from_yaml(path: &Path) -> ChatResult<ToolGroups> {
    let text = std::fs::read_to_string(path).map_err(|e| ChatError::ToolGroups {
        reason: format!("cannot read {}: {e}", path.display()),
    })?;
    parse_groups_yaml(&text)
}

/// Load groups from `path` into the registry and return them.
pub fn initialize_tool_groups(registry: &mut ToolRegistry, path: &Path) -> ChatResult<ToolGroups> {
    let groups = load_groups_from_yaml(path)?;
    info!(target: "tools", path = %path.display(), groups = groups.len(), "tool_groups_loaded");
    registry.set_groups(groups.clone());
    Ok(groups)
}
