//! Tools module aggregator.
//!
//! Definitions and the schema builder live in `definition`, the name lookup in
//! `registry`, YAML grouping in `groups`, and the bundled example tools in
//! `sample_tools`.

mod definition; // ToolDefinition, ToolDescriptor, ToolParameters, builders
mod registry;
mod groups;
mod sample_tools;

pub use definition::{
    ToolDefinition,
    ToolDescriptor,
    ToolHandler,
    ToolParameters,
    ToolParametersBuilder,
};
pub use registry::{InvokeError, ToolRegistry};
pub use groups::{initialize_tool_groups, load_groups_from_yaml, parse_groups_yaml, ToolGroups};
pub use sample_tools::{
    build_calculate_tool,
    build_current_time_tool,
    build_random_number_tool,
    sample_registry,
};
