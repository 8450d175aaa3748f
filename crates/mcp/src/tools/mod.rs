pub mod search;
mod registry;

pub use registry::{
    json_schema_integer, json_schema_object, json_schema_string, Tool, ToolRegistry,
};
pub use search::{SearchMercariTool, SEARCH_TOOL_NAME};
