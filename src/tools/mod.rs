//! Tool interfaces: handler trait, registry, validation and labels.

pub mod describe;
pub mod registry;
pub mod tool;
pub mod validation;

pub use describe::describe_tool_use;
pub use registry::ToolRegistry;
pub use tool::{FnTool, ToolContext, ToolHandler};
