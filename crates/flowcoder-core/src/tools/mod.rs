//! Tools: registry, built-in implementations, external host port and router

pub mod host;
pub mod implementations;
pub mod path_utils;
pub mod registry;
pub mod router;

pub use host::ToolProviderHost;
pub use implementations::register_builtin_tools;
pub use registry::{parse_params, ToolContext, ToolDefinition, ToolRegistry, ToolResult};
pub use router::ToolRouter;
