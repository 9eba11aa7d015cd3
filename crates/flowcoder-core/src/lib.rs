//! FlowCoder core: turn orchestration for a local, tool-using coding assistant
//!
//! - `agent` - Turn orchestrator, agent registry, guard, approval queue
//! - `engine` - Single-flight engine lifecycle and the llama-server backend
//! - `protocol` - `<tool_call>` parsing and `<tool_result>` formatting
//! - `tools` - Built-in tool table and the tool router
//! - `project` - Command discovery, code metrics, session store

pub mod agent;
pub mod config;
pub mod engine;
pub mod error;
pub mod paths;
pub mod process;
pub mod project;
pub mod protocol;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{FlowConfig, Residency};
pub use error::{EngineError, ProtocolError, TurnError};
pub use protocol::ToolCall;
