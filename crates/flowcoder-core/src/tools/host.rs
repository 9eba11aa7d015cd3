//! Port to an external tool-provider host
//!
//! The host runs outside this process and exposes extra tools through a
//! discovery/call interface. Its transport is not modelled here.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::registry::ToolDefinition;

#[async_trait]
pub trait ToolProviderHost: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String>;
}
