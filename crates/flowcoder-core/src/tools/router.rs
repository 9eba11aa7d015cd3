//! Tool execution router: built-in tools first, then the external host

use std::sync::Arc;

use crate::agent::guard::is_dangerous;
use crate::protocol::ToolCall;

use super::host::ToolProviderHost;
use super::registry::{tool_category, ToolCategory, ToolContext, ToolDefinition, ToolRegistry};
use super::ToolResult;

pub struct ToolRouter {
    registry: Arc<ToolRegistry>,
    ctx: ToolContext,
    host: Option<Arc<dyn ToolProviderHost>>,
    host_tools: Vec<ToolDefinition>,
}

impl ToolRouter {
    pub fn new(registry: Arc<ToolRegistry>, ctx: ToolContext) -> Self {
        Self {
            registry,
            ctx,
            host: None,
            host_tools: Vec::new(),
        }
    }

    /// Attach a tool-provider host and cache its tool list.
    ///
    /// A host that fails to list its tools is kept attached with no tools.
    pub async fn with_host(mut self, host: Arc<dyn ToolProviderHost>) -> Self {
        self.host_tools = match host.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                tracing::warn!(error = %e, "Tool host failed to list tools");
                Vec::new()
            }
        };
        tracing::info!(count = self.host_tools.len(), "Attached tool host");
        self.host = Some(host);
        self
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    fn is_host_tool(&self, name: &str) -> bool {
        self.host_tools.iter().any(|t| t.name == name)
    }

    /// Whether a call may run without approval during context gathering.
    ///
    /// Tools on the dangerous list never qualify, wherever they come from.
    pub async fn is_read_only(&self, name: &str) -> bool {
        if is_dangerous(name) {
            return false;
        }
        if self.registry.contains(name).await {
            return tool_category(name) == ToolCategory::ReadOnly;
        }
        self.is_host_tool(name)
    }

    /// Built-in definitions followed by host definitions.
    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs = self.registry.definitions().await;
        for tool in &self.host_tools {
            if !defs.iter().any(|d| d.name == tool.name) {
                defs.push(tool.clone());
            }
        }
        defs
    }

    /// Run a call. Never fails: every outcome is a [`ToolResult`].
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let params = call.parameters_value();
        if let Some(result) = self.registry.execute(&call.name, params.clone(), &self.ctx).await {
            return result;
        }

        if let Some(host) = self.host.as_ref().filter(|_| self.is_host_tool(&call.name)) {
            tracing::debug!(tool = %call.name, "Forwarding call to tool host");
            return match host.call_tool(&call.name, params).await {
                Ok(output) => ToolResult::success(output),
                Err(e) => ToolResult::error(e),
            };
        }

        tracing::warn!(tool = %call.name, "Unknown tool");
        ToolResult::not_found(&call.name)
    }
}
