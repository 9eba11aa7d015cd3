//! Per-call tool execution for the turn loop.
//!
//! Handles:
//! - Guard validation (every call, before anything runs)
//! - Dangerous-tool confirmation when the batch runs in step mode
//! - Routing to built-in or host tools via `ToolRouter::execute()`
//! - The pause sentinel: ask the human and return their answer as the result
//! - Output truncation before anything enters history

use std::sync::Arc;

use crate::protocol::{pause_question, ToolCall};
use crate::tools::{ToolResult, ToolRouter};

use super::events::TurnEvent;
use super::guard::CommandGuard;
use super::port::InteractionPort;

/// Outcome of one queued call.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub call: ToolCall,
    pub result: ToolResult,
    /// False when the guard or the human stopped the call.
    pub executed: bool,
}

pub struct ToolExecutor {
    guard: CommandGuard,
    router: Arc<ToolRouter>,
    max_output_chars: usize,
}

impl ToolExecutor {
    pub fn new(guard: CommandGuard, router: Arc<ToolRouter>, max_output_chars: usize) -> Self {
        Self {
            guard,
            router,
            max_output_chars,
        }
    }

    pub fn guard(&self) -> &CommandGuard {
        &self.guard
    }

    pub fn router(&self) -> &Arc<ToolRouter> {
        &self.router
    }

    pub fn max_output_chars(&self) -> usize {
        self.max_output_chars
    }

    /// Validate, optionally confirm, and run a single call.
    ///
    /// Never fails: rejections, declines and tool errors come back as
    /// [`ToolResult`] values for the history.
    pub async fn execute(
        &self,
        call: &ToolCall,
        needs_confirmation: bool,
        port: &dyn InteractionPort,
    ) -> ExecutionRecord {
        let validation = self.guard.validate(call);
        if !validation.safe {
            let reason = validation.reason.unwrap_or_default();
            tracing::warn!(tool = %call.name, reason = %reason, "Guard rejected tool call");
            port.emit(TurnEvent::ToolRejected {
                name: call.name.clone(),
                reason: reason.clone(),
            });
            return self.skipped(call, ToolResult::rejected(&reason));
        }

        if needs_confirmation && !self.guard.confirm(port, call).await {
            tracing::info!(tool = %call.name, "User declined tool call");
            port.emit(TurnEvent::ToolRejected {
                name: call.name.clone(),
                reason: "declined by user".to_string(),
            });
            return self.skipped(call, ToolResult::declined(&call.name));
        }

        port.emit(TurnEvent::ToolExecuting {
            name: call.name.clone(),
        });
        tracing::debug!(tool = %call.name, "Executing tool");

        let mut result = self.router.execute(call).await;

        if let Some(question) = pause_question(&result.output) {
            let answer = port.ask(question).await;
            tracing::debug!(tool = %call.name, "Resumed after human answer");
            result = ToolResult::success(format!("User answered: {}", answer.trim()));
        }

        result.output = truncate_output(&result.output, self.max_output_chars);
        port.emit(TurnEvent::ToolResult {
            name: call.name.clone(),
            output: result.output.clone(),
            is_error: result.is_error,
        });

        ExecutionRecord {
            call: call.clone(),
            result,
            executed: true,
        }
    }

    fn skipped(&self, call: &ToolCall, result: ToolResult) -> ExecutionRecord {
        ExecutionRecord {
            call: call.clone(),
            result,
            executed: false,
        }
    }
}

/// Cap `output` at `max_chars` bytes, cutting on a line boundary.
pub(crate) fn truncate_output(output: &str, max_chars: usize) -> String {
    if output.len() <= max_chars {
        return output.to_string();
    }

    let truncated_len = floor_char_boundary(output, max_chars);
    let truncated = &output[..truncated_len];
    let break_point = truncated.rfind('\n').unwrap_or(truncated_len);
    let clean = &output[..break_point];
    format!(
        "{}\n\n[... OUTPUT TRUNCATED: {} chars -> {} chars ...]",
        clean,
        output.len(),
        clean.len()
    )
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut boundary = index.min(text.len());
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}
