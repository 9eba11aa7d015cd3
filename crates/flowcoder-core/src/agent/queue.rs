//! Command queue and batch approval

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::ToolCall;

use super::guard;

/// One approval decision per batch of proposed commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Run everything; dangerous confirmations are pre-approved.
    All,
    /// Run in order, confirming each dangerous call.
    Step,
    /// Drop the batch.
    Abort,
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalMode::All => write!(f, "all"),
            ApprovalMode::Step => write!(f, "step"),
            ApprovalMode::Abort => write!(f, "abort"),
        }
    }
}

impl ApprovalMode {
    /// Parse a human answer (`a`/`all`, `s`/`step`, anything else aborts).
    pub fn from_answer(answer: &str) -> Self {
        match answer.trim().to_ascii_lowercase().as_str() {
            "a" | "all" | "y" | "yes" => ApprovalMode::All,
            "s" | "step" => ApprovalMode::Step,
            _ => ApprovalMode::Abort,
        }
    }
}

/// Calls from one agent response, drained strictly in parse order.
#[derive(Debug)]
pub struct CommandQueue {
    pending: VecDeque<ToolCall>,
    mode: ApprovalMode,
}

impl CommandQueue {
    pub fn new(calls: Vec<ToolCall>, mode: ApprovalMode) -> Self {
        let pending = if mode == ApprovalMode::Abort {
            VecDeque::new()
        } else {
            calls.into()
        };
        Self { pending, mode }
    }

    pub fn mode(&self) -> ApprovalMode {
        self.mode
    }

    pub fn pop_next(&mut self) -> Option<ToolCall> {
        self.pending.pop_front()
    }

    /// Drop every remaining call, returning how many were dropped.
    pub fn discard_remaining(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether `call` needs an individual human confirmation in this batch.
    pub fn needs_confirmation(&self, call: &ToolCall) -> bool {
        self.mode == ApprovalMode::Step && guard::is_dangerous(&call.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn calls() -> Vec<ToolCall> {
        vec![
            ToolCall::new("write_file", json!({ "path": "a" })),
            ToolCall::new("run_cmd", json!({ "command": "ls" })),
            ToolCall::new("patch_file", json!({ "path": "b" })),
        ]
    }

    #[test]
    fn drains_in_order() {
        let mut queue = CommandQueue::new(calls(), ApprovalMode::All);
        let names: Vec<String> = std::iter::from_fn(|| queue.pop_next())
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["write_file", "run_cmd", "patch_file"]);
    }

    #[test]
    fn abort_holds_nothing() {
        let mut queue = CommandQueue::new(calls(), ApprovalMode::Abort);
        assert!(queue.is_empty());
        assert!(queue.pop_next().is_none());
    }

    #[test]
    fn discard_reports_dropped_count() {
        let mut queue = CommandQueue::new(calls(), ApprovalMode::Step);
        queue.pop_next();
        assert_eq!(queue.discard_remaining(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn confirmation_only_in_step_mode_for_dangerous_tools() {
        let shell = ToolCall::new("run_cmd", json!({ "command": "ls" }));
        let write = ToolCall::new("write_file", json!({ "path": "a" }));
        let step = CommandQueue::new(vec![], ApprovalMode::Step);
        let all = CommandQueue::new(vec![], ApprovalMode::All);
        assert!(step.needs_confirmation(&shell));
        assert!(!step.needs_confirmation(&write));
        assert!(!all.needs_confirmation(&shell));
    }

    #[test]
    fn answers_map_to_modes() {
        assert_eq!(ApprovalMode::from_answer(" A "), ApprovalMode::All);
        assert_eq!(ApprovalMode::from_answer("step"), ApprovalMode::Step);
        assert_eq!(ApprovalMode::from_answer(""), ApprovalMode::Abort);
        assert_eq!(ApprovalMode::from_answer("nope"), ApprovalMode::Abort);
    }
}
