//! Event protocol between the turn orchestrator and a front end.
//!
//! `TurnEvent` is everything the orchestrator reports while a turn runs.
//! `TurnInput` is what a front end sends back when the orchestrator is
//! waiting on a human (batch approval, confirmation, free-text answer).

use serde::Serialize;

use crate::protocol::ToolCall;

use super::queue::ApprovalMode;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    // ── Phases ─────────────────────────────────────────────────────────
    /// A new orchestration phase started.
    Phase { phase: String },

    /// An agent is about to be invoked.
    AgentStarted { agent: String },

    /// Text produced by the dispatcher or a worker agent.
    AgentOutput { agent: String, text: String },

    /// Background or explicit engine loading.
    EngineLoading { model: String },

    // ── Tool lifecycle ─────────────────────────────────────────────────
    /// Proposed commands waiting for batch approval.
    CommandsProposed { calls: Vec<ToolCall> },

    /// A tool is executing.
    ToolExecuting { name: String },

    /// A tool completed (output already capped).
    ToolResult {
        name: String,
        output: String,
        is_error: bool,
    },

    /// A call was rejected by the guard or the human.
    ToolRejected { name: String, reason: String },

    // ── Verification ───────────────────────────────────────────────────
    /// Verification command started.
    Verifying { command: String },

    /// Verification finished.
    VerificationResult { success: bool, output: String },

    /// Failure escalated to the diagnostic agent.
    Escalated { diagnosis: String },

    /// Remaining queued commands were dropped.
    QueueDiscarded { count: usize },

    // ── Interaction ────────────────────────────────────────────────────
    /// Waiting for `TurnInput::Approval`.
    AwaitingApproval { count: usize },

    /// Waiting for `TurnInput::Confirmation`.
    AwaitingConfirmation { description: String },

    /// Waiting for `TurnInput::Answer`.
    AwaitingAnswer { question: String },

    // ── Turn lifecycle ─────────────────────────────────────────────────
    /// Informational notice (e.g. round limit reached).
    Notice { message: String },

    /// The turn finished.
    TurnComplete { rounds: usize },

    /// An error ended the turn.
    Error { error: String },
}

/// External inputs a front end sends back to a waiting orchestrator.
#[derive(Debug, Clone)]
pub enum TurnInput {
    Approval(ApprovalMode),
    Confirmation(bool),
    Answer(String),
    Cancel,
}
