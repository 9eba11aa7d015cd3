//! Error types shared across the turn engine
//!
//! Tool failures are not errors here: they travel as `ToolResult` values and
//! end up in history. These types cover the conditions that leave a turn.

use thiserror::Error;

use crate::agent::orchestrator::Phase;
use crate::engine::EngineStatus;

/// Failures of a single engine handle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load model '{model}': {message}")]
    LoadFailed { model: String, message: String },

    #[error("model '{model}' is not loaded (status: {status})")]
    NotLoaded { model: String, status: EngineStatus },

    #[error("model '{model}' cannot {action} while {status}")]
    InvalidState {
        model: String,
        action: &'static str,
        status: EngineStatus,
    },

    #[error("generation failed on '{model}': {message}")]
    Generation { model: String, message: String },
}

/// Conditions that end a turn early.
///
/// Everything else (parse failures, guard rejections, declined confirmations,
/// tool failures, broken builds) is recorded in history and the turn goes on.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("turn interrupted before {phase} ({history_len} history entries kept)")]
    Interrupted { phase: Phase, history_len: usize },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("nothing to resume: the last turn was not interrupted")]
    NothingToResume,
}

/// Why a single `<tool_call>` block was skipped. Never leaves the parser.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("tool name is empty")]
    EmptyName,
}
