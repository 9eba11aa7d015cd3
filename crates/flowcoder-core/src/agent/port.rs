//! Interaction port: how the orchestrator reaches the human
//!
//! The orchestrator never touches a terminal directly. It reports progress
//! through [`InteractionPort::emit`] and suspends on the three blocking
//! interactions (batch approval, confirmation, free-text question).

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::protocol::ToolCall;

use super::events::{TurnEvent, TurnInput};
use super::queue::ApprovalMode;

#[async_trait]
pub trait InteractionPort: Send + Sync {
    /// Report progress. Never blocks.
    fn emit(&self, event: TurnEvent);

    /// One decision for a whole batch of proposed calls.
    async fn approve_batch(&self, calls: &[ToolCall]) -> ApprovalMode;

    /// Yes/no for a single dangerous call.
    async fn confirm(&self, description: &str) -> bool;

    /// Free-text answer to a question raised by a tool.
    async fn ask(&self, question: &str) -> String;
}

/// [`InteractionPort`] over a pair of channels.
///
/// Each blocking interaction emits an `Awaiting*` event and waits for the
/// matching [`TurnInput`]. A timeout, a `Cancel`, or a closed channel
/// resolves the interaction negatively.
pub struct ChannelPort {
    event_tx: mpsc::UnboundedSender<TurnEvent>,
    input_rx: Mutex<mpsc::UnboundedReceiver<TurnInput>>,
    timeout: Duration,
}

impl ChannelPort {
    /// Returns the port plus the front end's ends of both channels.
    pub fn new(
        timeout: Duration,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<TurnEvent>,
        mpsc::UnboundedSender<TurnInput>,
    ) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let port = Self {
            event_tx,
            input_rx: Mutex::new(input_rx),
            timeout,
        };
        (port, event_rx, input_tx)
    }

    async fn wait_for<T>(&self, fallback: T, pick: impl Fn(TurnInput) -> Option<T>) -> T {
        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut input_rx = self.input_rx.lock().await;

        loop {
            match tokio::time::timeout_at(deadline, input_rx.recv()).await {
                Ok(Some(TurnInput::Cancel)) => return fallback,
                Ok(Some(input)) => match pick(input) {
                    Some(value) => return value,
                    None => continue, // ignore unrelated inputs
                },
                Ok(None) => return fallback, // channel closed
                Err(_) => {
                    tracing::warn!(timeout_secs = self.timeout.as_secs(), "Interaction timed out");
                    self.emit(TurnEvent::Notice {
                        message: format!(
                            "No response after {} seconds",
                            self.timeout.as_secs()
                        ),
                    });
                    return fallback;
                }
            }
        }
    }
}

#[async_trait]
impl InteractionPort for ChannelPort {
    fn emit(&self, event: TurnEvent) {
        let _ = self.event_tx.send(event);
    }

    async fn approve_batch(&self, calls: &[ToolCall]) -> ApprovalMode {
        self.emit(TurnEvent::CommandsProposed {
            calls: calls.to_vec(),
        });
        self.emit(TurnEvent::AwaitingApproval { count: calls.len() });
        self.wait_for(ApprovalMode::Abort, |input| match input {
            TurnInput::Approval(mode) => Some(mode),
            _ => None,
        })
        .await
    }

    async fn confirm(&self, description: &str) -> bool {
        self.emit(TurnEvent::AwaitingConfirmation {
            description: description.to_string(),
        });
        self.wait_for(false, |input| match input {
            TurnInput::Confirmation(approved) => Some(approved),
            _ => None,
        })
        .await
    }

    async fn ask(&self, question: &str) -> String {
        self.emit(TurnEvent::AwaitingAnswer {
            question: question.to_string(),
        });
        self.wait_for(String::new(), |input| match input {
            TurnInput::Answer(text) => Some(text),
            _ => None,
        })
        .await
    }
}
