//! Headless mode: JSON lines over stdio
//!
//! Every `TurnEvent` is written to stdout as one JSON object. Stdin carries
//! one [`ClientMessage`] per line: new turns, resumes, interrupts, and the
//! replies a waiting turn asks for. Logs go to the log file, never stdout.

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use flowcoder_core::agent::{
    ApprovalMode, ChannelPort, InteractionPort, InterruptFlag, TurnEvent, TurnInput,
    TurnOrchestrator,
};
use flowcoder_core::TurnError;

/// One line of client input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start a turn.
    Message { text: String },
    /// Continue the last interrupted turn.
    Resume,
    /// Stop the running turn at the next phase boundary.
    Interrupt,
    Approval { mode: ApprovalMode },
    Confirmation { approved: bool },
    Answer { text: String },
    /// Resolve whatever the turn is waiting on negatively.
    Cancel,
}

#[derive(Debug, PartialEq)]
enum TurnRequest {
    Message(String),
    Resume,
}

/// Run turns requested on stdin until stdin closes.
pub async fn serve(
    orchestrator: &mut TurnOrchestrator,
    port: Arc<ChannelPort>,
    events: mpsc::UnboundedReceiver<TurnEvent>,
    inputs: mpsc::UnboundedSender<TurnInput>,
) -> Result<()> {
    tracing::info!("Serving turns over stdio");
    tokio::spawn(write_events(events));

    let (turn_tx, mut turn_rx) = mpsc::unbounded_channel();
    let interrupt = orchestrator.interrupt_flag();
    tokio::spawn(read_messages(turn_tx, inputs, interrupt));

    while let Some(request) = turn_rx.recv().await {
        let result = match request {
            TurnRequest::Message(text) => orchestrator.process_input(&text).await,
            TurnRequest::Resume => orchestrator.resume().await,
        };
        // Other failures were already reported through the port.
        if let Err(e @ TurnError::NothingToResume) = result {
            port.emit(TurnEvent::Error {
                error: e.to_string(),
            });
        }
    }

    tracing::info!("Stdin closed, stopping");
    Ok(())
}

async fn write_events(mut events: mpsc::UnboundedReceiver<TurnEvent>) {
    let mut stdout = tokio::io::stdout();
    while let Some(event) = events.recv().await {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode event");
                continue;
            }
        };
        if stdout.write_all(format!("{line}\n").as_bytes()).await.is_err()
            || stdout.flush().await.is_err()
        {
            tracing::warn!("Stdout closed, dropping events");
            break;
        }
    }
}

async fn read_messages(
    turns: mpsc::UnboundedSender<TurnRequest>,
    inputs: mpsc::UnboundedSender<TurnInput>,
    interrupt: InterruptFlag,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let message = match serde_json::from_str::<ClientMessage>(&line) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed client message");
                continue;
            }
        };
        if !route(message, &turns, &inputs, &interrupt) {
            break;
        }
    }
}

/// Deliver one message. Returns false once the receiving side is gone.
fn route(
    message: ClientMessage,
    turns: &mpsc::UnboundedSender<TurnRequest>,
    inputs: &mpsc::UnboundedSender<TurnInput>,
    interrupt: &InterruptFlag,
) -> bool {
    match message {
        ClientMessage::Message { text } => turns.send(TurnRequest::Message(text)).is_ok(),
        ClientMessage::Resume => turns.send(TurnRequest::Resume).is_ok(),
        ClientMessage::Interrupt => {
            interrupt.interrupt();
            true
        }
        ClientMessage::Approval { mode } => inputs.send(TurnInput::Approval(mode)).is_ok(),
        ClientMessage::Confirmation { approved } => {
            inputs.send(TurnInput::Confirmation(approved)).is_ok()
        }
        ClientMessage::Answer { text } => inputs.send(TurnInput::Answer(text)).is_ok(),
        ClientMessage::Cancel => inputs.send(TurnInput::Cancel).is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse_from_json_lines() {
        let parsed: ClientMessage =
            serde_json::from_str(r#"{"type": "approval", "mode": "step"}"#).unwrap();
        assert_eq!(
            parsed,
            ClientMessage::Approval {
                mode: ApprovalMode::Step
            }
        );

        let parsed: ClientMessage =
            serde_json::from_str(r#"{"type": "message", "text": "add a test"}"#).unwrap();
        assert_eq!(
            parsed,
            ClientMessage::Message {
                text: "add a test".into()
            }
        );

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "launch"}"#).is_err());
    }

    #[test]
    fn replies_go_to_the_port_and_turns_to_the_loop() {
        let (turn_tx, mut turn_rx) = mpsc::unbounded_channel();
        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        let interrupt = InterruptFlag::default();

        assert!(route(
            ClientMessage::Message { text: "hi".into() },
            &turn_tx,
            &input_tx,
            &interrupt
        ));
        assert!(route(
            ClientMessage::Confirmation { approved: true },
            &turn_tx,
            &input_tx,
            &interrupt
        ));
        assert!(route(ClientMessage::Interrupt, &turn_tx, &input_tx, &interrupt));

        assert_eq!(turn_rx.try_recv().unwrap(), TurnRequest::Message("hi".into()));
        assert!(matches!(
            input_rx.try_recv().unwrap(),
            TurnInput::Confirmation(true)
        ));
        assert!(interrupt.is_set());

        drop(turn_rx);
        assert!(!route(ClientMessage::Resume, &turn_tx, &input_tx, &interrupt));
    }
}
