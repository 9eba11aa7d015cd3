//! Terminal interaction port: plain line-oriented stdin/stdout

use std::io::{self, BufRead, Write};

use async_trait::async_trait;

use flowcoder_core::agent::{ApprovalMode, InteractionPort, TurnEvent};
use flowcoder_core::ToolCall;

pub struct TerminalPort;

/// Prompt and read one line without blocking the runtime. `None` on EOF.
pub async fn read_line(prompt: String) -> Option<String> {
    tokio::task::spawn_blocking(move || {
        print!("{}", prompt);
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    })
    .await
    .ok()
    .flatten()
}

#[async_trait]
impl InteractionPort for TerminalPort {
    fn emit(&self, event: TurnEvent) {
        match event {
            TurnEvent::Phase { phase } => println!("[{}]", phase),
            TurnEvent::EngineLoading { model } => println!("[loading {}]", model),
            TurnEvent::AgentOutput { agent, text } if !text.trim().is_empty() => {
                println!("{}: {}", agent, text.trim());
            }
            TurnEvent::ToolExecuting { name } => println!("[executing {}]", name),
            TurnEvent::ToolResult { name, is_error, .. } => {
                let status = if is_error { "failed" } else { "ok" };
                println!("[{} {}]", name, status);
            }
            TurnEvent::ToolRejected { name, reason } => println!("[{} rejected: {}]", name, reason),
            TurnEvent::Verifying { command } => println!("[verifying: {}]", command),
            TurnEvent::VerificationResult { success, .. } => {
                println!("[verification {}]", if success { "passed" } else { "failed" });
            }
            TurnEvent::Escalated { diagnosis } => println!("Debugger: {}", diagnosis),
            TurnEvent::QueueDiscarded { count } if count > 0 => {
                println!("[skipped {} queued command(s)]", count);
            }
            TurnEvent::Notice { message } => println!("{}", message),
            TurnEvent::Error { error } => eprintln!("Error: {}", error),
            _ => {}
        }
    }

    async fn approve_batch(&self, calls: &[ToolCall]) -> ApprovalMode {
        println!("Proposed commands:");
        for (i, call) in calls.iter().enumerate() {
            println!("  {}. {} {}", i + 1, call.name, call.parameters_value());
        }
        let answer = read_line("Run them? [a]ll / [s]tep / anything else aborts: ".to_string())
            .await
            .unwrap_or_default();
        ApprovalMode::from_answer(&answer)
    }

    async fn confirm(&self, description: &str) -> bool {
        let answer = read_line(format!("{}\nAllow? [y/N] ", description))
            .await
            .unwrap_or_default();
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    async fn ask(&self, question: &str) -> String {
        read_line(format!("{}\n> ", question))
            .await
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}
