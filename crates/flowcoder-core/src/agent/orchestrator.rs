//! Turn orchestrator: the per-turn state machine.
//!
//! One `process_input()` call drives a turn through its phases:
//!
//! ```text
//!  intent ─► context ─► ┌─► plan ─► delegate ─► approval ─► execution ─┐
//!                       │                                     │        │
//!                       │                          verification (write/patch)
//!                       └──────────── next round ◄────────────┴────────┘
//! ```
//!
//! The round loop ends when the last agent response carries no tool calls,
//! the human aborts a batch, or the round bound is reached. The interrupt
//! flag is sampled at every phase boundary and before every tool call; an
//! interrupted turn keeps its history and can be picked up with `resume()`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{FlowConfig, MAX_ROUNDS_CEILING};
use crate::engine::EngineStatus;
use crate::error::TurnError;
use crate::project::{CodeMetrics, SessionStore};
use crate::protocol::{self, format_result, parse_dispatch};
use crate::tools::{ToolResult, ToolRouter};

use super::cancellation::InterruptFlag;
use super::events::TurnEvent;
use super::executor::{truncate_output, ToolExecutor};
use super::guard::CommandGuard;
use super::history::History;
use super::port::InteractionPort;
use super::queue::{ApprovalMode, CommandQueue};
use super::registry::{build_system_prompt, AgentRegistry, AgentRole};
use super::verification::{triggers_verification, ProjectVerifier};

const DEFAULT_MAX_ROUNDS: usize = 12;
const DEFAULT_MAX_TOOL_OUTPUT_CHARS: usize = 30_000;
const DEFAULT_METRICS_TOP_N: usize = 5;

const CANCELLED_MESSAGE: &str = "Execution cancelled by user.";
const VERIFICATION_PASSED: &str = "Verification passed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Intent,
    Context,
    Plan,
    Delegate,
    Approval,
    Execution,
    Verification,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Intent => "intent",
            Phase::Context => "context",
            Phase::Plan => "plan",
            Phase::Delegate => "delegate",
            Phase::Approval => "approval",
            Phase::Execution => "execution",
            Phase::Verification => "verification",
        };
        f.write_str(name)
    }
}

/// Configuration for a session's turns.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub project_root: PathBuf,
    /// Plan rounds per turn before the turn is cut off.
    pub max_rounds: usize,
    pub max_tool_output_chars: usize,
    pub metrics_top_n: usize,
}

impl OrchestratorConfig {
    pub fn new(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_tool_output_chars: DEFAULT_MAX_TOOL_OUTPUT_CHARS,
            metrics_top_n: DEFAULT_METRICS_TOP_N,
        }
    }

    pub fn from_flow_config(project_root: &Path, config: &FlowConfig) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            max_rounds: config.max_rounds.clamp(1, MAX_ROUNDS_CEILING),
            max_tool_output_chars: config.max_tool_output_chars,
            metrics_top_n: config.metrics_top_n,
        }
    }
}

/// Collaborators the orchestrator drives.
pub struct OrchestratorServices {
    pub agents: AgentRegistry,
    pub router: Arc<ToolRouter>,
    pub verifier: Arc<dyn ProjectVerifier>,
    pub metrics: Arc<dyn CodeMetrics>,
    pub session: Arc<dyn SessionStore>,
    pub port: Arc<dyn InteractionPort>,
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The last agent response carried no tool calls.
    Completed,
    /// The human aborted a batch.
    Cancelled,
    /// The round bound was reached while agents kept proposing calls.
    RoundLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSummary {
    pub outcome: TurnOutcome,
    pub rounds: usize,
    /// Calls that actually ran (guard rejections and declines excluded).
    pub tool_executions: usize,
    pub intent: Option<String>,
}

#[derive(Default)]
struct TurnState {
    rounds: usize,
    tool_executions: usize,
    intent: Option<String>,
}

impl TurnState {
    fn finish(self, outcome: TurnOutcome) -> TurnSummary {
        TurnSummary {
            outcome,
            rounds: self.rounds,
            tool_executions: self.tool_executions,
            intent: self.intent,
        }
    }
}

pub struct TurnOrchestrator {
    config: OrchestratorConfig,
    agents: AgentRegistry,
    executor: ToolExecutor,
    verifier: Arc<dyn ProjectVerifier>,
    metrics: Arc<dyn CodeMetrics>,
    session: Arc<dyn SessionStore>,
    port: Arc<dyn InteractionPort>,
    history: History,
    interrupt: InterruptFlag,
    interrupted_at: Option<Phase>,
}

impl TurnOrchestrator {
    pub fn new(services: OrchestratorServices, config: OrchestratorConfig) -> Self {
        let OrchestratorServices {
            agents,
            router,
            verifier,
            metrics,
            session,
            port,
        } = services;

        let executor = ToolExecutor::new(
            CommandGuard::new(&config.project_root),
            router,
            config.max_tool_output_chars,
        );

        Self {
            config,
            agents,
            executor,
            verifier,
            metrics,
            session,
            port,
            history: History::new(),
            interrupt: InterruptFlag::new(),
            interrupted_at: None,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Flag a front end sets to interrupt the running turn.
    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Phase at which the last turn was interrupted, if it was.
    pub fn interrupted_at(&self) -> Option<Phase> {
        self.interrupted_at
    }

    /// Run one full turn for a user message.
    pub async fn process_input(&mut self, input: &str) -> Result<TurnSummary, TurnError> {
        self.interrupt.clear();
        self.interrupted_at = None;
        self.history.push_user(input);

        let result = self.run_turn(input).await;
        self.settle(result)
    }

    /// Continue an interrupted turn from its preserved history.
    ///
    /// The user message is not added again; the turn re-enters the plan loop.
    pub async fn resume(&mut self) -> Result<TurnSummary, TurnError> {
        let Some(phase) = self.interrupted_at.take() else {
            return Err(TurnError::NothingToResume);
        };
        tracing::info!(phase = %phase, history_len = self.history.len(), "Resuming interrupted turn");
        self.interrupt.clear();

        self.refresh_system_prompt().await;
        let result = self.run_rounds(TurnState::default()).await;
        self.settle(result)
    }

    /// Unload every engine. Call once at session teardown.
    pub async fn shutdown(&self) {
        self.agents.shutdown().await;
        tracing::info!("Session engines released");
    }

    fn settle(
        &mut self,
        result: Result<TurnSummary, TurnError>,
    ) -> Result<TurnSummary, TurnError> {
        match &result {
            Ok(summary) => {
                tracing::info!(
                    outcome = ?summary.outcome,
                    rounds = summary.rounds,
                    tool_executions = summary.tool_executions,
                    "Turn finished"
                );
                self.port.emit(TurnEvent::TurnComplete {
                    rounds: summary.rounds,
                });
            }
            Err(TurnError::Interrupted { phase, .. }) => {
                self.interrupted_at = Some(*phase);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Turn failed");
                self.port.emit(TurnEvent::Error {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn run_turn(&mut self, input: &str) -> Result<TurnSummary, TurnError> {
        self.refresh_system_prompt().await;
        let mut turn = TurnState::default();

        self.enter(Phase::Intent)?;
        let intent = self
            .run_agent(AgentRole::Intent, &format!("User: {}", input))
            .await?;
        let intent = intent.trim().to_string();
        tracing::debug!(intent = %intent, "Classified request");
        turn.intent = Some(intent);

        self.enter(Phase::Context)?;
        self.gather_context(&mut turn).await?;

        self.run_rounds(turn).await
    }

    /// Context phase: read-only calls run without approval.
    async fn gather_context(&mut self, turn: &mut TurnState) -> Result<(), TurnError> {
        self.agents.prefetch(AgentRole::Dispatcher);

        let context = format!(
            "{}Intent: {}",
            self.history.render(),
            turn.intent.as_deref().unwrap_or_default()
        );
        let response = self.run_agent(AgentRole::Context, &context).await?;
        self.history.push_assistant(response.as_str());

        for call in protocol::parse(&response) {
            self.checkpoint(Phase::Context)?;

            if !self.executor.router().is_read_only(&call.name).await {
                let reason = "Only read-only tools may run while gathering context.";
                tracing::warn!(tool = %call.name, "Context agent proposed a non-read-only call");
                self.port.emit(TurnEvent::ToolRejected {
                    name: call.name.clone(),
                    reason: reason.to_string(),
                });
                self.history.push_system(ToolResult::rejected(reason).output);
                continue;
            }

            let record = self.executor.execute(&call, false, self.port.as_ref()).await;
            if record.executed {
                turn.tool_executions += 1;
            }
            self.history.push_system(format_result(&record.result.output));
        }
        Ok(())
    }

    async fn run_rounds(&mut self, mut turn: TurnState) -> Result<TurnSummary, TurnError> {
        loop {
            if turn.rounds >= self.config.max_rounds {
                tracing::warn!(rounds = turn.rounds, "Round limit reached, ending turn");
                self.port.emit(TurnEvent::Notice {
                    message: format!(
                        "Stopped after {} rounds; send another message to continue.",
                        turn.rounds
                    ),
                });
                return Ok(turn.finish(TurnOutcome::RoundLimit));
            }
            turn.rounds += 1;

            self.enter(Phase::Plan)?;
            let plan = self
                .run_agent(AgentRole::Dispatcher, &self.history.render())
                .await?;
            self.history.push_assistant(plan.as_str());
            self.note_scratchpad(&format!("### Plan\n\n{}", plan.trim())).await;

            let response = match AgentRole::for_delegate(parse_dispatch(&plan)) {
                Some(role) => {
                    self.enter(Phase::Delegate)?;
                    let response = self.run_agent(role, &self.history.render()).await?;
                    self.history.push_assistant(response.as_str());
                    response
                }
                None => plan,
            };

            let calls = protocol::parse(&response);
            if calls.is_empty() {
                return Ok(turn.finish(TurnOutcome::Completed));
            }

            self.enter(Phase::Approval)?;
            let mode = self.port.approve_batch(&calls).await;
            tracing::info!(mode = %mode, count = calls.len(), "Batch approval");
            if mode == ApprovalMode::Abort {
                self.history.push_system(CANCELLED_MESSAGE);
                self.port.emit(TurnEvent::Notice {
                    message: CANCELLED_MESSAGE.to_string(),
                });
                return Ok(turn.finish(TurnOutcome::Cancelled));
            }

            let mut queue = CommandQueue::new(calls, mode);
            self.drain(&mut queue, &mut turn).await?;
        }
    }

    /// Execution phase: run queued calls in order until the queue is empty
    /// or a verification fails.
    async fn drain(&mut self, queue: &mut CommandQueue, turn: &mut TurnState) -> Result<(), TurnError> {
        self.enter(Phase::Execution)?;

        while let Some(call) = queue.pop_next() {
            self.checkpoint(Phase::Execution)?;

            let confirm = queue.needs_confirmation(&call);
            let record = self.executor.execute(&call, confirm, self.port.as_ref()).await;
            if !record.executed {
                self.history.push_system(record.result.output);
                continue;
            }

            turn.tool_executions += 1;
            self.history.push_system(format_result(&record.result.output));

            if !record.result.is_error && triggers_verification(&call.name) && !self.verify().await? {
                let count = queue.discard_remaining();
                tracing::warn!(discarded = count, "Discarding queued calls after failed verification");
                self.port.emit(TurnEvent::QueueDiscarded { count });
                if count > 0 {
                    self.history.push_system(format!(
                        "Skipped {} remaining queued command(s) because verification failed.",
                        count
                    ));
                }
            }
        }
        Ok(())
    }

    /// Verification phase. Returns whether the build is healthy; on failure
    /// the diagnostic agent's analysis has been recorded.
    async fn verify(&mut self) -> Result<bool, TurnError> {
        self.enter(Phase::Verification)?;
        self.port.emit(TurnEvent::Verifying {
            command: self.verifier.describe(),
        });
        self.agents.prefetch(AgentRole::Debugger);

        let report = self.verifier.verify().await;
        let transcript = truncate_output(&report.output, self.config.max_tool_output_chars);
        self.port.emit(TurnEvent::VerificationResult {
            success: report.success,
            output: transcript.clone(),
        });

        if report.success {
            tracing::debug!("Verification passed");
            self.history.push_system(VERIFICATION_PASSED);
            return Ok(true);
        }

        tracing::warn!("Verification failed, consulting debugger");
        self.history.push_system(format_result(&transcript));

        let metrics = match self.metrics.collect(&self.config.project_root).await {
            Ok(report) => report.render(self.config.metrics_top_n),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to collect code metrics");
                "Code metrics unavailable.".to_string()
            }
        };

        let analysis = self
            .run_agent(
                AgentRole::Debugger,
                &format!("Error Log:\n{}\n\n{}", transcript, metrics),
            )
            .await?;
        let analysis = analysis.trim();

        self.port.emit(TurnEvent::Escalated {
            diagnosis: analysis.to_string(),
        });
        self.history.push_system(format!(
            "Debugger Analysis: {}\nPlease fix and verify again.",
            analysis
        ));
        self.note_scratchpad(&format!("### Debugger analysis\n\n{}", analysis)).await;

        Ok(false)
    }

    async fn run_agent(&self, role: AgentRole, context: &str) -> Result<String, TurnError> {
        if let Some(agent) = self.agents.descriptor(role) {
            if agent.engine.status() != EngineStatus::Loaded {
                self.port.emit(TurnEvent::EngineLoading {
                    model: agent.engine.name().to_string(),
                });
            }
        }
        self.port.emit(TurnEvent::AgentStarted {
            agent: role.name().to_string(),
        });

        let text = self.agents.invoke(role, context).await?;

        self.port.emit(TurnEvent::AgentOutput {
            agent: role.name().to_string(),
            text: text.clone(),
        });
        Ok(text)
    }

    /// Rebuild the shared system prompt. An unreadable session store leaves
    /// its sections empty instead of failing the turn.
    async fn refresh_system_prompt(&mut self) {
        let tools = self.executor.router().definitions().await;
        let summary = self.session.project_summary().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read project summary");
            String::new()
        });
        let scratchpad = self.session.read_scratchpad().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read scratchpad");
            String::new()
        });
        self.agents
            .set_system_prompt(build_system_prompt(&tools, &summary, &scratchpad));
    }

    async fn note_scratchpad(&self, entry: &str) {
        if let Err(e) = self.session.write_scratchpad(entry).await {
            tracing::warn!(error = %e, "Failed to write scratchpad");
        }
    }

    fn enter(&self, phase: Phase) -> Result<(), TurnError> {
        self.checkpoint(phase)?;
        tracing::debug!(phase = ?phase, "Entering phase");
        self.port.emit(TurnEvent::Phase {
            phase: phase.to_string(),
        });
        Ok(())
    }

    fn checkpoint(&self, phase: Phase) -> Result<(), TurnError> {
        if !self.interrupt.is_set() {
            return Ok(());
        }
        tracing::info!(phase = ?phase, history_len = self.history.len(), "Turn interrupted");
        self.port.emit(TurnEvent::Notice {
            message: format!("Interrupted before {}", phase),
        });
        Err(TurnError::Interrupted {
            phase,
            history_len: self.history.len(),
        })
    }
}
