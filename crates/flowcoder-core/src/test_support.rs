//! Test doubles for orchestrator and registry tests

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::agent::events::TurnEvent;
use crate::agent::port::InteractionPort;
use crate::agent::queue::ApprovalMode;
use crate::agent::registry::AgentRole;
use crate::agent::verification::{ProjectVerifier, VerificationReport};
use crate::engine::{EngineHandle, LoadedModel, ModelBackend, ModelRef};
use crate::project::{CodeMetrics, FileLines, MetricsReport, SessionStore};
use crate::protocol::ToolCall;
use crate::tools::host::ToolProviderHost;
use crate::tools::registry::{Tool, ToolDefinition};
use crate::tools::{ToolContext, ToolResult};

// ── Engines ────────────────────────────────────────────────────────────

#[derive(Default)]
struct Script {
    replies: Mutex<HashMap<AgentRole, VecDeque<String>>>,
    prompts: Mutex<Vec<(AgentRole, String)>>,
}

/// Backend whose models answer from per-role reply queues.
///
/// The role is recognised from its template inside the prompt. An empty
/// queue yields a tool-free default reply.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Script>,
    loads: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, role: AgentRole, text: impl Into<String>) -> &Self {
        self.script
            .replies
            .lock()
            .entry(role)
            .or_default()
            .push_back(text.into());
        self
    }

    pub fn calls(&self, role: AgentRole) -> usize {
        self.prompts(role).len()
    }

    pub fn prompts(&self, role: AgentRole) -> Vec<String> {
        self.script
            .prompts
            .lock()
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

struct ScriptedModel {
    script: Arc<Script>,
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn load(&self, _model: &ModelRef) -> Result<Arc<dyn LoadedModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedModel {
            script: Arc::clone(&self.script),
        }))
    }
}

#[async_trait]
impl LoadedModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let role = AgentRole::ALL
            .into_iter()
            .find(|r| prompt.contains(r.template()))
            .unwrap_or(AgentRole::Dispatcher);
        self.script.prompts.lock().push((role, prompt.to_string()));

        let scripted = self
            .script
            .replies
            .lock()
            .get_mut(&role)
            .and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or_else(|| match role {
            AgentRole::Intent => "FEATURE: scripted request".to_string(),
            _ => String::new(),
        }))
    }

    async fn release(&self) -> Result<()> {
        Ok(())
    }
}

/// Distinct default and tiny engines over one scripted backend.
pub fn engine_pair(backend: &ScriptedBackend) -> (Arc<EngineHandle>, Arc<EngineHandle>) {
    let backend: Arc<dyn ModelBackend> = Arc::new(backend.clone());
    (
        Arc::new(EngineHandle::new(
            ModelRef::new("default", "/models/default.gguf"),
            Arc::clone(&backend),
        )),
        Arc::new(EngineHandle::new(
            ModelRef::new("tiny", "/models/tiny.gguf"),
            backend,
        )),
    )
}

/// Agent reply holding the given tool calls.
pub fn tool_calls(calls: &[(&str, Value)]) -> String {
    calls
        .iter()
        .map(|(name, params)| {
            format!(
                "<tool_call>\n{}\n</tool_call>",
                json!({ "name": name, "parameters": params })
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Interaction ────────────────────────────────────────────────────────

/// Port answering from queues. Defaults: approve all, confirm yes, empty answer.
#[derive(Default)]
pub struct ScriptedPort {
    approvals: Mutex<VecDeque<ApprovalMode>>,
    confirmations: Mutex<VecDeque<bool>>,
    answers: Mutex<VecDeque<String>>,
    pub events: Mutex<Vec<TurnEvent>>,
    pub confirm_prompts: Mutex<Vec<String>>,
    pub questions: Mutex<Vec<String>>,
    pub approval_requests: Mutex<Vec<Vec<ToolCall>>>,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approve(self, mode: ApprovalMode) -> Self {
        self.approvals.lock().push_back(mode);
        self
    }

    pub fn confirm_with(self, answer: bool) -> Self {
        self.confirmations.lock().push_back(answer);
        self
    }

    pub fn answer(self, text: &str) -> Self {
        self.answers.lock().push_back(text.to_string());
        self
    }

    /// Names of tools the orchestrator actually ran, in order.
    pub fn executed(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TurnEvent::ToolExecuting { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl InteractionPort for ScriptedPort {
    fn emit(&self, event: TurnEvent) {
        self.events.lock().push(event);
    }

    async fn approve_batch(&self, calls: &[ToolCall]) -> ApprovalMode {
        self.approval_requests.lock().push(calls.to_vec());
        self.approvals.lock().pop_front().unwrap_or(ApprovalMode::All)
    }

    async fn confirm(&self, description: &str) -> bool {
        self.confirm_prompts.lock().push(description.to_string());
        self.confirmations.lock().pop_front().unwrap_or(true)
    }

    async fn ask(&self, question: &str) -> String {
        self.questions.lock().push(question.to_string());
        self.answers.lock().pop_front().unwrap_or_default()
    }
}

// ── Collaborators ──────────────────────────────────────────────────────

/// Verifier returning queued outcomes (default: success).
#[derive(Default)]
pub struct FakeVerifier {
    outcomes: Mutex<VecDeque<bool>>,
    pub calls: AtomicUsize,
}

impl FakeVerifier {
    pub fn failing_once() -> Self {
        let verifier = Self::default();
        verifier.outcomes.lock().push_back(false);
        verifier
    }
}

#[async_trait]
impl ProjectVerifier for FakeVerifier {
    fn describe(&self) -> String {
        "fake build".to_string()
    }

    async fn verify(&self) -> VerificationReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let success = self.outcomes.lock().pop_front().unwrap_or(true);
        VerificationReport {
            success,
            output: if success {
                "build ok".to_string()
            } else {
                "error[E0308]: mismatched types at src/lib.rs:3".to_string()
            },
        }
    }
}

#[derive(Default)]
pub struct FakeMetrics {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CodeMetrics for FakeMetrics {
    async fn collect(&self, _root: &Path) -> Result<MetricsReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(MetricsReport {
            total_lines: 42,
            per_file: vec![FileLines {
                file: "src/lib.rs".to_string(),
                lines: 42,
            }],
        })
    }
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySession {
    pub summary: String,
    pub entries: Mutex<Vec<String>>,
}

#[async_trait]
impl SessionStore for MemorySession {
    async fn project_summary(&self) -> Result<String> {
        Ok(self.summary.clone())
    }

    async fn read_scratchpad(&self) -> Result<String> {
        Ok(self.entries.lock().join("\n"))
    }

    async fn write_scratchpad(&self, text: &str) -> Result<()> {
        self.entries.lock().push(text.to_string());
        Ok(())
    }
}

/// Session store whose every operation fails.
pub struct BrokenSession;

#[async_trait]
impl SessionStore for BrokenSession {
    async fn project_summary(&self) -> Result<String> {
        anyhow::bail!("project.json is unreadable")
    }

    async fn read_scratchpad(&self) -> Result<String> {
        anyhow::bail!("scratchpad is unreadable")
    }

    async fn write_scratchpad(&self, _text: &str) -> Result<()> {
        anyhow::bail!("disk full")
    }
}

// ── Tools ──────────────────────────────────────────────────────────────

/// Tool that records each execution and returns a fixed output.
pub struct RecordingTool {
    name: &'static str,
    output: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingTool {
    pub fn new(name: &'static str, output: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            output: output.to_string(),
            log: Arc::clone(log),
        })
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Records calls"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
        self.log.lock().push(self.name.to_string());
        ToolResult::success(self.output.clone())
    }
}

/// Tool-provider host exposing the given names and recording every call.
pub struct RecordingHost {
    names: Vec<&'static str>,
    pub calls: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn new(names: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            names: names.to_vec(),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ToolProviderHost for RecordingHost {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        Ok(self
            .names
            .iter()
            .map(|name| ToolDefinition {
                name: name.to_string(),
                description: "Host tool".to_string(),
                schema: json!({ "type": "object" }),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, _arguments: Value) -> Result<String> {
        self.calls.lock().push(name.to_string());
        Ok(format!("{name} done"))
    }
}
