//! Agent registry: role -> (engine, instruction template)
//!
//! Agents are stateless. Invoking one concatenates its template with the
//! caller's context and generates on the bound engine. Tool-using roles also
//! get the session system prompt (tool table, call format, project notes).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::Residency;
use crate::engine::{EngineHandle, EngineStatus};
use crate::error::EngineError;
use crate::protocol::{Delegate, TOOL_CALL_CLOSE, TOOL_CALL_OPEN};
use crate::tools::ToolDefinition;

const MAX_SCRATCHPAD_CHARS: usize = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Intent,
    Context,
    Dispatcher,
    Patch,
    Boilerplate,
    Template,
    Refactor,
    Debugger,
}

/// Which of the two session engines a role runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSlot {
    Default,
    Tiny,
}

impl AgentRole {
    pub const ALL: [AgentRole; 8] = [
        AgentRole::Intent,
        AgentRole::Context,
        AgentRole::Dispatcher,
        AgentRole::Patch,
        AgentRole::Boilerplate,
        AgentRole::Template,
        AgentRole::Refactor,
        AgentRole::Debugger,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AgentRole::Intent => "intent",
            AgentRole::Context => "context",
            AgentRole::Dispatcher => "dispatcher",
            AgentRole::Patch => "patch",
            AgentRole::Boilerplate => "boilerplate",
            AgentRole::Template => "template",
            AgentRole::Refactor => "refactor",
            AgentRole::Debugger => "debugger",
        }
    }

    pub fn engine_slot(self) -> EngineSlot {
        match self {
            AgentRole::Dispatcher | AgentRole::Boilerplate | AgentRole::Refactor => {
                EngineSlot::Default
            }
            AgentRole::Intent
            | AgentRole::Context
            | AgentRole::Patch
            | AgentRole::Template
            | AgentRole::Debugger => EngineSlot::Tiny,
        }
    }

    /// Roles that may emit tool calls and therefore see the system prompt.
    pub fn uses_tools(self) -> bool {
        !matches!(self, AgentRole::Intent | AgentRole::Debugger)
    }

    /// Specialist for a dispatch decision; `None` keeps the plan's own output.
    pub fn for_delegate(delegate: Delegate) -> Option<AgentRole> {
        match delegate {
            Delegate::Patch => Some(AgentRole::Patch),
            Delegate::Boilerplate => Some(AgentRole::Boilerplate),
            Delegate::Template => Some(AgentRole::Template),
            Delegate::Refactor => Some(AgentRole::Refactor),
            Delegate::None => None,
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            AgentRole::Intent => concat!(
                "You are the Intent Analyst for FlowCoder, a local coding assistant.\n",
                "Classify the user request as one of FEATURE, BUGFIX, REFACTOR, QUESTION, SCAFFOLD.\n",
                "Output ONLY the category and a one-sentence summary."
            ),
            AgentRole::Context => concat!(
                "You are the Context Gatherer for FlowCoder.\n",
                "Find the files and code needed to fulfil the request using only the read-only ",
                "tools read_file, list_files and search.\n",
                "When you already have enough context, answer without any tool call."
            ),
            AgentRole::Dispatcher => concat!(
                "You are the Lead Dispatcher for FlowCoder.\n",
                "Write a short, concrete execution plan for the request based on the conversation ",
                "and tool results so far. You may issue tool calls yourself for simple steps.\n",
                "End your answer with exactly one dispatch block naming the specialist to run next:\n",
                "<dispatch>{\"delegate\": \"patch\"}</dispatch>\n",
                "Valid delegates: patch (small edits), boilerplate (new files), template, refactor, ",
                "none (you are done or no specialist is needed)."
            ),
            AgentRole::Patch => concat!(
                "You are the Patch Coder for FlowCoder.\n",
                "Carry out the latest plan with precise patch_file calls.\n",
                "Only output tool calls. Do not explain yourself."
            ),
            AgentRole::Boilerplate => concat!(
                "You are the Builder for FlowCoder.\n",
                "Carry out the latest plan by creating files with write_file.\n",
                "Only output tool calls."
            ),
            AgentRole::Template => concat!(
                "You are the Template Weaver for FlowCoder.\n",
                "Fill in the files described by the latest plan using write_file or patch_file.\n",
                "Only output tool calls."
            ),
            AgentRole::Refactor => concat!(
                "You are the Refactoring Specialist for FlowCoder.\n",
                "Apply the refactoring described by the latest plan with patch_file calls, ",
                "one call per edit, keeping behaviour unchanged.\n",
                "Only output tool calls."
            ),
            AgentRole::Debugger => concat!(
                "You are the Debugger for FlowCoder.\n",
                "Analyse the failed verification below. Name the root cause and give a short, ",
                "concrete fix plan."
            ),
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A role bound to its engine and template. Immutable once built.
#[derive(Clone)]
pub struct AgentDescriptor {
    pub role: AgentRole,
    pub engine: Arc<EngineHandle>,
    pub template: &'static str,
}

pub struct AgentRegistry {
    agents: HashMap<AgentRole, AgentDescriptor>,
    engines: Vec<Arc<EngineHandle>>,
    residency: Residency,
    system_prompt: String,
}

impl AgentRegistry {
    /// Bind every role to the default or tiny engine. Both may be the same handle.
    pub fn new(
        default_engine: Arc<EngineHandle>,
        tiny_engine: Arc<EngineHandle>,
        residency: Residency,
    ) -> Self {
        let agents = AgentRole::ALL
            .into_iter()
            .map(|role| {
                let engine = match role.engine_slot() {
                    EngineSlot::Default => Arc::clone(&default_engine),
                    EngineSlot::Tiny => Arc::clone(&tiny_engine),
                };
                (
                    role,
                    AgentDescriptor {
                        role,
                        engine,
                        template: role.template(),
                    },
                )
            })
            .collect();

        let mut engines = vec![default_engine];
        if !Arc::ptr_eq(&engines[0], &tiny_engine) {
            engines.push(tiny_engine);
        }

        Self {
            agents,
            engines,
            residency,
            system_prompt: String::new(),
        }
    }

    pub fn residency(&self) -> Residency {
        self.residency
    }

    pub fn descriptor(&self, role: AgentRole) -> Option<&AgentDescriptor> {
        self.agents.get(&role)
    }

    pub fn engines(&self) -> &[Arc<EngineHandle>] {
        &self.engines
    }

    pub fn set_system_prompt(&mut self, prompt: String) {
        self.system_prompt = prompt;
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Full prompt sent to the engine for `role`.
    pub fn build_prompt(&self, role: AgentRole, context: &str) -> String {
        let mut prompt = String::new();
        if role.uses_tools() && !self.system_prompt.is_empty() {
            prompt.push_str(&self.system_prompt);
            prompt.push_str("\n\n");
        }
        prompt.push_str(role.template());
        prompt.push_str("\n\n");
        prompt.push_str(context.trim_end());
        prompt.push_str("\n\nAssistant:");
        prompt
    }

    pub async fn invoke(&self, role: AgentRole, context: &str) -> Result<String, EngineError> {
        let Some(agent) = self.agents.get(&role) else {
            // Every role is bound in `new`.
            return Ok(String::new());
        };

        if self.residency == Residency::Exclusive {
            self.unload_others(&agent.engine).await;
        }

        tracing::debug!(agent = %role, engine = %agent.engine.name(), "Invoking agent");
        agent.engine.generate(&self.build_prompt(role, context)).await
    }

    /// Start loading `role`'s engine ahead of need. Only with shared residency.
    pub fn prefetch(&self, role: AgentRole) -> bool {
        if self.residency != Residency::Shared {
            return false;
        }
        self.agents
            .get(&role)
            .is_some_and(|agent| agent.engine.load_in_background())
    }

    /// Unload every resident engine.
    pub async fn shutdown(&self) {
        for engine in &self.engines {
            if engine.status() == EngineStatus::Loaded {
                if let Err(e) = engine.unload().await {
                    tracing::warn!(engine = %engine.name(), error = %e, "Failed to unload engine");
                }
            }
        }
    }

    async fn unload_others(&self, keep: &Arc<EngineHandle>) {
        for engine in &self.engines {
            if !Arc::ptr_eq(engine, keep) && engine.status() == EngineStatus::Loaded {
                tracing::info!(engine = %engine.name(), "Unloading engine for exclusive residency");
                if let Err(e) = engine.unload().await {
                    tracing::warn!(engine = %engine.name(), error = %e, "Failed to unload engine");
                }
            }
        }
    }
}

/// Session system prompt: tool table, call format, project notes, prior scratchpad.
pub fn build_system_prompt(tools: &[ToolDefinition], project_summary: &str, scratchpad: &str) -> String {
    let mut prompt = String::from(
        "You are FlowCoder, a local coding assistant working inside the user's project.\n\n",
    );

    prompt.push_str("## Tools\n");
    for tool in tools {
        prompt.push_str(&format!(
            "- {}: {}\n  parameters: {}\n",
            tool.name, tool.description, tool.schema
        ));
    }

    prompt.push_str(&format!(
        "\n## Calling tools\nTo use a tool, output a block like this (several blocks run in order):\n\
         {}\n{{\"name\": \"read_file\", \"parameters\": {{\"path\": \"src/main.rs\"}}}}\n{}\n\
         Paths are relative to the project root. Tool output comes back inside <tool_result> blocks.\n",
        TOOL_CALL_OPEN, TOOL_CALL_CLOSE
    ));

    if !project_summary.trim().is_empty() {
        prompt.push_str("\n## Project\n");
        prompt.push_str(project_summary.trim_end());
        prompt.push('\n');
    }

    let scratchpad = scratchpad.trim();
    if !scratchpad.is_empty() {
        let start = scratchpad
            .char_indices()
            .rev()
            .nth(MAX_SCRATCHPAD_CHARS.saturating_sub(1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        prompt.push_str("\n## Previous notes\n");
        prompt.push_str(&scratchpad[start..]);
        prompt.push('\n');
    }

    prompt
}
