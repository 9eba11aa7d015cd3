//! Agent system for FlowCoder
//!
//! ## Orchestrator (the per-turn state machine)
//! - `TurnOrchestrator` - Intent, context, plan/delegate, approval, execution, verification
//! - `TurnEvent` / `TurnInput` - Event protocol between orchestrator and front ends
//! - `OrchestratorConfig` / `OrchestratorServices` - Configuration and collaborators
//!
//! ## Agents
//! - `AgentRegistry` - Role -> (engine, template) bindings, residency policy
//! - `AgentRole` - The eight fixed roles
//!
//! ## Safety and approval
//! - `CommandGuard` - Path containment and catastrophic-command denylist
//! - `CommandQueue` / `ApprovalMode` - One approval decision per batch
//! - `InteractionPort` / `ChannelPort` - How the orchestrator reaches the human
//!
//! ## Execution
//! - `ToolExecutor` - Validate, confirm, route, cap output
//! - `ProjectVerifier` / `ShellVerifier` - Lint + build after mutating calls

pub mod cancellation;
pub mod events;
pub mod executor;
pub mod guard;
pub mod history;
pub mod orchestrator;
pub mod port;
pub mod queue;
pub mod registry;
pub mod verification;

pub use cancellation::InterruptFlag;
pub use events::{TurnEvent, TurnInput};
pub use executor::{ExecutionRecord, ToolExecutor};
pub use guard::{CommandGuard, Validation};
pub use history::{History, Message, Role};
pub use orchestrator::{
    OrchestratorConfig, OrchestratorServices, Phase, TurnOrchestrator, TurnOutcome, TurnSummary,
};
pub use port::{ChannelPort, InteractionPort};
pub use queue::{ApprovalMode, CommandQueue};
pub use registry::{build_system_prompt, AgentDescriptor, AgentRegistry, AgentRole, EngineSlot};
pub use verification::{ProjectVerifier, ShellVerifier, VerificationReport};
