//! FlowCoder - local, tool-using coding assistant for the terminal
//!
//! `flowcoder chat` opens an interactive session; `flowcoder run <prompt>`
//! runs a single turn; `flowcoder serve` speaks JSON lines on stdio for
//! editors and other front ends. Ctrl-C interrupts the running turn at the
//! next phase boundary; `/resume` picks it up again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use flowcoder_core::agent::{
    AgentRegistry, ChannelPort, InteractionPort, OrchestratorConfig, OrchestratorServices, ShellVerifier,
    TurnOrchestrator, TurnOutcome,
};
use flowcoder_core::engine::{EngineHandle, LlamaServerBackend, ModelBackend, ModelRef};
use flowcoder_core::project::{discover, FileSessionStore, LineCountMetrics};
use flowcoder_core::tools::{register_builtin_tools, ToolContext, ToolRegistry, ToolRouter};
use flowcoder_core::{paths, FlowConfig, TurnError};

mod serve;
mod terminal;

use terminal::{read_line, TerminalPort};

/// FlowCoder - local coding assistant
#[derive(Parser)]
#[command(name = "flowcoder")]
#[command(about = "Local, tool-using coding assistant", long_about = None)]
struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session (default)
    Chat,

    /// Run a single turn and exit
    Run {
        /// The instruction for this turn
        prompt: String,
    },

    /// Headless session: events out and replies in as JSON lines on stdio
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let project_root = match cli.project {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let project_root = project_root
        .canonicalize()
        .with_context(|| format!("Project root {:?} does not exist", project_root))?;

    let config = FlowConfig::load(&project_root)?;
    tracing::info!(project = ?project_root, residency = ?config.residency, "Starting FlowCoder");

    if let Some(Commands::Serve) = cli.command {
        let (port, events, inputs) = ChannelPort::new(config.approval_timeout());
        let port = Arc::new(port);
        let mut orchestrator = build_orchestrator(
            &project_root,
            &config,
            Arc::clone(&port) as Arc<dyn InteractionPort>,
        )
        .await;
        spawn_interrupt_handler(&orchestrator);

        let result = serve::serve(&mut orchestrator, port, events, inputs).await;
        orchestrator.shutdown().await;
        return result;
    }

    let mut orchestrator = build_orchestrator(&project_root, &config, Arc::new(TerminalPort)).await;
    spawn_interrupt_handler(&orchestrator);

    let result = match cli.command {
        Some(Commands::Run { prompt }) => run_turn(&mut orchestrator, &prompt, false).await,
        _ => chat(&mut orchestrator).await,
    };

    orchestrator.shutdown().await;
    result
}

fn spawn_interrupt_handler(orchestrator: &TurnOrchestrator) {
    let interrupt = orchestrator.interrupt_flag();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, interrupting turn");
            interrupt.interrupt();
        }
    });
}

/// Log to a file so terminal output stays clean. `RUST_LOG` overrides.
fn init_logging() -> Result<()> {
    let log_dir = paths::logs_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory: {}", e);
    }

    #[cfg(unix)]
    let null_device = "/dev/null";
    #[cfg(windows)]
    let null_device = "NUL";

    let log_file = match std::fs::File::create(log_dir.join("flowcoder.log")) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Failed to create log file: {}, falling back to null device",
                e
            );
            std::fs::File::create(null_device)
                .with_context(|| format!("Failed to open {}", null_device))?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn build_orchestrator(
    project_root: &Path,
    config: &FlowConfig,
    port: Arc<dyn InteractionPort>,
) -> TurnOrchestrator {
    let backend: Arc<dyn ModelBackend> = Arc::new(LlamaServerBackend::from_config(config));
    let default_engine = Arc::new(EngineHandle::new(
        ModelRef::new(&config.default_model, config.default_model_path()),
        Arc::clone(&backend),
    ));
    let tiny_engine = if config.tiny_model == config.default_model {
        Arc::clone(&default_engine)
    } else {
        Arc::new(EngineHandle::new(
            ModelRef::new(&config.tiny_model, config.tiny_model_path()),
            backend,
        ))
    };

    let registry = Arc::new(ToolRegistry::new().with_timeout(config.tool_timeout()));
    register_builtin_tools(&registry).await;
    let router = ToolRouter::new(
        registry,
        ToolContext::new(project_root).with_timeout(config.tool_timeout()),
    );

    let commands = discover(project_root, &config.commands);
    tracing::info!(build = %commands.build, lint = %commands.lint, "Discovered project commands");

    let services = OrchestratorServices {
        agents: AgentRegistry::new(default_engine, tiny_engine, config.residency),
        router: Arc::new(router),
        verifier: Arc::new(ShellVerifier::new(
            project_root,
            commands,
            config.verify_timeout(),
        )),
        metrics: Arc::new(LineCountMetrics),
        session: Arc::new(FileSessionStore::new(project_root)),
        port,
    };

    TurnOrchestrator::new(
        services,
        OrchestratorConfig::from_flow_config(project_root, config),
    )
}

async fn chat(orchestrator: &mut TurnOrchestrator) -> Result<()> {
    println!("FlowCoder ready. /resume continues an interrupted turn, /exit quits.");

    while let Some(line) = read_line("\n> ".to_string()).await {
        let line = line.trim();
        match line {
            "" => continue,
            "/exit" | "/quit" => break,
            "/resume" => run_turn(orchestrator, "", true).await?,
            _ => run_turn(orchestrator, line, false).await?,
        }
    }
    Ok(())
}

/// Run or resume a turn. Failures are reported and the session carries on.
async fn run_turn(orchestrator: &mut TurnOrchestrator, input: &str, resume: bool) -> Result<()> {
    let result = if resume {
        orchestrator.resume().await
    } else {
        orchestrator.process_input(input).await
    };

    match result {
        Ok(summary) => {
            if summary.outcome == TurnOutcome::RoundLimit {
                println!("(stopped after {} rounds)", summary.rounds);
            }
            Ok(())
        }
        Err(TurnError::Interrupted { phase, .. }) => {
            println!("Interrupted before {}. Type /resume to continue.", phase);
            Ok(())
        }
        Err(e) => {
            println!("Error: {}", e);
            Ok(())
        }
    }
}
