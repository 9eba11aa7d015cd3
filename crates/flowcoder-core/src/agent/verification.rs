//! Project verification after mutating tool calls
//!
//! Lint runs first and its failure is only recorded. The build decides the
//! outcome.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::process::run_shell;
use crate::project::ProjectCommands;

/// Tools whose success triggers verification.
pub const MUTATING_TOOLS: &[&str] = &["write_file", "patch_file"];

pub fn triggers_verification(tool: &str) -> bool {
    MUTATING_TOOLS.contains(&tool)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub success: bool,
    /// Lint and build transcripts.
    pub output: String,
}

#[async_trait]
pub trait ProjectVerifier: Send + Sync {
    /// Command line shown while verifying.
    fn describe(&self) -> String;

    async fn verify(&self) -> VerificationReport;
}

/// Runs the discovered lint and build commands through the shell.
pub struct ShellVerifier {
    root: PathBuf,
    commands: ProjectCommands,
    timeout: Duration,
}

impl ShellVerifier {
    pub fn new(root: &Path, commands: ProjectCommands, timeout: Duration) -> Self {
        Self {
            root: root.to_path_buf(),
            commands,
            timeout,
        }
    }

    async fn run_step(&self, label: &str, command: &str) -> (bool, String) {
        match run_shell(command, &self.root, self.timeout).await {
            Ok(output) => (
                output.success(),
                format!("== {} ==\n{}", label, output.transcript()),
            ),
            Err(e) => (false, format!("== {} ==\n$ {}\n{:#}\n", label, command, e)),
        }
    }
}

#[async_trait]
impl ProjectVerifier for ShellVerifier {
    fn describe(&self) -> String {
        format!("{} && {}", self.commands.lint, self.commands.build)
    }

    async fn verify(&self) -> VerificationReport {
        let (lint_ok, lint) = self.run_step("lint", &self.commands.lint).await;
        if !lint_ok {
            tracing::debug!(command = %self.commands.lint, "Lint reported problems");
        }

        let (build_ok, build) = self.run_step("build", &self.commands.build).await;
        if !build_ok {
            tracing::warn!(command = %self.commands.build, "Build failed during verification");
        }

        VerificationReport {
            success: build_ok,
            output: format!("{}\n{}", lint, build),
        }
    }
}
