//! Detect build/lint/test commands from the project's toolchain markers

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::CommandOverrides;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCommands {
    pub build: String,
    pub lint: String,
    pub test: String,
}

impl ProjectCommands {
    fn new(build: &str, lint: &str, test: &str) -> Self {
        Self {
            build: build.to_string(),
            lint: lint.to_string(),
            test: test.to_string(),
        }
    }
}

/// Commands for the project at `root`. First marker match wins; configured
/// overrides replace the discovered build/lint commands.
pub fn discover(root: &Path, overrides: &CommandOverrides) -> ProjectCommands {
    let has = |name: &str| root.join(name).exists();

    let mut commands = if has("Cargo.toml") {
        ProjectCommands::new("cargo check", "cargo clippy", "cargo test")
    } else if has("pyproject.toml") || has("requirements.txt") {
        ProjectCommands::new("python3 -m compileall -q .", "ruff check .", "pytest")
    } else if has("go.mod") {
        ProjectCommands::new("go build ./...", "go vet ./...", "go test ./...")
    } else if has("package.json") {
        ProjectCommands::new("npm run build", "npm run lint", "npm test")
    } else {
        ProjectCommands::new("make build", "make lint", "make test")
    };

    if let Some(build) = &overrides.build {
        commands.build = build.clone();
    }
    if let Some(lint) = &overrides.lint {
        commands.lint = lint.clone();
    }

    tracing::debug!(build = %commands.build, lint = %commands.lint, "Discovered project commands");
    commands
}
