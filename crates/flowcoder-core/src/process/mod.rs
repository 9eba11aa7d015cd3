//! Shell command execution shared by the run_cmd tool and project verification

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[a-zA-Z]|\x1b\][^\x07]*\x07").unwrap()
});

/// Captured result of one shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub command: String,
    /// `None` when the process was killed by a signal or timed out.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Human-readable transcript: command, exit status, then both streams.
    pub fn transcript(&self) -> String {
        let status = match (self.timed_out, self.exit_code) {
            (true, _) => "timed out".to_string(),
            (false, Some(code)) => format!("exit code {}", code),
            (false, None) => "killed by signal".to_string(),
        };

        let mut out = format!("$ {}\n[{}]\n", self.command, status);
        if !self.stdout.trim().is_empty() {
            out.push_str(self.stdout.trim_end());
            out.push('\n');
        }
        if !self.stderr.trim().is_empty() {
            out.push_str("[stderr]\n");
            out.push_str(self.stderr.trim_end());
            out.push('\n');
        }
        out
    }
}

fn build_shell_command(command: &str, cwd: &Path) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    cmd.current_dir(cwd)
        .env("NO_COLOR", "1")
        .env("CARGO_TERM_COLOR", "never")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Run `command` through the platform shell in `cwd`.
///
/// A command that outlives `timeout` is killed and reported with
/// `timed_out = true`. Only spawn failures are errors.
pub async fn run_shell(command: &str, cwd: &Path, timeout: Duration) -> Result<CommandOutput> {
    let start = Instant::now();
    let child = build_shell_command(command, cwd)
        .spawn()
        .with_context(|| format!("Failed to spawn command: {}", command))?;

    tracing::debug!(command = command, cwd = ?cwd, "Running shell command");

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => Some(output.context("Failed to collect command output")?),
        Err(_) => {
            tracing::warn!(
                command = command,
                timeout_secs = timeout.as_secs(),
                "Shell command timed out"
            );
            None
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    Ok(match output {
        Some(output) => CommandOutput {
            command: command.to_string(),
            exit_code: output.status.code(),
            stdout: strip_ansi(&String::from_utf8_lossy(&output.stdout)),
            stderr: strip_ansi(&String::from_utf8_lossy(&output.stderr)),
            timed_out: false,
            duration_ms,
        },
        None => CommandOutput {
            command: command.to_string(),
            exit_code: None,
            stdout: String::new(),
            stderr: format!("Command timed out after {} seconds", timeout.as_secs()),
            timed_out: true,
            duration_ms,
        },
    })
}

fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_shell("echo out; echo err >&2; exit 3", dir.path(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert!(out.transcript().contains("[exit code 3]"));
    }

    #[tokio::test]
    async fn runs_in_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let out = run_shell("ls", dir.path(), Duration::from_secs(10)).await.unwrap();
        assert!(out.success());
        assert!(out.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn timeout_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_shell("sleep 5", dir.path(), Duration::from_millis(100))
            .await
            .unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
        assert!(out.transcript().contains("timed out"));
    }

    #[test]
    fn strips_color_codes() {
        assert_eq!(strip_ansi("\x1b[31merror\x1b[0m: x"), "error: x");
    }
}
