//! Command guard: policy checks on tool calls before they run
//!
//! - Filesystem tools must target paths inside the project root
//! - The shell tool rejects a fixed set of catastrophic commands
//! - Dangerous tools need a human yes/no before executing

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::protocol::ToolCall;
use crate::tools::path_utils::{normalize_lexically, normalize_root, resolve_within};

use super::port::InteractionPort;

/// Tools whose `path` parameter must stay inside the project root.
pub const FILESYSTEM_TOOLS: &[&str] = &["read_file", "list_files", "write_file", "patch_file"];

/// The shell execution tool.
pub const SHELL_TOOL: &str = "run_cmd";

/// Tools that always need a human confirmation before running.
pub const DANGEROUS_TOOLS: &[&str] = &[
    SHELL_TOOL,
    "cache_global_ref",
    "scaffold_project",
    "git_commit",
    "git_push",
    "git_reset",
    "git_checkout",
    "package_install",
    "package_remove",
    "npm_install",
    "npm_uninstall",
];

static FORK_BOMB_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:").unwrap());
static NETWORK_PIPE_TO_SHELL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(curl|wget)\b.*\|\s*(sh|bash)\b").unwrap());
static RAW_DISK_REDIRECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)>\s*/dev/(sd|nvme|vd|xvd|hd|disk|mmcblk)").unwrap());

pub fn is_dangerous(name: &str) -> bool {
    DANGEROUS_TOOLS.contains(&name)
}

pub fn is_filesystem_tool(name: &str) -> bool {
    FILESYSTEM_TOOLS.contains(&name)
}

/// Outcome of [`CommandGuard::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub safe: bool,
    pub reason: Option<String>,
}

impl Validation {
    pub fn safe() -> Self {
        Self {
            safe: true,
            reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
        }
    }
}

pub struct CommandGuard {
    root: PathBuf,
}

impl CommandGuard {
    pub fn new(project_root: &Path) -> Self {
        Self {
            root: normalize_root(project_root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` (relative or absolute) resolves inside the project root.
    pub fn is_path_safe(&self, path: &str) -> bool {
        resolve_within(&self.root, path).is_ok()
    }

    /// Policy check for a single call. Unknown tools pass by default.
    pub fn validate(&self, call: &ToolCall) -> Validation {
        if is_filesystem_tool(&call.name) {
            let path = call.str_param("path").unwrap_or(".");
            return match resolve_within(&self.root, path) {
                Ok(_) => Validation::safe(),
                Err(reason) => Validation::reject(reason),
            };
        }

        if call.name == SHELL_TOOL {
            let Some(command) = call.str_param("command") else {
                return Validation::reject("Missing 'command' parameter.");
            };
            if let Some(pattern) = catastrophic_command_reason(command) {
                tracing::warn!(
                    tool = %call.name,
                    command = command,
                    blocked_pattern = pattern,
                    "Guard blocked catastrophic command"
                );
                return Validation::reject(format!(
                    "Command is explicitly forbidden ({}).",
                    pattern
                ));
            }
        }

        Validation::safe()
    }

    /// Ask the human whether a dangerous call may run.
    pub async fn confirm(&self, port: &dyn InteractionPort, call: &ToolCall) -> bool {
        port.confirm(&describe_call(call)).await
    }
}

/// Human-readable description of a call for confirmation prompts.
pub fn describe_call(call: &ToolCall) -> String {
    match (call.name.as_str(), call.str_param("command")) {
        (SHELL_TOOL, Some(command)) => format!("[SECURITY] AI wants to run: {}", command),
        _ => format!(
            "[SECURITY] AI wants to call '{}' with {}",
            call.name,
            call.parameters_value()
        ),
    }
}

/// Reason a shell command is on the catastrophic denylist, if it is.
pub fn catastrophic_command_reason(command: &str) -> Option<&'static str> {
    if FORK_BOMB_PATTERN.is_match(command) {
        return Some("fork bomb");
    }
    if NETWORK_PIPE_TO_SHELL_PATTERN.is_match(command) {
        return Some("network script piped to shell");
    }
    if RAW_DISK_REDIRECT_PATTERN.is_match(command) {
        return Some("raw disk write");
    }

    simple_commands(command)
        .iter()
        .find_map(|words| simple_command_reason(words))
}

/// Separators that end one simple command and start the next.
const COMMAND_SEPARATORS: &[char] = &[';', '|', '&', '\n'];

/// Wrappers that run their arguments as the real command.
const COMMAND_WRAPPERS: &[&str] = &["sudo", "doas", "env", "nohup", "exec", "time", "command"];

/// Directories whose subtrees may never be deleted recursively.
const PROTECTED_TREES: &[&str] = &[
    "/etc", "/usr", "/var", "/bin", "/sbin", "/boot", "/lib", "/lib64", "/opt", "/root", "/sys",
    "/proc", "/dev",
];

/// Split a command line into word lists, one per simple command.
///
/// Quoting is resolved by `shell_words` first, so a separator inside a quoted
/// argument also splits.
fn simple_commands(command: &str) -> Vec<Vec<String>> {
    let words = shell_words::split(command)
        .unwrap_or_else(|_| command.split_whitespace().map(ToString::to_string).collect());

    let mut commands: Vec<Vec<String>> = vec![Vec::new()];
    for word in words {
        for (i, piece) in word.split(COMMAND_SEPARATORS).enumerate() {
            if i > 0 {
                commands.push(Vec::new());
            }
            if !piece.is_empty() {
                if let Some(current) = commands.last_mut() {
                    current.push(piece.to_string());
                }
            }
        }
    }
    commands.retain(|words| !words.is_empty());
    commands
}

fn simple_command_reason(words: &[String]) -> Option<&'static str> {
    let words = skip_wrappers(words);
    let (program, args) = words.split_first()?;
    let program = program.rsplit('/').next().unwrap_or(program).to_ascii_lowercase();

    match program.as_str() {
        "rm" if deletes_protected_tree(args) => Some("recursive deletion of a system path"),
        "dd" if args
            .iter()
            .any(|a| a.starts_with("of=/dev/") || a.starts_with("if=/dev/")) =>
        {
            Some("raw disk access with dd")
        }
        "wipefs" | "fdisk" | "parted" => Some("filesystem formatting"),
        p if p.starts_with("mkfs") => Some("filesystem formatting"),
        "shred" if args.iter().any(|a| a.starts_with("/dev/")) => Some("raw disk write"),
        _ => None,
    }
}

/// Drop leading `FOO=1` assignments and wrappers so `sudo rm -rf /` is seen as `rm`.
fn skip_wrappers(words: &[String]) -> &[String] {
    let skip = words
        .iter()
        .take_while(|w| is_env_assignment(w) || COMMAND_WRAPPERS.contains(&w.as_str()))
        .count();
    &words[skip..]
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((key, _)) => {
            !key.is_empty() && key.chars().all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

fn deletes_protected_tree(args: &[String]) -> bool {
    let recursive = args.iter().any(|a| {
        a == "--recursive" || (a.starts_with('-') && !a.starts_with("--") && a.contains(['r', 'R']))
    });
    recursive
        && args
            .iter()
            .filter(|a| !a.starts_with('-'))
            .any(|target| is_protected_target(target))
}

/// Whether removing `target` recursively would wipe the root or a protected tree.
/// Targets are compared after lexical normalization, so `/./` counts as `/`.
fn is_protected_target(target: &str) -> bool {
    // A trailing glob deletes everything inside its directory.
    let target = match target.strip_suffix('*') {
        Some(dir) if dir.is_empty() || dir.ends_with('/') => dir,
        _ => target,
    };

    if let Some(rest) = strip_home_prefix(target) {
        // Anything that normalizes to the home directory or climbs out of it.
        return match normalize_lexically(Path::new(rest)) {
            Some(inside) => inside.as_os_str().is_empty(),
            None => true,
        };
    }

    let path = Path::new(target);
    let Some(normalized) = normalize_lexically(path) else {
        return true;
    };
    if !path.is_absolute() {
        // The working directory itself or something above it.
        return normalized.as_os_str().is_empty();
    }

    normalized == Path::new("/")
        || normalized == Path::new("/home")
        || PROTECTED_TREES.iter().any(|tree| normalized.starts_with(tree))
}

/// The path below `~`, `$HOME` or `${HOME}`, when the target starts there.
fn strip_home_prefix(target: &str) -> Option<&str> {
    ["${HOME}", "$HOME", "~"].iter().find_map(|home| {
        let rest = target.strip_prefix(home)?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    })
}
