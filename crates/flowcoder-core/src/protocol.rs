//! Tool-call wire format embedded in agent free text
//!
//! Agents request actions with one or more blocks of the form
//!
//! ```text
//! <tool_call>
//! {"name": "read_file", "parameters": {"path": "src/lib.rs"}}
//! </tool_call>
//! ```
//!
//! Tool output goes back into history wrapped in `<tool_result>` markers.
//! The planner states its delegate in a `<dispatch>` block.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

pub const TOOL_CALL_OPEN: &str = "<tool_call>";
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";
pub const TOOL_RESULT_OPEN: &str = "<tool_result>";
pub const TOOL_RESULT_CLOSE: &str = "</tool_result>";

/// Prefix a tool returns to ask the human a question mid-queue.
pub const PAUSE_SENTINEL: &str = "[[ASK_USER]]";

static DISPATCH_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<dispatch>(.*?)</dispatch>").unwrap());

/// A structured action request parsed from agent output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, parameters: Value) -> Self {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// String parameter lookup.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    pub fn parameters_value(&self) -> Value {
        Value::Object(self.parameters.clone())
    }
}

/// Extract every well-formed tool call, in document order.
///
/// Each closing marker pairs with the nearest opening marker before it, so an
/// unterminated block cannot swallow the block that follows. A block whose
/// payload does not parse is logged and skipped; its siblings are unaffected.
pub fn parse(text: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut rest = text;
    let mut index = 0;

    while let Some(close) = rest.find(TOOL_CALL_CLOSE) {
        let before = &rest[..close];
        if let Some(open) = before.rfind(TOOL_CALL_OPEN) {
            let payload = &before[open + TOOL_CALL_OPEN.len()..];
            match parse_block(payload) {
                Ok(call) => calls.push(call),
                Err(e) => tracing::warn!(block = index, error = %e, "Skipping tool call block"),
            }
            index += 1;
        }
        rest = &rest[close + TOOL_CALL_CLOSE.len()..];
    }

    calls
}

fn parse_block(payload: &str) -> Result<ToolCall, ProtocolError> {
    let call: ToolCall = serde_json::from_str(payload.trim())?;
    if call.name.trim().is_empty() {
        return Err(ProtocolError::EmptyName);
    }
    Ok(call)
}

/// Wrap tool output for re-injection into history.
///
/// Marker sequences inside `text` are not escaped.
pub fn format_result(text: &str) -> String {
    format!("\n{TOOL_RESULT_OPEN}\n{text}\n{TOOL_RESULT_CLOSE}\n")
}

/// Inverse of [`format_result`] for text that does not itself contain the markers.
pub fn strip_result(wrapped: &str) -> Option<&str> {
    wrapped
        .strip_prefix(&format!("\n{TOOL_RESULT_OPEN}\n"))?
        .strip_suffix(&format!("\n{TOOL_RESULT_CLOSE}\n"))
}

/// Build a pause request carrying a question for the human.
pub fn pause_request(question: &str) -> String {
    format!("{PAUSE_SENTINEL} {question}")
}

/// If `output` is a pause request, return the question.
pub fn pause_question(output: &str) -> Option<&str> {
    output
        .strip_prefix(PAUSE_SENTINEL)
        .map(|question| question.trim())
}

/// Specialist the planner hands the turn to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Delegate {
    Patch,
    Boilerplate,
    Template,
    Refactor,
    #[default]
    None,
}

#[derive(Deserialize)]
struct DispatchPayload {
    #[serde(default)]
    delegate: Delegate,
}

/// Read the planner's delegation decision.
///
/// Only an explicit `<dispatch>` block routes; agent names mentioned in
/// prose are ignored. The last well-formed block wins.
pub fn parse_dispatch(text: &str) -> Delegate {
    DISPATCH_BLOCK
        .captures_iter(text)
        .filter_map(|caps| {
            let payload = caps.get(1)?.as_str().trim();
            match serde_json::from_str::<DispatchPayload>(payload) {
                Ok(p) => Some(p.delegate),
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed dispatch block, ignoring");
                    None
                }
            }
        })
        .last()
        .unwrap_or_default()
}
