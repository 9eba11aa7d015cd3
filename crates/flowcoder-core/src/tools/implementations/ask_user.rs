//! ask_user - Pause the command queue and ask the human a question
//!
//! The tool itself only produces the pause sentinel; the orchestrator sees
//! it, asks the human, and records the answer before the queue continues.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::protocol::pause_request;
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct AskUserTool;

#[derive(Deserialize)]
struct Params {
    question: String,
}

#[async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &str {
        "ask_user"
    }

    fn description(&self) -> &str {
        "Ask the user a clarifying question. Use only when you cannot proceed without their input."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to show the user"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        match parse_params::<Params>(params) {
            Ok(p) => ToolResult::success(pause_request(&p.question)),
            Err(e) => e,
        }
    }
}
