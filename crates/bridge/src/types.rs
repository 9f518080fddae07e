//! Types exchanged with the model runtime.
//!
//! These mirror what a chat client needs to auto-dispatch tools: a spec to
//! advertise, a call to execute, and a result to feed back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::CallResult;

/// What the model is told about one wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Object schema keyed by the wrapper's declared parameter names.
    pub input_schema: Value,
}

/// The model asking for one wrapper to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Echoed back in the matching [`ToolResult`].
    pub id: String,
    pub name: String,
    /// Named arguments; `null` means none.
    pub input: Value,
}

/// How a dispatched call ended, in the shape a chat client feeds back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolOutcome {
    Success { output: Value },
    Error { message: String },
}

impl ToolOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self::Success {
            output: Value::String(output.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<CallResult> for ToolOutcome {
    fn from(result: CallResult) -> Self {
        match result {
            CallResult::Text { value } => Self::success(value),
            error @ CallResult::Error { .. } => Self::error(error.into_text()),
        }
    }
}

/// A [`ToolOutcome`] tagged with the [`ToolCall`] it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn new(tool_call_id: impl Into<String>, outcome: impl Into<ToolOutcome>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome: outcome.into(),
        }
    }

    pub fn error(tool_call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(tool_call_id, ToolOutcome::error(message))
    }
}
