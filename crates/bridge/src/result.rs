//! Call outcomes handed back to the model runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a call produced no tool output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No result within the call window.
    Timeout,
    /// The remote service failed or answered with something unusable.
    RemoteCall,
    /// The bridge was not running or could not queue the call.
    Schedule,
    /// The arguments did not match the tool's declared parameters.
    InvalidArguments,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RemoteCall => "remote call failed",
            Self::Schedule => "not scheduled",
            Self::InvalidArguments => "invalid arguments",
        }
    }
}

/// Outcome of exactly one tool call. Always convertible to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallResult {
    Text { value: String },
    Error { kind: ErrorKind, message: String },
}

impl CallResult {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    /// Render a successful `tools/call` result.
    pub fn from_remote(result: &mcp::CallToolResult) -> Self {
        Self::text(render(result))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Error kind, if this is an error.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Text { .. } => None,
            Self::Error { kind, .. } => Some(*kind),
        }
    }

    /// Text the model runtime can reason about, for success and failure.
    pub fn into_text(self) -> String {
        match self {
            Self::Text { value } => value,
            Self::Error { kind, message } => format!("error ({}): {message}", kind.as_str()),
        }
    }
}

impl std::fmt::Display for CallResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text { value } => f.write_str(value),
            Self::Error { kind, message } => write!(f, "error ({}): {message}", kind.as_str()),
        }
    }
}

/// Turn tool content into plain text.
///
/// Text blocks are joined; without any, `structuredContent` is used. A JSON
/// object with a single field is reduced to that field's value.
fn render(result: &mcp::CallToolResult) -> String {
    let text = result.text();
    if !text.trim().is_empty() {
        return match serde_json::from_str::<Value>(&text) {
            Ok(value) => unwrap_single_field(&value).unwrap_or(text),
            Err(_) => text,
        };
    }

    match &result.structured_content {
        Some(value) => unwrap_single_field(value).unwrap_or_else(|| render_value(value)),
        None => String::new(),
    }
}

fn unwrap_single_field(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.values().next().map(render_value)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                return n.to_string();
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                    format!("{}", f as i64)
                }
                _ => n.to_string(),
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp::{CallToolResult, ToolContent};
    use serde_json::json;

    fn result(content: Vec<ToolContent>, structured: Option<Value>) -> CallToolResult {
        CallToolResult {
            content,
            structured_content: structured,
            is_error: false,
        }
    }

    #[test]
    fn single_field_object_renders_its_value() {
        let r = result(vec![ToolContent::text(r#"{"bestand": 43.0}"#)], None);
        assert_eq!(CallResult::from_remote(&r), CallResult::text("43"));
    }

    #[test]
    fn structured_content_used_without_text() {
        let r = result(Vec::new(), Some(json!({"bestand": 43.5})));
        assert_eq!(CallResult::from_remote(&r), CallResult::text("43.5"));

        let r = result(Vec::new(), Some(json!({"a": 1, "b": 2})));
        assert_eq!(CallResult::from_remote(&r), CallResult::text(r#"{"a":1,"b":2}"#));
    }

    #[test]
    fn plain_text_passes_through() {
        let r = result(
            vec![ToolContent::text("Bestand: 43"), ToolContent::text("ok")],
            None,
        );
        assert_eq!(CallResult::from_remote(&r), CallResult::text("Bestand: 43\nok"));

        let r = result(vec![ToolContent::text(r#"{"a": 1, "b": 2}"#)], None);
        assert_eq!(CallResult::from_remote(&r), CallResult::text(r#"{"a": 1, "b": 2}"#));
    }

    #[test]
    fn empty_result_is_empty_text() {
        let r = result(Vec::new(), None);
        assert_eq!(CallResult::from_remote(&r), CallResult::text(""));
    }

    #[test]
    fn errors_render_as_text() {
        let r = CallResult::error(ErrorKind::Timeout, "tool slow timed out after 30s");
        assert!(r.is_error());
        assert_eq!(r.error_kind(), Some(ErrorKind::Timeout));
        assert_eq!(r.into_text(), "error (timeout): tool slow timed out after 30s");
    }
}
