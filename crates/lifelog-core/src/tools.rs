use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::UpstreamError;

/// One content item inside a tool result envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Text {
            text: format!("Error: {}", text.into()),
        }
    }
}

/// The uniform envelope every tool invocation produces, success or failure.
/// `isError` is always serialized so callers never have to infer it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
}

impl CallToolResult {
    /// Success envelope: the handler's return value inside a single text
    /// item. String returns are emitted verbatim (confirmation messages);
    /// everything else is pretty-printed JSON.
    pub fn success(value: &serde_json::Value) -> Self {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };
        Self {
            content: vec![ToolContent::text(text)],
            is_error: false,
        }
    }

    /// Failure envelope: `Error: <message>` in a single text item.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::error(message)],
            is_error: true,
        }
    }
}

/// Tool definition advertised over `tools/list`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("lifelog client not initialized. API key required")]
    NotInitialized,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Trait implemented by each tool. Handlers receive arguments already
/// validated against the tool's parameter schema and return the raw value
/// that dispatch wraps into the result envelope.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_pretty_prints() {
        let value = serde_json::json!({"count": 2, "items": ["a", "b"]});
        let result = CallToolResult::success(&value);
        assert!(!result.is_error);
        let ToolContent::Text { text } = &result.content[0];
        assert!(text.contains("\n"), "expected pretty-printed JSON: {text}");
        let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn success_envelope_emits_strings_verbatim() {
        let value = serde_json::json!("Successfully deleted lifelog with ID: ll_7");
        let result = CallToolResult::success(&value);
        let ToolContent::Text { text } = &result.content[0];
        assert_eq!(text, "Successfully deleted lifelog with ID: ll_7");
    }

    #[test]
    fn error_envelope_prefixes_message() {
        let result = CallToolResult::error("not found: ll_404");
        assert!(result.is_error);
        let ToolContent::Text { text } = &result.content[0];
        assert_eq!(text, "Error: not found: ll_404");
    }

    #[test]
    fn envelope_wire_shape() {
        let json = serde_json::to_value(CallToolResult::error("boom")).unwrap();
        assert_eq!(json["isError"], true);
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "Error: boom");

        let json = serde_json::to_value(CallToolResult::success(&serde_json::json!(1))).unwrap();
        assert_eq!(json["isError"], false);
    }

    #[test]
    fn tool_error_display() {
        let err = ToolError::InvalidArguments("missing required parameter: id".into());
        assert_eq!(
            err.to_string(),
            "invalid arguments: missing required parameter: id"
        );
        assert_eq!(
            ToolError::NotInitialized.to_string(),
            "lifelog client not initialized. API key required"
        );
        let err: ToolError = UpstreamError::NotFound("ll_404".into()).into();
        assert_eq!(err.to_string(), "not found: ll_404");
    }
}
