//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give an agent the ability to act: read and write files,
//! patch code, record notes, or hand a task to another agent.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;
use crate::validation::validate_arguments;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Parse the raw JSON arguments the model produced.
    ///
    /// An empty argument string is treated as `{}`.
    pub fn from_message(call: &MessageToolCall) -> Result<Self, ToolError> {
        let raw = call.arguments.trim();
        let arguments = if raw.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(raw)
                .map_err(|e| ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")))?
        };
        Ok(Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        })
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,
}

impl ToolResult {
    /// A successful result. The call id is filled in by the registry.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
        }
    }

    /// A failed result the model should see and react to.
    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: false,
            output: output.into(),
        }
    }
}

/// The core Tool trait.
///
/// Handlers receive arguments that already passed schema validation.
/// Returning a recoverable `ToolError` reports its text to the model;
/// `ToolError::Fatal` and `ToolError::Transport` abort the turn.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "readFile").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// An ordered set of tools with unique names.
///
/// The agent uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Look up and invoke tools when the model requests them
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name,
    /// keeping its position.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(i) => self.tools[i] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Get all tool definitions, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and execute a tool call, returning tool errors as-is.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        validate_arguments(&call.arguments, &tool.parameters_schema())
            .map_err(ToolError::InvalidArguments)?;
        let mut result = tool.execute(call.arguments.clone()).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    /// The tool-invocation boundary.
    ///
    /// Recoverable errors become a failed `ToolResult` carrying the error's
    /// display string. Fatal errors are returned and abort the turn.
    pub async fn invoke(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        match self.execute(call).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_recoverable() => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool failed, reporting to model");
                let mut result = ToolResult::failure(e.to_string());
                result.call_id = call.id.clone();
                Ok(result)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            match arguments["text"].as_str().unwrap_or("") {
                "explode" => Err(ToolError::failed("echo", "refusing to explode")),
                "panic-ish" => Err(ToolError::Fatal("unrecoverable".into())),
                text => Ok(ToolResult::ok(text)),
            }
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry
    }

    fn call(arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments,
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = registry();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.definitions()[0].name, "echo");
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = registry();
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn invoke_success_sets_call_id() {
        let result = registry()
            .invoke(&call(serde_json::json!({"text": "hello world"})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello world");
        assert_eq!(result.call_id, "call_1");
    }

    #[tokio::test]
    async fn recoverable_error_becomes_output() {
        let result = registry()
            .invoke(&call(serde_json::json!({"text": "explode"})))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(
            result.output,
            ToolError::failed("echo", "refusing to explode").to_string()
        );
    }

    #[tokio::test]
    async fn fatal_error_propagates() {
        let err = registry()
            .invoke(&call(serde_json::json!({"text": "panic-ish"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Fatal(_)));
    }

    #[tokio::test]
    async fn schema_violation_reported_to_model() {
        let result = registry().invoke(&call(serde_json::json!({}))).await.unwrap();
        assert!(!result.success);
        assert!(result.output.contains("missing required field 'text'"));
    }

    #[tokio::test]
    async fn missing_tool_reported_to_model() {
        let registry = ToolRegistry::new();
        let result = registry.invoke(&call(serde_json::json!({}))).await.unwrap();
        assert!(!result.success);
        assert!(result.output.contains("Tool not found: echo"));
    }

    #[test]
    fn tool_call_parses_empty_arguments() {
        let call = ToolCall::from_message(&MessageToolCall {
            id: "c".into(),
            name: "currentWorkingDirectory".into(),
            arguments: "".into(),
        })
        .unwrap();
        assert!(call.arguments.as_object().unwrap().is_empty());
    }

    #[test]
    fn tool_call_rejects_bad_json() {
        let err = ToolCall::from_message(&MessageToolCall {
            id: "c".into(),
            name: "readFile".into(),
            arguments: "{not json".into(),
        })
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
