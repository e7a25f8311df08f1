//! File read tool: read file contents inside the workspace.

use async_trait::async_trait;
use handoff_core::{Tool, ToolError, ToolResult};
use handoff_security::Sandbox;

pub struct FileReadTool {
    sandbox: Sandbox,
}

impl FileReadTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

/// Prefix each line with its 1-based number, right-aligned to width 6.
fn number_lines(content: &str) -> String {
    content
        .split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:>6} | {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "readFile"
    }

    fn description(&self) -> &str {
        "Reads the entire contents of a file using UTF-8 encoding"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "description": "The relative or absolute file path"
                },
                "includeLineNumbers": {
                    "type": "boolean",
                    "description": "Include line numbers in the output",
                    "default": false
                }
            },
            "required": ["filePath"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let file_path = arguments["filePath"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'filePath' argument".into()))?;
        let include_line_numbers = arguments["includeLineNumbers"].as_bool().unwrap_or(false);

        let path = self.sandbox.resolve(file_path)?;
        tracing::info!(path = %path.display(), include_line_numbers, "Reading file");

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to read {}: {e}", path.display())))?;

        if include_line_numbers {
            Ok(ToolResult::ok(number_lines(&content)))
        } else {
            Ok(ToolResult::ok(content))
        }
    }
}
