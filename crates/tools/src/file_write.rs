//! File write tool: create files inside the workspace.

use async_trait::async_trait;
use handoff_config::WritePolicy;
use handoff_core::{Tool, ToolError, ToolResult};
use handoff_security::Sandbox;

pub struct FileWriteTool {
    sandbox: Sandbox,
    policy: WritePolicy,
}

impl FileWriteTool {
    pub fn new(sandbox: Sandbox, policy: WritePolicy) -> Self {
        Self { sandbox, policy }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "writeFile"
    }

    fn description(&self) -> &str {
        match self.policy {
            WritePolicy::RejectExisting => {
                "Writes data to a file using UTF-8 encoding. Does not overwrite existing files."
            }
            WritePolicy::Overwrite => {
                "Writes data to a file using UTF-8 encoding. Overwrites existing files."
            }
        }
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "description": "The absolute path of the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["filePath", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let file_path = arguments["filePath"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'filePath' argument".into()))?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let path = self.sandbox.resolve(file_path)?;

        if self.policy == WritePolicy::RejectExisting && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(ToolResult::failure(format!(
                "File with path \"{file_path}\" already exists"
            )));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::failed(self.name(), format!("Failed to create directories: {e}")))?;
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to write {}: {e}", path.display())))?;

        tracing::info!(path = %path.display(), bytes = content.len(), "Wrote file");
        Ok(ToolResult::ok(format!(
            "File with path \"{file_path}\" has been modified"
        )))
    }
}
