//! Reports the workspace root as the working directory.

use async_trait::async_trait;
use handoff_core::{Tool, ToolError, ToolResult};
use handoff_security::Sandbox;

pub struct CurrentDirectoryTool {
    sandbox: Sandbox,
}

impl CurrentDirectoryTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for CurrentDirectoryTool {
    fn name(&self) -> &str {
        "currentWorkingDirectory"
    }

    fn description(&self) -> &str {
        "Get the current working directory"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let cwd = self.sandbox.root().to_string_lossy().into_owned();
        tracing::info!(cwd = %cwd, "Got current working directory");
        Ok(ToolResult::ok(cwd))
    }
}
