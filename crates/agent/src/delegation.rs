//! Delegation: tools that spawn a child Runner, drive it through one turn,
//! and return its answer to the parent's model.
//!
//! Per invocation, in order:
//! 1. refuse if the child would exceed the configured depth limit
//! 2. emit `Delegating` with the task
//! 3. spawn the child with the parent's credentials and a notes view
//! 4. relay the child's events into the parent
//! 5. emit `Handoff { ToChild }`
//! 6. send the notes-prefixed task as the child's first message
//! 7. emit `Handoff { ToParent }`
//! 8. return the child's first message content, or `DelegationResultMissing`

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use handoff_core::{Credentials, Result, Tool, ToolError, ToolResult};
use tracing::info;

use crate::notes::NotesView;
use crate::runner::{Runner, RunnerInner};
use crate::stream_event::{HandoffDirection, RunnerEvent};

/// What a child factory receives from the delegating parent.
#[derive(Debug, Clone)]
pub struct SpawnContext {
    /// The parent's credentials (same allocation, not a copy).
    pub credentials: Credentials,
    /// The shared notes log pinned at spawn time.
    pub notes: NotesView,
    /// Depth of the child in the delegation tree (root is 0).
    pub depth: u32,
}

/// Builds the child Runner for a delegation.
pub trait ChildFactory: Send + Sync {
    fn spawn(&self, ctx: SpawnContext) -> Result<Runner>;

    /// Validate the factory when its descriptor is materialized into a tool.
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

impl<F> ChildFactory for F
where
    F: Fn(SpawnContext) -> Result<Runner> + Send + Sync,
{
    fn spawn(&self, ctx: SpawnContext) -> Result<Runner> {
        self(ctx)
    }
}

/// Declares a delegation tool on a Runner. Turned into a [`DelegationTool`]
/// on the Runner's first turn.
#[derive(Clone)]
pub struct DelegationDescriptor {
    pub tool_name: String,
    pub tool_description: String,
    /// Description of the `taskDescription` parameter shown to the model.
    pub task_description_hint: String,
    pub factory: Arc<dyn ChildFactory>,
}

impl DelegationDescriptor {
    pub fn new(
        tool_name: impl Into<String>,
        tool_description: impl Into<String>,
        task_description_hint: impl Into<String>,
        factory: impl ChildFactory + 'static,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_description: tool_description.into(),
            task_description_hint: task_description_hint.into(),
            factory: Arc::new(factory),
        }
    }
}

impl std::fmt::Debug for DelegationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationDescriptor")
            .field("tool_name", &self.tool_name)
            .finish_non_exhaustive()
    }
}

/// A materialized delegation descriptor, bound to its parent Runner.
pub(crate) struct DelegationTool {
    descriptor: DelegationDescriptor,
    parent: Weak<RunnerInner>,
}

impl DelegationTool {
    pub(crate) fn new(descriptor: DelegationDescriptor, parent: Weak<RunnerInner>) -> Self {
        Self { descriptor, parent }
    }
}

#[async_trait]
impl Tool for DelegationTool {
    fn name(&self) -> &str {
        &self.descriptor.tool_name
    }

    fn description(&self) -> &str {
        &self.descriptor.tool_description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "taskDescription": {
                    "type": "string",
                    "description": self.descriptor.task_description_hint
                }
            },
            "required": ["taskDescription"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
        let task = arguments["taskDescription"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'taskDescription' argument".into()))?;
        if task.trim().is_empty() {
            return Err(ToolError::InvalidArguments("'taskDescription' must not be empty".into()));
        }
        let tool_name = self.descriptor.tool_name.clone();
        let parent = self
            .parent
            .upgrade()
            .ok_or_else(|| ToolError::Fatal(format!("runner owning '{tool_name}' was dropped")))?;

        let depth = parent.depth() + 1;
        if let Some(max_depth) = parent.max_delegation_depth()
            && depth > max_depth
        {
            return Err(ToolError::DelegationDepthExceeded { tool_name, max_depth });
        }

        parent
            .emit(RunnerEvent::Delegating {
                tool_name: tool_name.clone(),
                task: task.to_string(),
            })
            .await;

        let parent_runner = Runner::from_inner(parent.clone());
        let child = self.descriptor.factory.spawn(SpawnContext {
            credentials: parent.credentials().clone(),
            notes: parent.notes().log().view(),
            depth,
        })?;
        child.relay_to(&parent_runner);
        info!(
            tool = %tool_name,
            parent = %parent.id(),
            child = %child.id(),
            role = %child.role(),
            depth,
            "Delegating task"
        );

        parent
            .emit(RunnerEvent::Handoff {
                direction: HandoffDirection::ToChild,
                runner: child.clone(),
            })
            .await;

        let first_message = child.notes().prefix(task);
        let outcome = child.send_message(first_message).await;

        parent
            .emit(RunnerEvent::Handoff {
                direction: HandoffDirection::ToParent,
                runner: parent_runner,
            })
            .await;

        let result = outcome?;
        match result.first_message_content() {
            Some(content) => Ok(ToolResult::ok(content)),
            None => Err(ToolError::DelegationResultMissing { tool_name }),
        }
    }
}
