//! Shared notes: an append-only log threaded through a delegation tree.
//!
//! The log's length doubles as its version. A child receives a
//! [`NotesView`] pinned at the version current when it was spawned, so
//! exactly the notes attached before that moment are prefixed to its task.

use std::sync::Arc;

use async_trait::async_trait;
use handoff_core::{Tool, ToolError, ToolResult};
use parking_lot::Mutex;

/// The acknowledgement returned by `attachNotes`.
pub const NOTES_ATTACHED: &str = "Notes attached.";

/// Append-only, shared-by-reference list of notes.
#[derive(Clone, Default)]
pub struct NotesLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl NotesLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a note and return the new version.
    pub fn append(&self, note: impl Into<String>) -> usize {
        let mut entries = self.entries.lock();
        entries.push(note.into());
        entries.len()
    }

    /// Number of notes, which is also the current version.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All notes attached so far.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// A view pinned at the current version.
    pub fn view(&self) -> NotesView {
        NotesView {
            version: self.len(),
            log: self.clone(),
        }
    }

    /// Whether both handles refer to the same log.
    pub fn shares_with(&self, other: &NotesLog) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl std::fmt::Debug for NotesLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotesLog").field("len", &self.len()).finish()
    }
}

/// A log reference plus the version a Runner was created at.
#[derive(Debug, Clone)]
pub struct NotesView {
    log: NotesLog,
    version: usize,
}

impl NotesView {
    pub fn log(&self) -> &NotesLog {
        &self.log
    }

    pub fn version(&self) -> usize {
        self.version
    }

    /// Notes attached before this view was taken, in attachment order.
    pub fn inherited(&self) -> Vec<String> {
        let entries = self.log.entries.lock();
        entries[..self.version.min(entries.len())].to_vec()
    }

    /// The first user message for a delegated task: inherited notes, each
    /// separated by a blank line, then the task.
    pub fn prefix(&self, task: &str) -> String {
        let mut parts = self.inherited();
        if parts.is_empty() {
            return task.to_string();
        }
        parts.push(task.to_string());
        parts.join("\n\n")
    }
}

/// `attachNotes`: record context for agents created later in the tree.
pub struct AttachNotesTool {
    log: NotesLog,
}

impl AttachNotesTool {
    pub const NAME: &'static str = "attachNotes";

    pub fn new(log: NotesLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Tool for AttachNotesTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Attach notes that will be shared with every team member you assign work to from now on"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "notes": {
                    "type": "string",
                    "description": "Notes to share, using absolute file paths"
                }
            },
            "required": ["notes"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let notes = arguments["notes"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'notes' argument".into()))?;
        let version = self.log.append(notes);
        tracing::info!(version, "Attached notes");
        Ok(ToolResult::ok(NOTES_ATTACHED))
    }
}
