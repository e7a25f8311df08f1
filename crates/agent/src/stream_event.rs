//! Runner-level streaming events.
//!
//! `RunnerEvent` is what observers of a Runner see: content deltas, every
//! message appended to the conversation, the lifecycle of each tool call,
//! and the delegation/handoff notifications that move focus between a
//! parent and a child. Events from a child are relayed to its parent, so a
//! subscriber on the root sees the whole active subtree as one stream.

use handoff_core::Message;

use crate::runner::Runner;

/// Which way observation focus moves on a handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffDirection {
    /// A delegated child is about to receive its task.
    ToChild,
    /// The child finished and control returns to the delegating parent.
    ToParent,
}

/// Events emitted by a Runner during a turn.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    /// Partial text from the model, or the `"\n\n"` separator that follows
    /// each appended message.
    Content(String),

    /// A message was appended to a conversation log.
    Message(Message),

    /// A tool call is about to run.
    ToolCallStarted {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },

    /// A tool call completed; `output` is what the model will see.
    ToolCallFinished {
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    /// A delegation tool was invoked with this task.
    Delegating { tool_name: String, task: String },

    /// Focus moves to `runner`.
    Handoff {
        direction: HandoffDirection,
        runner: Runner,
    },
}

impl RunnerEvent {
    /// Short name for this event type, used in logs.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Content(_) => "content",
            Self::Message(_) => "message",
            Self::ToolCallStarted { .. } => "tool_call_started",
            Self::ToolCallFinished { .. } => "tool_call_finished",
            Self::Delegating { .. } => "delegating",
            Self::Handoff { .. } => "handoff",
        }
    }

    /// The text of a content event.
    pub fn as_content(&self) -> Option<&str> {
        match self {
            Self::Content(text) => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names() {
        assert_eq!(RunnerEvent::Content("x".into()).event_type(), "content");
        assert_eq!(
            RunnerEvent::Message(Message::assistant("x")).event_type(),
            "message"
        );
        assert_eq!(
            RunnerEvent::ToolCallStarted {
                id: "a".into(),
                name: "b".into(),
                arguments: serde_json::Value::Null
            }
            .event_type(),
            "tool_call_started"
        );
        assert_eq!(
            RunnerEvent::ToolCallFinished {
                id: "a".into(),
                name: "b".into(),
                output: "c".into(),
                success: true
            }
            .event_type(),
            "tool_call_finished"
        );
        assert_eq!(
            RunnerEvent::Delegating {
                tool_name: "assignToDeveloper".into(),
                task: "t".into()
            }
            .event_type(),
            "delegating"
        );
    }

    #[test]
    fn content_accessor() {
        assert_eq!(RunnerEvent::Content("hi".into()).as_content(), Some("hi"));
        assert_eq!(RunnerEvent::Message(Message::user("hi")).as_content(), None);
    }
}
