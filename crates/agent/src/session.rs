//! Streaming session: one turn of a Runner against the transport.
//!
//! Each completion is streamed; content deltas are forwarded as they
//! arrive, the finished assistant message is appended, and any requested
//! tools are run before the next completion is requested. The loop ends
//! when a completion asks for no tools, comes back without a choice, or the
//! completion limit is reached.

use std::sync::Arc;

use futures::future::join_all;
use handoff_core::{Error, Message, MessageToolCall, ProviderRequest, Result, ToolCall, ToolError, ToolRegistry, Usage};
use serde::Serialize;
use tracing::{debug, warn};

use crate::runner::RunnerInner;

/// The finalized result of one turn.
#[derive(Debug, Clone, Default)]
pub struct TurnResult {
    /// Choices of the last completion. Empty if the transport returned none.
    pub choices: Vec<Choice>,
    /// Every tool call run during the turn, in request order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Usage summed over all completions, if the transport reported any.
    pub usage: Option<Usage>,
    pub completions: u32,
}

#[derive(Debug, Clone)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub output: String,
    pub success: bool,
}

impl TurnResult {
    pub fn first_message(&self) -> Option<&Message> {
        self.choices.first().map(|c| &c.message)
    }

    /// Content of the first choice's message. An empty message counts as
    /// no message.
    pub fn first_message_content(&self) -> Option<&str> {
        self.first_message()
            .map(|m| m.content.as_str())
            .filter(|content| !content.is_empty())
    }
}

/// What one streamed completion produced.
struct Completion {
    has_choice: bool,
    content: String,
    tool_calls: Vec<MessageToolCall>,
    usage: Option<Usage>,
}

pub(crate) async fn run(runner: &RunnerInner, tools: Arc<ToolRegistry>) -> Result<TurnResult> {
    let max_completions = runner.settings().max_chat_completions;
    let mut result = TurnResult::default();

    while result.completions < max_completions {
        let completion = stream_completion(runner, &tools).await?;
        result.completions += 1;
        if let Some(usage) = completion.usage {
            result.usage = Some(result.usage.unwrap_or_default().add(usage));
        }

        if !completion.has_choice {
            debug!(runner = %runner.id(), "Completion returned no choices");
            result.choices.clear();
            return Ok(result);
        }

        let mut message = Message::assistant(completion.content);
        message.tool_calls = completion.tool_calls;
        runner.on_message(message.clone()).await;
        result.choices = vec![Choice {
            message: message.clone(),
        }];

        if !message.requests_tools() {
            return Ok(result);
        }

        debug!(count = message.tool_calls.len(), "Running requested tools");
        let records = run_calls(runner, &tools, &message.tool_calls).await?;
        for record in &records {
            runner
                .on_message(Message::tool_result(&record.id, &record.output))
                .await;
        }
        result.tool_calls.extend(records);
    }

    warn!(
        runner = %runner.id(),
        max_completions,
        "Completion limit reached with tool calls still pending"
    );
    Ok(result)
}

async fn stream_completion(runner: &RunnerInner, tools: &ToolRegistry) -> Result<Completion> {
    let settings = runner.settings();
    let request = ProviderRequest {
        model: settings.model.clone(),
        messages: runner.messages_snapshot(),
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
        tools: tools.definitions(),
        stream: true,
    };

    let mut rx = runner.provider().stream(request).await?;
    let mut completion = Completion {
        has_choice: false,
        content: String::new(),
        tool_calls: Vec::new(),
        usage: None,
    };

    while let Some(chunk) = rx.recv().await {
        let chunk = chunk?;
        completion.has_choice |= chunk.carries_choice();
        if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
            completion.content.push_str(&text);
            runner.on_content(text).await;
        }
        completion.tool_calls.extend(chunk.tool_calls);
        if chunk.usage.is_some() {
            completion.usage = chunk.usage;
        }
        if chunk.done {
            break;
        }
    }
    Ok(completion)
}

async fn run_calls(runner: &RunnerInner, tools: &ToolRegistry, calls: &[MessageToolCall]) -> Result<Vec<ToolCallRecord>> {
    let outcomes = if runner.settings().parallel_tool_calls {
        join_all(calls.iter().map(|call| run_call(runner, tools, call))).await
    } else {
        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(run_call(runner, tools, call).await);
        }
        outcomes
    };

    outcomes
        .into_iter()
        .collect::<std::result::Result<Vec<_>, ToolError>>()
        .map_err(|e| match e {
            ToolError::Transport(provider) => Error::Provider(provider),
            other => Error::Tool(other),
        })
}

/// Run one call between its started and finished events. Recoverable
/// failures become a failed record; fatal ones are returned.
async fn run_call(
    runner: &RunnerInner,
    tools: &ToolRegistry,
    call: &MessageToolCall,
) -> std::result::Result<ToolCallRecord, ToolError> {
    let parsed = ToolCall::from_message(call);
    let arguments = match &parsed {
        Ok(parsed) => parsed.arguments.clone(),
        Err(_) => serde_json::Value::String(call.arguments.clone()),
    };
    runner
        .on_tool_call_started(call.id.clone(), call.name.clone(), arguments)
        .await;

    let outcome = match parsed {
        Ok(parsed) => tools.invoke(&parsed).await,
        Err(e) => {
            warn!(tool = %call.name, error = %e, "Tool arguments rejected");
            Ok(handoff_core::ToolResult {
                call_id: call.id.clone(),
                success: false,
                output: e.to_string(),
            })
        }
    };

    match outcome {
        Ok(result) => {
            runner
                .on_tool_call_finished(call.id.clone(), call.name.clone(), result.output.clone(), result.success)
                .await;
            Ok(ToolCallRecord {
                id: call.id.clone(),
                name: call.name.clone(),
                output: result.output,
                success: result.success,
            })
        }
        Err(e) => {
            warn!(tool = %call.name, error = %e, "Tool failed fatally, aborting turn");
            runner
                .on_tool_call_finished(call.id.clone(), call.name.clone(), e.to_string(), false)
                .await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{Runner, RunnerSettings};
    use crate::test_helpers::{FailingTool, ScriptedProvider};
    use handoff_core::{Credentials, ProviderError, Role};

    #[test]
    fn empty_content_counts_as_no_message() {
        let result = TurnResult {
            choices: vec![Choice {
                message: Message::assistant(""),
            }],
            ..TurnResult::default()
        };
        assert!(result.first_message().is_some());
        assert_eq!(result.first_message_content(), None);
        assert_eq!(TurnResult::default().first_message_content(), None);
    }

    #[tokio::test]
    async fn tool_loop_appends_results_in_request_order() {
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::tool_calls(&[("c1", "fail", "{}"), ("c2", "attachNotes", r#"{"notes":"n"}"#)]),
            ScriptedProvider::text("done"),
        ]);
        let runner = Runner::builder(provider.clone(), Credentials::new("t"))
            .tool(Arc::new(FailingTool))
            .build();

        let result = runner.send_message("go").await.unwrap();
        assert_eq!(result.completions, 2);
        assert_eq!(result.first_message_content(), Some("done"));
        assert_eq!(result.tool_calls.len(), 2);
        assert!(!result.tool_calls[0].success);
        assert!(result.tool_calls[1].success);

        let messages = runner.messages();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::Assistant]
        );
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(provider.requests()[1].messages.len(), 4);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_model() {
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::tool_calls(&[("c1", "noSuchTool", "{}")]),
            ScriptedProvider::text("ok"),
        ]);
        let runner = Runner::builder(provider, Credentials::new("t")).build();

        let result = runner.send_message("go").await.unwrap();
        assert_eq!(result.tool_calls[0].output, "Tool not found: noSuchTool");
    }

    #[tokio::test]
    async fn malformed_arguments_are_reported_to_model() {
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::tool_calls(&[("c1", "attachNotes", "{not json")]),
            ScriptedProvider::text("ok"),
        ]);
        let runner = Runner::builder(provider, Credentials::new("t")).build();

        let result = runner.send_message("go").await.unwrap();
        assert!(!result.tool_calls[0].success);
        assert!(result.tool_calls[0].output.contains("not valid JSON"));
    }

    #[tokio::test]
    async fn transport_failure_fails_the_turn() {
        let provider = ScriptedProvider::new(vec![ScriptedProvider::fail(ProviderError::Network("down".into()))]);
        let runner = Runner::builder(provider, Credentials::new("t")).build();

        let err = runner.send_message("go").await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Network(_))));
    }

    #[tokio::test]
    async fn empty_choice_list_clears_choices() {
        let provider = ScriptedProvider::new(vec![ScriptedProvider::empty()]);
        let runner = Runner::builder(provider, Credentials::new("t")).build();

        let result = runner.send_message("go").await.unwrap();
        assert!(result.choices.is_empty());
        assert_eq!(runner.messages().len(), 1);
    }

    #[tokio::test]
    async fn completion_limit_stops_the_loop() {
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::tool_calls(&[("c1", "attachNotes", r#"{"notes":"a"}"#)]),
            ScriptedProvider::tool_calls(&[("c2", "attachNotes", r#"{"notes":"b"}"#)]),
        ]);
        let settings = RunnerSettings {
            max_chat_completions: 2,
            ..RunnerSettings::default()
        };
        let runner = Runner::builder(provider, Credentials::new("t"))
            .settings(settings)
            .build();

        let result = runner.send_message("go").await.unwrap();
        assert_eq!(result.completions, 2);
        assert_eq!(result.tool_calls.len(), 2);
        assert_eq!(runner.notes().log().snapshot(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn sequential_tool_calls_when_parallel_disabled() {
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::tool_calls(&[
                ("c1", "attachNotes", r#"{"notes":"first"}"#),
                ("c2", "attachNotes", r#"{"notes":"second"}"#),
            ]),
            ScriptedProvider::text("ok"),
        ]);
        let settings = RunnerSettings {
            parallel_tool_calls: false,
            ..RunnerSettings::default()
        };
        let runner = Runner::builder(provider, Credentials::new("t"))
            .settings(settings)
            .build();

        runner.send_message("go").await.unwrap();
        assert_eq!(runner.notes().log().snapshot(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn usage_is_summed_across_completions() {
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::with_usage(
                ScriptedProvider::tool_calls(&[("c1", "attachNotes", r#"{"notes":"a"}"#)]),
                Usage { prompt_tokens: 10, completion_tokens: 2, total_tokens: 12 },
            ),
            ScriptedProvider::with_usage(
                ScriptedProvider::text("ok"),
                Usage { prompt_tokens: 20, completion_tokens: 3, total_tokens: 23 },
            ),
        ]);
        let runner = Runner::builder(provider, Credentials::new("t")).build();

        let result = runner.send_message("go").await.unwrap();
        assert_eq!(result.usage.map(|u| u.total_tokens), Some(35));
    }
}
