//! Shared test utilities for agent unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use handoff_core::{
    ChunkReceiver, MessageToolCall, Provider, ProviderError, ProviderRequest, ProviderResponse, StreamChunk, Tool,
    ToolError, ToolResult, Usage,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// One scripted completion.
pub enum Script {
    Chunks(Vec<StreamChunk>),
    Fail(ProviderError),
}

/// A provider that replays scripted completions in order and records the
/// requests it received.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A completion that streams `content` in two chunks and stops.
    pub fn text(content: &str) -> Script {
        let split = content.char_indices().nth(content.chars().count() / 2).map_or(content.len(), |(i, _)| i);
        let (head, tail) = content.split_at(split);
        let mut chunks = vec![StreamChunk::text(head)];
        if !tail.is_empty() {
            chunks.push(StreamChunk::text(tail));
        }
        chunks.push(StreamChunk {
            finish_reason: Some("stop".into()),
            done: true,
            ..StreamChunk::default()
        });
        Script::Chunks(chunks)
    }

    /// A completion that requests the given `(id, name, arguments)` calls.
    pub fn tool_calls(calls: &[(&str, &str, &str)]) -> Script {
        Script::Chunks(vec![StreamChunk {
            tool_calls: calls
                .iter()
                .map(|(id, name, arguments)| MessageToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                })
                .collect(),
            finish_reason: Some("tool_calls".into()),
            done: true,
            ..StreamChunk::default()
        }])
    }

    /// A completion with an empty choice list.
    pub fn empty() -> Script {
        Script::Chunks(vec![StreamChunk {
            done: true,
            ..StreamChunk::default()
        }])
    }

    pub fn fail(error: ProviderError) -> Script {
        Script::Fail(error)
    }

    /// Attach usage to the last chunk of a script.
    pub fn with_usage(script: Script, usage: Usage) -> Script {
        match script {
            Script::Chunks(mut chunks) => {
                if let Some(last) = chunks.last_mut() {
                    last.usage = Some(usage);
                }
                Script::Chunks(chunks)
            }
            fail => fail,
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("scripted provider only streams".into()))
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().push(request);
        let script = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| ProviderError::StreamInterrupted("script exhausted".into()))?;
        match script {
            Script::Fail(error) => Err(error),
            Script::Chunks(chunks) => {
                let (tx, rx) = mpsc::channel(chunks.len().max(1));
                for chunk in chunks {
                    let _ = tx.try_send(Ok(chunk));
                }
                Ok(rx)
            }
        }
    }
}

/// A tool named `fail` that always fails recoverably.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "fail"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Err(ToolError::failed("fail", "boom"))
    }
}
