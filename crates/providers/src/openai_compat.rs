//! OpenAI-compatible chat completions transport.
//!
//! Works with OpenAI and any endpoint exposing `/chat/completions` with
//! the same request and SSE streaming format.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use handoff_core::provider::{ChunkReceiver, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition, Usage};
use handoff_core::{Credentials, Message, MessageToolCall, ProviderError, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// An OpenAI-compatible model transport.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    credentials: Credentials,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(credentials: Credentials) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", credentials)
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                // Assistant messages that only call tools carry null content.
                content: if m.requests_tools() && m.content.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                },
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });
        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }
        body
    }

    async fn post(&self, body: &serde_json::Value, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(self.credentials.token())
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        match response.status().as_u16() {
            200 => Ok(response),
            429 => {
                let retry_after_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5);
                Err(ProviderError::RateLimited { retry_after_secs })
            }
            401 | 403 => Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            )),
            status => {
                let error_body = response.text().await.unwrap_or_default();
                warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
                Err(ProviderError::ApiError {
                    status_code: status,
                    message: error_body,
                })
            }
        }
    }
}

#[async_trait]
impl handoff_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending completion request");
        let response = self.post(&Self::request_body(&request, false), false).await?;

        let api_response: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        let message = api_response.choices.into_iter().next().map(|choice| {
            let mut message = Message::assistant(choice.message.content.unwrap_or_default());
            message.tool_calls = choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| MessageToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments: tc.function.arguments,
                })
                .collect();
            message
        });

        Ok(ProviderResponse {
            message,
            usage: api_response.usage.map(Usage::from),
            model: api_response.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");
        let response = self.post(&Self::request_body(&request, true), true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut parser = SseParser::default();

            while let Some(next) = byte_stream.next().await {
                let bytes = match next {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::StreamInterrupted(e.to_string()))).await;
                        return;
                    }
                };

                for chunk in parser.feed(&bytes) {
                    if tx.send(Ok(chunk)).await.is_err() {
                        return; // receiver dropped
                    }
                }
                if parser.is_finished() {
                    return;
                }
            }

            trace!(provider = %provider_name, "Stream ended without [DONE]");
            let _ = tx.send(Ok(parser.finish())).await;
        });

        Ok(rx)
    }
}

/// Incremental parser for the `data: {...}` lines of an SSE response.
///
/// Content and finish deltas are forwarded as they arrive. Tool call
/// fragments are assembled and delivered, ordered by index, on the final
/// `done` chunk together with usage.
#[derive(Default)]
struct SseParser {
    buffer: Vec<u8>,
    tool_calls: BTreeMap<u32, ToolCallAccumulator>,
    usage: Option<Usage>,
    finished: bool,
}

impl SseParser {
    fn feed(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buffer.extend_from_slice(bytes);
        let mut chunks = Vec::new();
        while !self.finished
            && let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n')
        {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(chunk) = self.parse_line(line.trim_end_matches(['\n', '\r'])) {
                chunks.push(chunk);
            }
        }
        chunks
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn parse_line(&mut self, line: &str) -> Option<StreamChunk> {
        // Blank lines separate events; lines starting with ':' are comments.
        let data = line.strip_prefix("data:")?.trim();
        if data == "[DONE]" {
            return Some(self.finish());
        }

        let response: StreamResponse = match serde_json::from_str(data) {
            Ok(r) => r,
            Err(e) => {
                trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                return None;
            }
        };

        if let Some(usage) = response.usage {
            self.usage = Some(usage.into());
        }

        let choice = response.choices.into_iter().next()?;
        for delta in choice.delta.tool_calls.unwrap_or_default() {
            let acc = self.tool_calls.entry(delta.index).or_default();
            if let Some(id) = delta.id {
                acc.id = id;
            }
            if let Some(function) = delta.function {
                if let Some(name) = function.name {
                    acc.name = name;
                }
                if let Some(arguments) = function.arguments {
                    acc.arguments.push_str(&arguments);
                }
            }
        }

        let chunk = StreamChunk {
            content: choice.delta.content.filter(|c| !c.is_empty()),
            finish_reason: choice.finish_reason,
            ..StreamChunk::default()
        };
        chunk.carries_choice().then_some(chunk)
    }

    /// The final chunk: assembled tool calls and usage.
    fn finish(&mut self) -> StreamChunk {
        self.finished = true;
        StreamChunk {
            tool_calls: std::mem::take(&mut self.tool_calls)
                .into_values()
                .map(ToolCallAccumulator::into_tool_call)
                .collect(),
            done: true,
            usage: self.usage.take(),
            ..StreamChunk::default()
        }
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

// --- Streaming SSE types ---

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta; these arrive incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_tool_call(self) -> MessageToolCall {
        MessageToolCall {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::Provider;

    fn sse(events: &[&str]) -> Vec<u8> {
        events
            .iter()
            .map(|e| format!("data: {e}\n\n"))
            .collect::<String>()
            .into_bytes()
    }

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai(Credentials::new("sk-test")).unwrap();
        assert_eq!(provider.name(), "openai");
        assert!(provider.base_url.ends_with("/v1"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("local", "http://localhost:8080/v1/", Credentials::new("x")).unwrap();
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn tool_only_assistant_message_has_null_content() {
        let mut msg = Message::assistant("");
        msg.tool_calls = vec![MessageToolCall {
            id: "call_1".into(),
            name: "readFile".into(),
            arguments: r#"{"filePath":"a.txt"}"#.into(),
        }];
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert!(api_msgs[0].content.is_none());
        let json = serde_json::to_value(&api_msgs[0]).unwrap();
        assert!(json["content"].is_null());
        assert_eq!(json["tool_calls"][0]["function"]["name"], "readFile");
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", "result data");
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn request_body_includes_tools_and_stream_options() {
        let request = ProviderRequest {
            model: "gpt-4o".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.2,
            max_tokens: Some(100),
            tools: vec![ToolDefinition {
                name: "readFile".into(),
                description: "Read a file".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            stream: true,
        };
        let body = OpenAiCompatProvider::request_body(&request, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "readFile");
    }

    // --- SSE parsing ---

    #[test]
    fn content_deltas_stream_through() {
        let mut parser = SseParser::default();
        let chunks = parser.feed(&sse(&[
            r#"{"choices":[{"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
            "[DONE]",
        ]));

        let text: String = chunks.iter().filter_map(|c| c.content.as_deref()).collect();
        assert_eq!(text, "Hello");
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[2].finish_reason.as_deref(), Some("stop"));
        let last = chunks.last().unwrap();
        assert!(last.done);
        assert_eq!(last.usage.unwrap().total_tokens, 15);
        assert!(parser.is_finished());
    }

    #[test]
    fn tool_call_fragments_assemble_in_index_order() {
        let mut parser = SseParser::default();
        let chunks = parser.feed(&sse(&[
            r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"readFile","arguments":""}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"writeFile","arguments":"{\"filePath\""}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":":\"a.txt\"}"}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            "[DONE]",
        ]));

        let done = chunks.last().unwrap();
        assert!(done.done);
        assert_eq!(done.tool_calls.len(), 2);
        assert_eq!(done.tool_calls[0].id, "call_a");
        assert_eq!(done.tool_calls[0].arguments, r#"{"filePath":"a.txt"}"#);
        assert_eq!(done.tool_calls[1].name, "readFile");
    }

    #[test]
    fn empty_choice_list_yields_no_choice() {
        let mut parser = SseParser::default();
        let chunks = parser.feed(&sse(&[r#"{"choices":[]}"#, "[DONE]"]));
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].done);
        assert!(!chunks.iter().any(StreamChunk::carries_choice));
    }

    #[test]
    fn lines_split_across_reads() {
        let mut parser = SseParser::default();
        let bytes = sse(&[r#"{"choices":[{"delta":{"content":"héllo"},"finish_reason":null}]}"#]);
        // Split inside the two-byte 'é'.
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(parser.feed(&bytes[..split]).is_empty());
        let chunks = parser.feed(&bytes[split..]);
        assert_eq!(chunks[0].content.as_deref(), Some("héllo"));
    }

    #[test]
    fn comments_and_garbage_ignored() {
        let mut parser = SseParser::default();
        let chunks = parser.feed(b": keep-alive\n\ndata: {not json}\n\nevent: ping\n\n");
        assert!(chunks.is_empty());
        assert!(!parser.is_finished());
        assert!(parser.finish().done);
    }

    #[test]
    fn parse_complete_response_without_choices() {
        let data = r#"{"model":"gpt-4o","choices":[]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices.is_empty());
    }
}
