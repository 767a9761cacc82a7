//! Streaming client for an OpenAI-compatible `/chat/completions` endpoint.
//!
//! Requests are sent with `stream: true`; the response is read as server-sent
//! events, one JSON chunk per `data:` line, until `data: [DONE]` or the end of
//! the body.

use std::time::Duration;

use certprep_core::{ChatConfig, config::resolve_api_key};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::tool_calls::ToolCallAccumulator;

/// One message of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// A complete tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, exactly as the model produced it.
    pub arguments: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Fragment of a tool call as it arrives in the stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: usize,
    pub id: Option<String>,
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// Everything a streamed completion produced.
#[derive(Debug, Default, PartialEq)]
pub struct StreamedReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("chat endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("no data from chat endpoint for {0:?}")]
    Timeout(Duration),

    #[error("chat stream interrupted: {0}")]
    Stream(#[source] reqwest::Error),

    #[error("malformed chat stream chunk: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// Chat completion client for one model.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl CompletionClient {
    /// Creates a client for `model` served under `base_url`, e.g.
    /// `http://127.0.0.1:8000/v1`.
    pub fn new(base_url: &str, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(
            &config.base_url,
            resolve_api_key(&config.api_key_env),
            config.model.clone(),
        )
        .with_timeout(config.timeout())
    }

    /// Sets how long to wait for the response and for each stream chunk.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Streams a completion for `messages`, passing each text fragment to
    /// `on_text` as it arrives.
    ///
    /// With `tools`, the model may answer with tool calls instead of, or in
    /// addition to, text (`tool_choice: "auto"`).
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be sent, the endpoint answers with a
    /// non-success status, the stream stalls longer than the timeout or
    /// breaks off, a chunk is not valid JSON, or `on_text` fails.
    pub async fn stream<F>(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Value]>,
        mut on_text: F,
    ) -> Result<StreamedReply, ChatError>
    where
        F: FnMut(&str) -> std::io::Result<()>,
    {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
            tools,
            tool_choice: tools.map(|_| "auto"),
        };
        debug!(
            model = %self.model,
            messages = messages.len(),
            with_tools = tools.is_some(),
            "Requesting chat completion"
        );

        let send = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| ChatError::Timeout(self.timeout))?
            .map_err(ChatError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status { status, body });
        }

        let mut reply = StreamedReply::default();
        let mut calls = ToolCallAccumulator::default();
        let mut lines = SseLines::default();
        let mut body = response.bytes_stream();

        'stream: loop {
            let next = tokio::time::timeout(self.timeout, body.next())
                .await
                .map_err(|_| ChatError::Timeout(self.timeout))?;
            let Some(bytes) = next.transpose().map_err(ChatError::Stream)? else {
                break;
            };

            for data in lines.push(&bytes) {
                if data == "[DONE]" {
                    break 'stream;
                }
                let chunk: StreamChunk = serde_json::from_str(&data).map_err(ChatError::Decode)?;
                let Some(choice) = chunk.choices.into_iter().next() else {
                    continue;
                };
                if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
                    on_text(&text)?;
                    reply.content.push_str(&text);
                }
                for delta in choice.delta.tool_calls.unwrap_or_default() {
                    calls.push(&delta);
                }
            }
        }

        reply.tool_calls = calls.finish();
        debug!(
            content_len = reply.content.len(),
            tool_calls = reply.tool_calls.len(),
            "Chat completion finished"
        );
        Ok(reply)
    }
}

/// Splits a byte stream into the payloads of its `data:` lines.
#[derive(Debug, Default)]
struct SseLines {
    pending: Vec<u8>,
}

impl SseLines {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(data) = line.trim().strip_prefix("data:") {
                out.push(data.trim_start().to_string());
            }
        }
        out
    }
}
