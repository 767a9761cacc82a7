//! Client for the question tool server.
//!
//! Every call opens its own streamable HTTP session, invokes one tool and
//! closes the session again. Sessions are short and the server is stateless,
//! so there is nothing to keep alive between calls.

use rmcp::{
    model::{CallToolRequestParam, CallToolResult, JsonObject, Tool},
    service::{RoleClient, RunningService, ServiceExt},
    transport::StreamableHttpClientTransport,
};
use serde_json::{Value, json};
use tracing::debug;

use crate::tools::{TOOL_RANDOM_QUESTION, TOOL_SEARCH_QUESTION};

/// Errors raised while talking to the tool server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to tool server at {url}: {message}")]
    Connect { url: String, message: String },

    #[error("tool call '{tool}' failed: {message}")]
    Call { tool: String, message: String },

    #[error("tool '{0}' returned no text content")]
    NoTextContent(String),

    #[error("tool '{tool}' returned invalid JSON: {source}")]
    InvalidPayload {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Handle on a tool server endpoint, e.g. `http://localhost:8000/mcp`.
#[derive(Debug, Clone)]
pub struct QuestionClient {
    url: String,
}

impl QuestionClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Lists the tools the server advertises.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connect`] if no session can be opened, or
    /// [`ClientError::Call`] if the listing is rejected.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, ClientError> {
        let session = self.connect().await?;
        let tools = session
            .list_all_tools()
            .await
            .map_err(|err| ClientError::Call {
                tool: "tools/list".to_string(),
                message: err.to_string(),
            });
        close(session).await;
        tools
    }

    /// Fetches a random question and its answer.
    ///
    /// # Errors
    ///
    /// See [`QuestionClient::call`].
    pub async fn random_question(&self) -> Result<Value, ClientError> {
        self.call(TOOL_RANDOM_QUESTION, None).await
    }

    /// Finds the stored question closest to `query`.
    ///
    /// # Errors
    ///
    /// See [`QuestionClient::call`].
    pub async fn search_question(&self, query: &str) -> Result<Value, ClientError> {
        let mut args = JsonObject::new();
        args.insert("text".to_string(), json!(query));
        self.call(TOOL_SEARCH_QUESTION, Some(args)).await
    }

    /// Invokes `tool` and returns its JSON payload.
    ///
    /// A failed operation still yields `Ok` with the server's
    /// `{"error": ...}` object; only protocol or transport failures are
    /// errors here.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Connect`] if no session can be opened
    /// - [`ClientError::Call`] if the server rejects the call (unknown tool,
    ///   bad arguments) or the transport fails mid-call
    /// - [`ClientError::NoTextContent`] / [`ClientError::InvalidPayload`] if
    ///   the result carries no usable JSON
    pub async fn call(
        &self,
        tool: &str,
        arguments: Option<JsonObject>,
    ) -> Result<Value, ClientError> {
        debug!(tool, url = %self.url, "Calling tool");
        let session = self.connect().await?;
        let result = session
            .call_tool(CallToolRequestParam {
                name: tool.to_string().into(),
                arguments,
            })
            .await
            .map_err(|err| ClientError::Call {
                tool: tool.to_string(),
                message: err.to_string(),
            });
        close(session).await;

        payload_of(tool, &result?)
    }

    async fn connect(&self) -> Result<RunningService<RoleClient, ()>, ClientError> {
        ().serve(StreamableHttpClientTransport::from_uri(self.url.clone()))
            .await
            .map_err(|err| ClientError::Connect {
                url: self.url.clone(),
                message: err.to_string(),
            })
    }
}

async fn close(session: RunningService<RoleClient, ()>) {
    if let Err(err) = session.cancel().await {
        debug!(error = %err, "Failed to close tool session");
    }
}

/// Extracts the JSON payload of a tool result.
///
/// Structured content wins; otherwise the first text content is parsed.
fn payload_of(tool: &str, result: &CallToolResult) -> Result<Value, ClientError> {
    if let Some(structured) = &result.structured_content {
        return Ok(structured.clone());
    }

    let text =
        first_text_content(result).ok_or_else(|| ClientError::NoTextContent(tool.to_string()))?;
    serde_json::from_str(text).map_err(|source| ClientError::InvalidPayload {
        tool: tool.to_string(),
        source,
    })
}

fn first_text_content(result: &CallToolResult) -> Option<&str> {
    result
        .content
        .iter()
        .find_map(|content| content.as_text())
        .map(|text| text.text.as_str())
}
