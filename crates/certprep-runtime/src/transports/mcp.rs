//! Model Context Protocol (MCP) transport implementation.
//!
//! `McpService` implements `rmcp::ServerHandler` on top of a shared
//! [`QuestionBank`] and exposes the two [`QuestionTool`]s. Results are returned
//! as structured content. Operation failures are still successful protocol
//! responses: they carry an `{"error": message}` object with `is_error` set.
//! Only an unknown tool name or malformed arguments reject the request itself.

use std::sync::Arc;

use certprep_core::QuestionBank;
use rmcp::{
    ErrorData, RoleServer,
    handler::server::ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult,
        PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    transport::streamable_http_server::{
        StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
    },
};
use tracing::warn;

use crate::tools::{QuestionTool, ToolError};

/// Name advertised in the MCP `initialize` handshake.
pub const SERVER_NAME: &str = "LF Cert Prep Tools";

/// MCP server exposing the question bank.
///
/// Cheap to clone; every clone shares the same bank.
#[derive(Clone)]
pub struct McpService {
    bank: Arc<QuestionBank>,
    info: ServerInfo,
}

impl McpService {
    /// Creates a service advertising [`SERVER_NAME`] with the tools capability.
    #[must_use]
    pub fn new(bank: Arc<QuestionBank>) -> Self {
        Self::with_info(bank, default_server_info())
    }

    #[must_use]
    pub fn with_info(bank: Arc<QuestionBank>, info: ServerInfo) -> Self {
        Self { bank, info }
    }

    #[must_use]
    pub fn bank(&self) -> &Arc<QuestionBank> {
        &self.bank
    }

    #[must_use]
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Creates a streamable HTTP service in stateless mode.
    ///
    /// The returned service can be mounted in an axum router.
    #[must_use]
    pub fn streamable_http_service(&self) -> StreamableHttpService<Self, LocalSessionManager> {
        self.streamable_http_service_with_config(StreamableHttpServerConfig {
            // Clients open a short session per call and may skip the
            // initialized notification.
            stateful_mode: false,
            ..Default::default()
        })
    }

    #[must_use]
    pub fn streamable_http_service_with_config(
        &self,
        config: StreamableHttpServerConfig,
    ) -> StreamableHttpService<Self, LocalSessionManager> {
        let service = self.clone();
        StreamableHttpService::new(move || Ok(service.clone()), Arc::default(), config)
    }
}

impl ServerHandler for McpService {
    fn get_info(&self) -> ServerInfo {
        self.info.clone()
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        async move {
            let tools = QuestionTool::ALL.into_iter().map(tool_to_mcp).collect();
            Ok(ListToolsResult::with_all_items(tools))
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        let bank = Arc::clone(&self.bank);
        async move {
            let tool: QuestionTool = request
                .name
                .parse()
                .map_err(|err: certprep_core::QaError| {
                    ErrorData::resource_not_found(err.to_string(), None)
                })?;

            match tool.run(&bank, request.arguments).await {
                Ok(value) => Ok(CallToolResult::structured(value)),
                Err(ToolError::InvalidArguments(message)) => Err(ErrorData::invalid_params(
                    format!("invalid arguments: {message}"),
                    None,
                )),
                Err(err) => {
                    warn!(tool = %tool, error = %err, "Tool call failed");
                    Ok(CallToolResult::structured_error(err.payload()))
                }
            }
        }
    }
}

fn default_server_info() -> ServerInfo {
    ServerInfo {
        capabilities: ServerCapabilities::builder().enable_tools().build(),
        server_info: Implementation {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn tool_to_mcp(tool: QuestionTool) -> Tool {
    Tool::new(tool.name(), tool.description(), Arc::new(tool.input_schema()))
}
