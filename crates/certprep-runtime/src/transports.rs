//! Transport layer implementations for serving the question bank.
//!
//! # Available Transports
//!
//! - `mcp` - Model Context Protocol server, reachable over streamable HTTP
//!   (mounted in an axum router) or over stdio
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use certprep_runtime::transports::mcp::McpService;
//! # use certprep_core::QuestionBank;
//!
//! # fn example(bank: Arc<QuestionBank>) {
//! let service = McpService::new(bank).streamable_http_service();
//! let router: axum::Router = axum::Router::new().nest_service("/mcp", service);
//! # }
//! ```

/// Model Context Protocol (MCP) transport implementation.
///
/// Provides `McpService`, which exposes `get_random_question` and
/// `get_question_and_answer` as MCP tools.
pub mod mcp;
