//! Serving and consuming the question bank over MCP.
//!
//! - [`tools`] defines `get_random_question` and `get_question_and_answer`
//!   and runs them against a [`certprep_core::QuestionBank`]
//! - [`transports::mcp`] exposes those tools through an MCP server
//! - [`client`] calls them on a running server

pub mod client;
pub mod tools;
pub mod transports;

pub use client::{ClientError, QuestionClient};
pub use tools::{QuestionTool, TOOL_RANDOM_QUESTION, TOOL_SEARCH_QUESTION, ToolError};
pub use transports::mcp::{McpService, SERVER_NAME};
