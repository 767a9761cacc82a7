//! Interactive study assistant.
//!
//! A chat model answers the user and may call the question tools; tool calls
//! are executed against the tool server and their results fed back for a
//! final answer.

pub mod completion;
pub mod session;
pub mod tool_calls;

pub use completion::CompletionClient;
pub use session::{ChatSession, run_loop};
