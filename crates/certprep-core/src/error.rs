use crate::embedder::EmbedError;

/// Failures reported back to a tool caller.
///
/// None of these terminate the process; the tool server turns each one into an
/// `{"error": ...}` payload, except [`QaError::UnknownOperation`] which is a
/// protocol-level rejection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QaError {
    #[error("No questions loaded. Check data file.")]
    EmptyCorpus,

    #[error("No question embeddings available. Semantic search is disabled.")]
    EmptyIndex,

    #[error("Failed to generate embedding for the query: {0}")]
    Embedding(#[from] EmbedError),

    #[error("Query embedding cannot be compared: {0}")]
    DegenerateQuery(String),

    #[error("No semantically similar question found")]
    NoMatch,

    #[error("Unknown tool: {0}")]
    UnknownOperation(String),
}
