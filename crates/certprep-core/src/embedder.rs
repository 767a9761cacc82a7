//! Text embedding seam.
//!
//! This module provides the [`Embedder`] trait used both to precompute corpus
//! embeddings at startup and to embed incoming search queries. The concrete
//! network-backed implementation lives in `certprep-embedding`; tests plug in
//! deterministic fakes.

use std::time::Duration;

use futures::future::BoxFuture;

/// Future type for embedding generation.
pub type EmbedFuture<'a> = BoxFuture<'a, Result<Vec<f32>, EmbedError>>;

/// Failure of a single embedding call.
///
/// Every variant is recoverable: the caller drops the record from the index
/// or fails the one search that needed the vector.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbedError {
    /// Input text was empty or whitespace only.
    #[error("cannot embed empty text")]
    EmptyInput,

    /// The endpoint could not be reached or rejected the request.
    #[error("embedding request failed: {0}")]
    Transport(String),

    /// The endpoint did not answer within the configured limit.
    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered without a vector.
    #[error("embedding endpoint returned no vector")]
    MissingVector,
}

/// Embedding generator for corpus indexing and query lookup.
///
/// Implementors turn text into a fixed-length vector. All vectors produced by
/// one implementor during a process run are expected to share a length.
///
/// # Example
///
/// ```
/// use certprep_core::{EmbedError, EmbedFuture, Embedder};
///
/// struct LengthEmbedder;
///
/// impl Embedder for LengthEmbedder {
///     fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
///         Box::pin(async move {
///             if text.trim().is_empty() {
///                 return Err(EmbedError::EmptyInput);
///             }
///             Ok(vec![text.len() as f32, 1.0])
///         })
///     }
/// }
/// ```
pub trait Embedder: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a>;
}

impl<T: Embedder + ?Sized> Embedder for std::sync::Arc<T> {
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
        (**self).embed(text)
    }
}
