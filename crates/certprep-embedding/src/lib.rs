//! Embedding provider for the certprep question server.
//!
//! This crate implements [`certprep_core::Embedder`] on top of an
//! OpenAI-compatible `/embeddings` endpoint, such as a local llama.cpp or
//! text-embeddings-inference server, or the hosted OpenAI API.
//!
//! # Example
//!
//! ```no_run
//! use certprep_core::Config;
//! use certprep_embedding::EmbeddingGenerator;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let generator = EmbeddingGenerator::from_config(&config.embedding);
//! let embedding = generator.embed("What is a pod?").await?;
//! # Ok(())
//! # }
//! ```

pub mod embedding;
pub mod memo;

pub use embedding::EmbeddingGenerator;
pub use memo::MemoizedEmbedder;
