//! Core library for the certprep question server.
//!
//! This crate holds the question corpus, the embedding index built over it
//! and the [`QuestionBank`] that answers the two tool operations: a random
//! practice question, and the question semantically closest to free text.
//!
//! # Architecture
//!
//! - [`Corpus`]: ordered, immutable list of [`QuestionRecord`]s read from a
//!   JSON file at startup
//! - [`Embedder`]: seam for the external embedding endpoint
//! - [`EmbeddingIndex`]: corpus vectors aligned with record ids, searched by
//!   linear cosine-similarity scan
//! - [`QuestionBank`]: owns the three above and serves lookups through `&self`
//! - [`Config`]: file and environment configuration shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use certprep_core::{Corpus, Embedder, QuestionBank};
//!
//! # async fn example(embedder: Arc<dyn Embedder>) -> anyhow::Result<()> {
//! let corpus = Corpus::load("data/cka_qa.json")?;
//! let (bank, report) = QuestionBank::build(corpus, embedder, 1).await;
//! println!("indexed {} of {} questions", report.indexed, report.attempted);
//!
//! let best = bank.search("what does kube-proxy do").await?;
//! println!("{} ({:.3})", best.record.question, best.similarity_score);
//! # Ok(())
//! # }
//! ```

pub mod bank;
pub mod config;
pub mod corpus;
pub mod embedder;
pub mod error;
pub mod index;
pub mod record;

pub use bank::QuestionBank;
pub use config::{ChatConfig, Config, ConfigError, CorpusConfig, EmbeddingConfig, ServerConfig};
pub use corpus::{Corpus, CorpusError};
pub use embedder::{EmbedError, EmbedFuture, Embedder};
pub use error::QaError;
pub use index::{EmbeddingIndex, IndexReport, Neighbor, cosine_similarity};
pub use record::{QuestionId, QuestionRecord, ScoredQuestion};
