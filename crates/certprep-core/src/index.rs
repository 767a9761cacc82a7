//! In-memory embedding index over the corpus questions.
//!
//! The index is built once after the corpus loads and never mutated. Lookups
//! are a linear cosine-similarity scan; with a few hundred exam questions this
//! is cheaper than maintaining any approximate structure.
//!
//! Entries keep corpus order, and [`EmbeddingIndex::nearest`] keeps the first
//! of several equally scored entries, so results are reproducible for a given
//! corpus file.

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::{
    corpus::Corpus,
    embedder::{EmbedFuture, Embedder},
    error::QaError,
    record::QuestionId,
};

#[derive(Debug, Clone)]
struct IndexEntry {
    position: usize,
    id: QuestionId,
    embedding: Vec<f32>,
}

/// Closest indexed entry to a query vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position of the matching record in the corpus.
    pub position: usize,
    /// Cosine similarity between the query and the record's question.
    pub score: f32,
}

/// Outcome counters for an index build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub attempted: usize,
    pub indexed: usize,
    /// Records whose embedding call failed.
    pub failed: usize,
    /// Records whose vector was unusable (zero norm or wrong length).
    pub rejected: usize,
    pub dimensions: usize,
}

/// Corpus embeddings aligned with their record ids.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

impl EmbeddingIndex {
    /// Embeds every corpus question and collects the usable vectors.
    ///
    /// See [`Self::build_with_progress`].
    pub async fn build<E>(corpus: &Corpus, embedder: &E, concurrency: usize) -> (Self, IndexReport)
    where
        E: Embedder + ?Sized,
    {
        Self::build_with_progress(corpus, embedder, concurrency, || {}).await
    }

    /// Embeds every corpus question, calling `on_progress` after each record.
    ///
    /// Up to `concurrency` embedding calls run at once (at least one); results
    /// are consumed in corpus order regardless. The first usable vector fixes
    /// the index dimension.
    ///
    /// A record is left out of the index when its embedding call fails, when
    /// its vector has zero norm, or when its vector length differs from the
    /// index dimension. Leaving records out never fails the build; an index
    /// with no entries is a valid result that reports
    /// [`QaError::EmptyIndex`] on lookup.
    pub async fn build_with_progress<E, F>(
        corpus: &Corpus,
        embedder: &E,
        concurrency: usize,
        mut on_progress: F,
    ) -> (Self, IndexReport)
    where
        E: Embedder + ?Sized,
        F: FnMut(),
    {
        info!(
            questions = corpus.len(),
            concurrency = concurrency.max(1),
            "Generating question embeddings"
        );

        let mut index = Self::default();
        let mut report = IndexReport {
            attempted: corpus.len(),
            ..IndexReport::default()
        };

        let pending: Vec<EmbedFuture<'_>> = corpus
            .iter()
            .map(|record| embedder.embed(&record.question))
            .collect();
        let mut results = futures::stream::iter(pending)
            .buffered(concurrency.max(1))
            .zip(futures::stream::iter(corpus.iter().enumerate()));

        while let Some((result, (position, record))) = results.next().await {
            on_progress();

            let embedding = match result {
                Ok(embedding) => embedding,
                Err(err) => {
                    warn!(id = %record.id, error = %err, "Skipping question without embedding");
                    report.failed += 1;
                    continue;
                }
            };

            if let Err(reason) = index.accepts(&embedding) {
                warn!(id = %record.id, reason, "Skipping question with unusable embedding");
                report.rejected += 1;
                continue;
            }

            debug!(id = %record.id, dimensions = embedding.len(), "Indexed question");
            if index.entries.is_empty() {
                index.dimensions = embedding.len();
            }
            index.entries.push(IndexEntry {
                position,
                id: record.id.clone(),
                embedding,
            });
        }

        report.indexed = index.len();
        report.dimensions = index.dimensions;

        if index.is_empty() {
            warn!(
                attempted = report.attempted,
                "Failed to generate any embeddings; semantic search is unavailable"
            );
        } else {
            info!(
                indexed = report.indexed,
                failed = report.failed,
                rejected = report.rejected,
                dimensions = report.dimensions,
                "Built embedding index"
            );
        }

        (index, report)
    }

    fn accepts(&self, embedding: &[f32]) -> Result<(), &'static str> {
        if embedding.is_empty() {
            return Err("empty vector");
        }
        if !self.entries.is_empty() && embedding.len() != self.dimensions {
            return Err("dimension mismatch");
        }
        if norm(embedding) == 0.0 {
            return Err("zero norm");
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector length shared by all entries, `0` for an empty index.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Ids of indexed records, in corpus order.
    pub fn ids(&self) -> impl Iterator<Item = &QuestionId> {
        self.entries.iter().map(|entry| &entry.id)
    }

    /// Finds the entry with the highest cosine similarity to `query`.
    ///
    /// Ties keep the entry that comes first in corpus order. No minimum score
    /// applies: the closest entry is returned however distant it is.
    ///
    /// # Errors
    ///
    /// - [`QaError::EmptyIndex`] if nothing was indexed
    /// - [`QaError::DegenerateQuery`] if `query` has zero norm or a length
    ///   different from the index dimension
    /// - [`QaError::NoMatch`] if no entry yields a finite score
    pub fn nearest(&self, query: &[f32]) -> Result<Neighbor, QaError> {
        if self.entries.is_empty() {
            return Err(QaError::EmptyIndex);
        }
        if query.len() != self.dimensions {
            return Err(QaError::DegenerateQuery(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                query.len()
            )));
        }
        if norm(query) == 0.0 {
            return Err(QaError::DegenerateQuery("zero-norm vector".to_string()));
        }

        let mut best: Option<Neighbor> = None;
        for entry in &self.entries {
            let Some(score) = cosine_similarity(query, &entry.embedding) else {
                continue;
            };
            if !score.is_finite() {
                continue;
            }
            if best.is_none_or(|current| score > current.score) {
                best = Some(Neighbor {
                    position: entry.position,
                    score,
                });
            }
        }

        best.ok_or(QaError::NoMatch)
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Computes cosine similarity between two vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `None` when the similarity is
/// undefined: vectors of different lengths, empty vectors, or a vector with
/// zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (dot_product, norm_a, norm_b) = a
        .iter()
        .zip(b.iter())
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, na, nb), (&x, &y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        None
    } else {
        Some(dot_product / denominator)
    }
}
