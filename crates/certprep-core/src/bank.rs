//! The question bank: corpus, embedding index and the embedder used to
//! answer lookups, owned together and shared read-only by the tool server.

use std::sync::Arc;

use tracing::debug;

use crate::{
    corpus::Corpus,
    embedder::Embedder,
    error::QaError,
    index::{EmbeddingIndex, IndexReport},
    record::{QuestionRecord, ScoredQuestion},
};

/// Read-only question store serving random picks and semantic lookups.
///
/// Built once at startup; every method takes `&self`, so a single
/// `Arc<QuestionBank>` can serve concurrent requests without locking.
pub struct QuestionBank {
    corpus: Corpus,
    index: EmbeddingIndex,
    embedder: Arc<dyn Embedder>,
}

impl QuestionBank {
    /// Index positions refer into `corpus`, so the index must have been built
    /// from this very corpus.
    pub(crate) fn new(corpus: Corpus, index: EmbeddingIndex, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            corpus,
            index,
            embedder,
        }
    }

    /// Embeds the corpus and assembles the bank.
    ///
    /// Never fails: records that cannot be embedded are only left out of the
    /// index. Check the returned [`IndexReport`] to see how many made it.
    pub async fn build(
        corpus: Corpus,
        embedder: Arc<dyn Embedder>,
        concurrency: usize,
    ) -> (Self, IndexReport) {
        Self::build_with_progress(corpus, embedder, concurrency, || {}).await
    }

    /// Like [`Self::build`], calling `on_progress` once per corpus record.
    pub async fn build_with_progress<F>(
        corpus: Corpus,
        embedder: Arc<dyn Embedder>,
        concurrency: usize,
        on_progress: F,
    ) -> (Self, IndexReport)
    where
        F: FnMut(),
    {
        let (index, report) = EmbeddingIndex::build_with_progress(
            &corpus,
            embedder.as_ref(),
            concurrency,
            on_progress,
        )
        .await;
        (Self::new(corpus, index, embedder), report)
    }

    #[must_use]
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    #[must_use]
    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    /// Picks a question uniformly at random from the whole corpus.
    ///
    /// Records missing from the embedding index are still eligible.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::EmptyCorpus`] if no questions are loaded.
    pub fn random_question(&self) -> Result<&QuestionRecord, QaError> {
        self.corpus
            .pick_random(&mut rand::thread_rng())
            .ok_or(QaError::EmptyCorpus)
    }

    /// Returns the corpus record whose question is semantically closest to
    /// `text`, together with its similarity score.
    ///
    /// # Errors
    ///
    /// - [`QaError::EmptyCorpus`] / [`QaError::EmptyIndex`] when there is
    ///   nothing to search; the query is not embedded in that case
    /// - [`QaError::Embedding`] when the query embedding fails
    /// - [`QaError::DegenerateQuery`] when the query vector cannot be compared
    pub async fn search(&self, text: &str) -> Result<ScoredQuestion, QaError> {
        if self.corpus.is_empty() {
            return Err(QaError::EmptyCorpus);
        }
        if self.index.is_empty() {
            return Err(QaError::EmptyIndex);
        }

        let query = self.embedder.embed(text).await?;
        let neighbor = self.index.nearest(&query)?;
        let record = self.corpus.at(neighbor.position).ok_or(QaError::NoMatch)?;

        debug!(id = %record.id, score = neighbor.score, "Matched query to question");
        Ok(ScoredQuestion {
            record: record.clone(),
            similarity_score: neighbor.score,
        })
    }
}
