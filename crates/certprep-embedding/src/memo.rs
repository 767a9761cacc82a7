//! Exact-text memoization for any [`Embedder`].

use std::{collections::HashMap, sync::Mutex};

use certprep_core::{EmbedFuture, Embedder};
use tracing::debug;

/// Caches successful embeddings keyed on the exact input text.
///
/// Failures are not cached, so a transient outage does not stick. The cache
/// is unbounded; it is meant for the small, repetitive query sets a study
/// session produces.
pub struct MemoizedEmbedder<E> {
    inner: E,
    cache: Mutex<HashMap<String, Vec<f32>>>,
}

impl<E: Embedder> MemoizedEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached texts.
    pub fn len(&self) -> usize {
        self.cache.lock().map_or(0, |cache| cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, text: &str) -> Option<Vec<f32>> {
        self.cache.lock().ok()?.get(text).cloned()
    }

    fn store(&self, text: &str, embedding: &[f32]) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(text.to_string(), embedding.to_vec());
        }
    }
}

impl<E: Embedder> Embedder for MemoizedEmbedder<E> {
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
        Box::pin(async move {
            if let Some(hit) = self.lookup(text) {
                debug!(text_len = text.len(), "Embedding cache hit");
                return Ok(hit);
            }
            let embedding = self.inner.embed(text).await?;
            self.store(text, &embedding);
            Ok(embedding)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use certprep_core::EmbedError;

    use super::*;

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl Embedder for CountingEmbedder {
        fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if text == "down" {
                Err(EmbedError::Transport("connection refused".to_string()))
            } else {
                Ok(vec![text.len() as f32, 1.0])
            };
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn test_repeated_text_hits_cache() {
        let memo = MemoizedEmbedder::new(CountingEmbedder::default());

        let first = memo.embed("pod").await;
        let second = memo.embed("pod").await;

        assert_eq!(first, second);
        assert_eq!(memo.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_text_is_not_shared() {
        let memo = MemoizedEmbedder::new(CountingEmbedder::default());

        let _ = memo.embed("pod").await;
        let _ = memo.embed("Pod").await;

        assert_eq!(memo.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let memo = MemoizedEmbedder::new(CountingEmbedder::default());

        assert!(memo.embed("down").await.is_err());
        assert!(memo.embed("down").await.is_err());

        assert_eq!(memo.inner.calls.load(Ordering::SeqCst), 2);
        assert!(memo.is_empty());
    }
}
