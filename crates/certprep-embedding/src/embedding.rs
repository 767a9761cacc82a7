//! Text embedding generation against an OpenAI-compatible endpoint.
//!
//! [`EmbeddingGenerator`] sends one `{model, input}` request per text and
//! returns the first vector of the response. Each request is bounded by a
//! timeout; exceeding it yields [`EmbedError::Timeout`] rather than a generic
//! transport failure so callers can tell a slow endpoint from a dead one.

use std::time::Duration;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::embeddings::{CreateEmbeddingRequest, EmbeddingInput},
};
use certprep_core::{EmbedError, EmbedFuture, Embedder, EmbeddingConfig, config::resolve_api_key};
use tracing::debug;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Generator for text embeddings backed by an OpenAI-compatible API.
///
/// The underlying client is safe to share, so one generator can serve the
/// startup indexing pass and concurrent query lookups at the same time.
///
/// # Notes
///
/// Construction does not contact the endpoint. An unreachable server or a
/// bad API key shows up on the first [`EmbeddingGenerator::embed`] call.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl EmbeddingGenerator {
    /// Creates a generator for `model` served at `base_url`.
    ///
    /// `base_url` is the API root, e.g. `http://localhost:8080/v1`.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(api_key);

        Self {
            client: Client::with_config(config),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a generator from the `[embedding]` config section.
    ///
    /// The API key is read from the variable named by `api_key_env`.
    #[must_use]
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(
            config.base_url.clone(),
            resolve_api_key(&config.api_key_env),
            config.model.clone(),
        )
        .with_timeout(config.timeout())
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generates an embedding vector for `text`.
    ///
    /// # Errors
    ///
    /// - [`EmbedError::EmptyInput`] for empty or whitespace-only text; no
    ///   request is sent
    /// - [`EmbedError::Timeout`] if the endpoint does not answer in time
    /// - [`EmbedError::Transport`] if the request fails or is rejected
    /// - [`EmbedError::MissingVector`] if the response carries no vector
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        debug!(model = %self.model, text_len = text.len(), "Generating embedding");

        let request = CreateEmbeddingRequest {
            model: self.model.clone(),
            input: EmbeddingInput::String(text.to_string()),
            encoding_format: None,
            dimensions: None,
            user: None,
        };

        let response = tokio::time::timeout(self.timeout, self.client.embeddings().create(request))
            .await
            .map_err(|_| EmbedError::Timeout(self.timeout))?
            .map_err(|err| EmbedError::Transport(err.to_string()))?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .ok_or(EmbedError::MissingVector)?
            .embedding;

        if embedding.is_empty() {
            return Err(EmbedError::MissingVector);
        }

        debug!(dimensions = embedding.len(), "Generated embedding");
        Ok(embedding)
    }
}

impl Embedder for EmbeddingGenerator {
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
        Box::pin(EmbeddingGenerator::embed(self, text))
    }
}
