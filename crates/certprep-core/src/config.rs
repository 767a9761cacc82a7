//! Configuration for the certprep server and chat client.
//!
//! Settings are resolved in this order (highest first):
//!
//! 1. Command-line flags (handled by the binary)
//! 2. Environment variables, including those loaded from `.env`
//! 3. The TOML file at `CERTPREP_CONFIG_PATH`, or `./certprep.toml`
//! 4. Built-in defaults
//!
//! A missing config file is not an error; a malformed one is.
//!
//! # Example
//!
//! ```toml
//! [corpus]
//! path = "data/cka_qa.json"
//!
//! [embedding]
//! base_url = "http://localhost:8080/v1"
//! model = "nomic-embed-text-v1.5"
//! timeout_secs = 30
//! concurrency = 4
//!
//! [server]
//! addr = "127.0.0.1:8000"
//! path = "/mcp"
//!
//! [chat]
//! base_url = "http://127.0.0.1:8000/v1"
//! model = "Llama-3.2-8B-Instruct-Q4_K_M"
//! mcp_url = "http://localhost:8000/mcp"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

/// Environment variable selecting the config file.
pub const CONFIG_PATH_ENV: &str = "CERTPREP_CONFIG_PATH";

const DEFAULT_CONFIG_FILE: &str = "certprep.toml";

/// API key used when the configured key variable is unset. Local
/// OpenAI-compatible servers accept any value.
pub const PLACEHOLDER_API_KEY: &str = "NA";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

/// Location of the question corpus.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// JSON array of `{id, question, answer}` objects.
    #[serde(default = "default_corpus_path")]
    pub path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
        }
    }
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/cka_qa.json")
}

/// Embedding endpoint settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible API (the part before `/embeddings`).
    #[serde(default = "default_embedding_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request limit; exceeding it is reported as a timeout.
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum embedding calls in flight while indexing the corpus.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Cache query embeddings by exact text.
    #[serde(default)]
    pub memoize: bool,
}

impl EmbeddingConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_url(),
            model: default_embedding_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_embedding_timeout(),
            concurrency: default_concurrency(),
            memoize: false,
        }
    }
}

fn default_embedding_url() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text-v1.5".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_concurrency() -> usize {
    1
}

/// Tool server bind settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// HTTP path of the MCP endpoint.
    #[serde(default = "default_server_path")]
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            path: default_server_path(),
        }
    }
}

fn default_server_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_server_path() -> String {
    "/mcp".to_string()
}

/// Chat client settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of an OpenAI-compatible API (the part before `/chat/completions`).
    #[serde(default = "default_chat_url")]
    pub base_url: String,

    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Idle limit while waiting for the completion stream.
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,

    /// Tool server endpoint.
    #[serde(default = "default_mcp_url")]
    pub mcp_url: String,
}

impl ChatConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_url(),
            model: default_chat_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_chat_timeout(),
            mcp_url: default_mcp_url(),
        }
    }
}

fn default_chat_url() -> String {
    "http://127.0.0.1:8000/v1".to_string()
}

fn default_chat_model() -> String {
    "Llama-3.2-8B-Instruct-Q4_K_M".to_string()
}

fn default_chat_timeout() -> u64 {
    120
}

fn default_mcp_url() -> String {
    "http://localhost:8000/mcp".to_string()
}

impl Config {
    /// Loads the config file from the default location and applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Loads the config file at `path` without environment overrides.
    ///
    /// If the file does not exist, default values are used.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies environment-style overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = non_empty("CERTPREP_CORPUS") {
            self.corpus.path = PathBuf::from(path);
        }
        if let Some(url) = non_empty("EMBEDDING_API_URL") {
            self.embedding.base_url = url;
        }
        if let Some(model) = non_empty("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.chat.base_url = url;
        }
        if let Some(model) = non_empty("OPENAI_MODEL_NAME") {
            self.chat.model = model;
        }
        if let Some(url) = non_empty("MCP_URL") {
            self.chat.mcp_url = url;
        }
    }
}

/// Reads the API key from the variable named `env_name`, falling back to
/// [`PLACEHOLDER_API_KEY`].
#[must_use]
pub fn resolve_api_key(env_name: &str) -> String {
    std::env::var(env_name)
        .ok()
        .filter(|key| !key.is_empty())
        .unwrap_or_else(|| PLACEHOLDER_API_KEY.to_string())
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write as _};

    use anyhow::Result;

    use super::*;

    fn write_config(content: &str) -> Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        file.write_all(content.as_bytes())?;
        Ok(file)
    }

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = Config::default();
        assert_eq!(config.corpus.path, PathBuf::from("data/cka_qa.json"));
        assert_eq!(config.embedding.base_url, "http://localhost:8080/v1");
        assert_eq!(config.embedding.model, "nomic-embed-text-v1.5");
        assert_eq!(config.embedding.concurrency, 1);
        assert!(!config.embedding.memoize);
        assert_eq!(config.server.addr, "127.0.0.1:8000");
        assert_eq!(config.server.path, "/mcp");
        assert_eq!(config.chat.mcp_url, "http://localhost:8000/mcp");
        assert_eq!(config.chat.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() -> Result<()> {
        let config = Config::load_from(Path::new("/nonexistent/certprep.toml"))?;
        assert_eq!(config.embedding.timeout_secs, 30);
        Ok(())
    }

    #[test]
    fn test_load_from_partial_file_keeps_other_defaults() -> Result<()> {
        let file = write_config(
            r#"
            [embedding]
            model = "bge-small-en-v1.5"
            concurrency = 4
            "#,
        )?;

        let config = Config::load_from(file.path())?;

        assert_eq!(config.embedding.model, "bge-small-en-v1.5");
        assert_eq!(config.embedding.concurrency, 4);
        assert_eq!(config.embedding.base_url, "http://localhost:8080/v1");
        assert_eq!(config.chat.model, "Llama-3.2-8B-Instruct-Q4_K_M");
        Ok(())
    }

    #[test]
    fn test_load_from_malformed_file_is_parse_error() -> Result<()> {
        let file = write_config("[embedding\nmodel = ")?;
        let err = Config::load_from(file.path()).expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
        Ok(())
    }

    #[test]
    fn test_apply_overrides_uses_environment_names() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("EMBEDDING_API_URL", "http://embed:9000/v1"),
            ("EMBEDDING_MODEL", "all-minilm-l6-v2"),
            ("OPENAI_BASE_URL", "http://llm:8000/v1"),
            ("OPENAI_MODEL_NAME", "qwen2.5"),
            ("MCP_URL", "http://tools:8000/mcp"),
            ("CERTPREP_CORPUS", "/srv/questions.json"),
        ]);
        let mut config = Config::default();

        config.apply_overrides(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.embedding.base_url, "http://embed:9000/v1");
        assert_eq!(config.embedding.model, "all-minilm-l6-v2");
        assert_eq!(config.chat.base_url, "http://llm:8000/v1");
        assert_eq!(config.chat.model, "qwen2.5");
        assert_eq!(config.chat.mcp_url, "http://tools:8000/mcp");
        assert_eq!(config.corpus.path, PathBuf::from("/srv/questions.json"));
    }

    #[test]
    fn test_apply_overrides_ignores_blank_values() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "EMBEDDING_MODEL").then(|| "  ".to_string()));
        assert_eq!(config.embedding.model, "nomic-embed-text-v1.5");
    }

    #[test]
    fn test_resolve_api_key_falls_back_to_placeholder() {
        assert_eq!(
            resolve_api_key("CERTPREP_TEST_KEY_THAT_IS_NEVER_SET"),
            PLACEHOLDER_API_KEY
        );
    }
}
