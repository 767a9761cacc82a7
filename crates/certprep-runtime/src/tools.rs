//! The two question-bank tools, independent of any wire protocol.
//!
//! [`QuestionTool`] names an operation, parses its JSON arguments and runs it
//! against a [`QuestionBank`]. Transports only translate the outcome.

use std::{fmt, str::FromStr};

use certprep_core::{QaError, QuestionBank};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

pub const TOOL_RANDOM_QUESTION: &str = "get_random_question";
pub const TOOL_SEARCH_QUESTION: &str = "get_question_and_answer";

/// An operation the tool server can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionTool {
    /// Uniformly random practice question with its answer.
    RandomQuestion,
    /// Question semantically closest to free text, with its similarity score.
    SearchQuestion,
}

impl QuestionTool {
    pub const ALL: [Self; 2] = [Self::RandomQuestion, Self::SearchQuestion];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RandomQuestion => TOOL_RANDOM_QUESTION,
            Self::SearchQuestion => TOOL_SEARCH_QUESTION,
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::RandomQuestion => {
                "Selects a random question from a list. It returns both the question and the answer."
            }
            Self::SearchQuestion => {
                "Searches an input text from the database for a corresponding question and answer \
                 using semantic similarity."
            }
        }
    }

    /// JSON schema of the tool's arguments.
    #[must_use]
    pub fn input_schema(self) -> Map<String, Value> {
        let schema = match self {
            Self::RandomQuestion => json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
            Self::SearchQuestion => json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "The text to search for in the questions."
                    }
                },
                "required": ["text"],
                "additionalProperties": false
            }),
        };
        match schema {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Runs the tool against `bank`.
    ///
    /// On success the value is the stored question object, augmented with
    /// `similarity_score` for a search.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if `arguments` do not match
    /// the tool's schema, or [`ToolError::Failed`] if the operation itself
    /// fails.
    pub async fn run(
        self,
        bank: &QuestionBank,
        arguments: Option<Map<String, Value>>,
    ) -> Result<Value, ToolError> {
        match self {
            Self::RandomQuestion => {
                let record = bank.random_question()?;
                info!(id = %record.id, "Selected random question");
                to_value(record)
            }
            Self::SearchQuestion => {
                let args: SearchArgs = parse_args(arguments)?;
                debug!(query_len = args.text.len(), "Searching questions");
                let scored = bank.search(&args.text).await?;
                info!(
                    id = %scored.record.id,
                    score = scored.similarity_score,
                    "Found closest question"
                );
                to_value(&scored)
            }
        }
    }
}

impl fmt::Display for QuestionTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QuestionTool {
    type Err = QaError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| QaError::UnknownOperation(name.to_string()))
    }
}

/// Failure of a single tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Arguments could not be decoded. The caller sent a malformed request.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The operation ran and failed.
    #[error(transparent)]
    Failed(#[from] QaError),

    #[error("failed to encode result: {0}")]
    Encode(String),
}

impl ToolError {
    /// The `{"error": message}` payload returned to the caller.
    #[must_use]
    pub fn payload(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

/// Arguments of `get_question_and_answer`.
#[derive(Debug, Deserialize)]
struct SearchArgs {
    text: String,
}

fn parse_args<T: serde::de::DeserializeOwned>(
    args: Option<Map<String, Value>>,
) -> Result<T, ToolError> {
    let value = Value::Object(args.unwrap_or_default());
    serde_json::from_value(value).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Encode(e.to_string()))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{collections::HashMap, sync::Arc};

    use certprep_core::{
        Corpus, EmbedError, EmbedFuture, Embedder, QuestionBank, QuestionRecord,
    };

    /// Embedder answering from a fixed table; unknown text is a transport error.
    pub(crate) struct FixedEmbedder(pub(crate) HashMap<&'static str, Vec<f32>>);

    impl Embedder for FixedEmbedder {
        fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
            let result = self
                .0
                .get(text)
                .cloned()
                .ok_or_else(|| EmbedError::Transport("connection refused".to_string()));
            Box::pin(async move { result })
        }
    }

    pub(crate) fn kubernetes_embedder() -> FixedEmbedder {
        FixedEmbedder(HashMap::from([
            ("What is a pod?", vec![0.9, 0.1, 0.0]),
            ("What is kube-proxy?", vec![0.1, 0.9, 0.2]),
            ("pod definition", vec![0.8, 0.2, 0.1]),
        ]))
    }

    pub(crate) async fn kubernetes_bank(embedder: FixedEmbedder) -> Arc<QuestionBank> {
        let corpus = Corpus::from_records(vec![
            QuestionRecord::new(1, "What is a pod?", "The smallest deployable unit."),
            QuestionRecord::new(2, "What is kube-proxy?", "A per-node network proxy."),
        ])
        .expect("unique ids");
        let (bank, _) = QuestionBank::build(corpus, Arc::new(embedder), 1).await;
        Arc::new(bank)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{testing::*, *};

    fn args(value: Value) -> Option<Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    #[test]
    fn test_tool_names_round_trip() {
        for tool in QuestionTool::ALL {
            assert_eq!(tool.name().parse::<QuestionTool>().ok(), Some(tool));
        }
    }

    #[test]
    fn test_unknown_tool_name_is_unknown_operation() {
        let err = "delete_question".parse::<QuestionTool>().expect_err("unknown");
        assert_eq!(err, QaError::UnknownOperation("delete_question".to_string()));
    }

    #[test]
    fn test_search_schema_requires_text() {
        let schema = QuestionTool::SearchQuestion.input_schema();
        assert_eq!(schema.get("required"), Some(&json!(["text"])));
    }

    #[tokio::test]
    async fn test_random_question_returns_corpus_record() {
        let bank = kubernetes_bank(kubernetes_embedder()).await;

        let value = QuestionTool::RandomQuestion
            .run(&bank, None)
            .await
            .expect("random question");

        let id = value.get("id").cloned().expect("id field");
        assert!(id == json!(1) || id == json!(2));
        assert!(value.get("answer").is_some());
        assert!(value.get("similarity_score").is_none());
    }

    #[tokio::test]
    async fn test_search_returns_record_with_similarity_score() {
        let bank = kubernetes_bank(kubernetes_embedder()).await;

        let value = QuestionTool::SearchQuestion
            .run(&bank, args(json!({ "text": "pod definition" })))
            .await
            .expect("search");

        assert_eq!(value["id"], json!(1));
        assert_eq!(value["question"], json!("What is a pod?"));
        assert!(value["similarity_score"].as_f64().is_some_and(|s| s > 0.9));
    }

    #[tokio::test]
    async fn test_search_without_text_is_invalid_arguments() {
        let bank = kubernetes_bank(kubernetes_embedder()).await;

        let err = QuestionTool::SearchQuestion
            .run(&bank, None)
            .await
            .expect_err("missing text");

        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_search_with_empty_index_reports_error_payload() {
        let bank = kubernetes_bank(FixedEmbedder(HashMap::new())).await;

        let err = QuestionTool::SearchQuestion
            .run(&bank, args(json!({ "text": "pod definition" })))
            .await
            .expect_err("empty index");

        assert!(matches!(err, ToolError::Failed(QaError::EmptyIndex)));
        let payload = err.payload();
        assert!(payload["error"].as_str().is_some_and(|m| m.contains("embeddings")));
    }
}
