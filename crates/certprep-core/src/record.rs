//! Question/answer records as stored in the corpus file.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of a corpus record.
///
/// Corpus files use either numeric or string ids, so both are accepted and
/// serialized back in their original form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionId {
    Number(i64),
    Text(String),
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for QuestionId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for QuestionId {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A single certification question with its reference answer.
///
/// Fields other than `id`, `question` and `answer` are kept in `extra` so a
/// tool result echoes the stored object unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: QuestionId,
    pub question: String,
    pub answer: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QuestionRecord {
    pub fn new(
        id: impl Into<QuestionId>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            answer: answer.into(),
            extra: Map::new(),
        }
    }
}

/// A record returned by semantic search together with its cosine similarity
/// to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredQuestion {
    #[serde(flatten)]
    pub record: QuestionRecord,
    pub similarity_score: f32,
}
