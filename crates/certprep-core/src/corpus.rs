//! Static question corpus loaded once at startup.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use rand::{Rng, seq::SliceRandom};
use tracing::info;

use crate::record::{QuestionId, QuestionRecord};

/// Errors that make the corpus unusable. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("failed to read corpus {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse corpus {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("corpus {} contains no questions", path.display())]
    Empty { path: PathBuf },

    #[error("duplicate question id: {0}")]
    DuplicateId(QuestionId),
}

/// Ordered, read-only collection of question records.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    records: Vec<QuestionRecord>,
}

impl Corpus {
    /// Builds a corpus from records already in memory.
    ///
    /// # Errors
    ///
    /// Returns [`CorpusError::DuplicateId`] if two records share an id.
    pub fn from_records(records: Vec<QuestionRecord>) -> Result<Self, CorpusError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(&record.id) {
                return Err(CorpusError::DuplicateId(record.id.clone()));
            }
        }
        Ok(Self { records })
    }

    /// Reads a JSON array of question records from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a JSON array of
    /// records, is empty, or contains duplicate ids.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let records: Vec<QuestionRecord> =
            serde_json::from_str(&content).map_err(|source| CorpusError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if records.is_empty() {
            return Err(CorpusError::Empty {
                path: path.to_path_buf(),
            });
        }

        let corpus = Self::from_records(records)?;
        info!(path = %path.display(), questions = corpus.len(), "Loaded question corpus");
        Ok(corpus)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the record at `position` in corpus order.
    #[must_use]
    pub fn at(&self, position: usize) -> Option<&QuestionRecord> {
        self.records.get(position)
    }

    /// Looks up a record by id.
    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<&QuestionRecord> {
        self.records.iter().find(|record| &record.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionRecord> {
        self.records.iter()
    }

    /// Picks a record uniformly at random, or `None` for an empty corpus.
    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&QuestionRecord> {
        self.records.choose(rng)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use anyhow::Result;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn write_corpus(content: &str) -> Result<tempfile::NamedTempFile> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(content.as_bytes())?;
        Ok(file)
    }

    #[test]
    fn test_load_reads_records_in_file_order() -> Result<()> {
        let file = write_corpus(
            r#"[
                {"id": 1, "question": "What is a pod?", "answer": "A group of containers."},
                {"id": "two", "question": "What is kube-proxy?", "answer": "A network proxy."}
            ]"#,
        )?;

        let corpus = Corpus::load(file.path())?;

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.at(0).map(|r| r.question.as_str()), Some("What is a pod?"));
        assert_eq!(corpus.at(1).map(|r| &r.id), Some(&QuestionId::from("two")));
        Ok(())
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Corpus::load("/nonexistent/certprep/cka_qa.json").expect_err("should fail");
        assert!(matches!(err, CorpusError::Io { .. }));
    }

    #[test]
    fn test_load_malformed_json_is_parse_error() -> Result<()> {
        let file = write_corpus("{ not json")?;
        let err = Corpus::load(file.path()).expect_err("should fail");
        assert!(matches!(err, CorpusError::Parse { .. }));
        Ok(())
    }

    #[test]
    fn test_load_empty_array_is_rejected() -> Result<()> {
        let file = write_corpus("[]")?;
        let err = Corpus::load(file.path()).expect_err("should fail");
        assert!(matches!(err, CorpusError::Empty { .. }));
        Ok(())
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let err = Corpus::from_records(vec![
            QuestionRecord::new(1, "a", "b"),
            QuestionRecord::new(1, "c", "d"),
        ])
        .expect_err("should fail");
        assert!(matches!(err, CorpusError::DuplicateId(QuestionId::Number(1))));
    }

    #[test]
    fn test_get_finds_record_by_id() -> Result<()> {
        let corpus = Corpus::from_records(vec![
            QuestionRecord::new(1, "a", "b"),
            QuestionRecord::new("x", "c", "d"),
        ])?;
        assert_eq!(corpus.get(&QuestionId::from("x")).map(|r| r.answer.as_str()), Some("d"));
        assert!(corpus.get(&QuestionId::from(9)).is_none());
        Ok(())
    }

    #[test]
    fn test_pick_random_always_returns_member() -> Result<()> {
        let corpus = Corpus::from_records(
            (0_i64..5)
                .map(|i| QuestionRecord::new(i, format!("q{i}"), format!("a{i}")))
                .collect(),
        )?;
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let picked = corpus.pick_random(&mut rng).expect("non-empty corpus");
            assert!(corpus.get(&picked.id).is_some());
        }
        Ok(())
    }

    #[test]
    fn test_pick_random_on_empty_corpus_is_none() {
        let corpus = Corpus::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(corpus.pick_random(&mut rng).is_none());
    }
}
