//! The loaded, immutable quote corpus.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::entry::{position_id, QuoteEntry};
use crate::error::LoadError;
use crate::record::{parse_records, read_file};

/// An ordered collection of quotes sharing one embedding dimension.
///
/// Built once, read-only afterwards. Safe to share across threads behind an
/// `Arc` without locking.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    entries: Vec<QuoteEntry>,
    dimension: usize,
}

/// Load a corpus file. See [`Corpus::load`].
pub fn load(path: impl AsRef<Path>) -> Result<Corpus, LoadError> {
    Corpus::load(path)
}

impl Corpus {
    /// Load and validate a corpus file.
    ///
    /// The embedding dimension is taken from the first record; any record
    /// with a missing, non-numeric or differently sized embedding fails the
    /// whole load with `MalformedEntry`. An empty array is a valid, empty
    /// corpus.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading corpus");

        let json = read_file(path)?;
        let corpus = Self::from_json_str(&json)?;

        info!(
            path = %path.display(),
            entries = corpus.len(),
            dimension = corpus.dimension(),
            "Corpus loaded"
        );
        Ok(corpus)
    }

    /// Parse a corpus from an in-memory JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let records = parse_records(json, true)?;
        let entries = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                let id = record.id.unwrap_or_else(|| position_id(index));
                let embedding = record.embedding.ok_or_else(|| LoadError::MalformedEntry {
                    index,
                    reason: "missing embedding".to_string(),
                })?;
                Ok(QuoteEntry::new(id, record.text, record.metadata, embedding))
            })
            .collect::<Result<Vec<_>, LoadError>>()?;
        Self::from_entries(entries)
    }

    /// Build a corpus from entries, enforcing a single shared dimension and
    /// unique ids.
    pub fn from_entries(entries: Vec<QuoteEntry>) -> Result<Self, LoadError> {
        let dimension = validate(&entries)?;
        Ok(Self { entries, dimension })
    }

    /// Embedding length shared by every entry; 0 for an empty corpus.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[QuoteEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&QuoteEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QuoteEntry> {
        self.entries.iter()
    }

    /// Number of entries whose embedding has zero norm.
    pub fn degenerate_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_degenerate()).count()
    }
}

/// Check shared dimension, non-empty embeddings and unique ids; returns the
/// dimension.
fn validate(entries: &[QuoteEntry]) -> Result<usize, LoadError> {
    let dimension = entries.first().map(|e| e.embedding().len()).unwrap_or(0);
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let len = entry.embedding().len();
        if len == 0 {
            return Err(LoadError::MalformedEntry {
                index,
                reason: "embedding is empty".to_string(),
            });
        }
        if len != dimension {
            return Err(LoadError::MalformedEntry {
                index,
                reason: format!("embedding has {} dimensions, expected {}", len, dimension),
            });
        }
        if let Some(first) = seen.insert(entry.id(), index) {
            return Err(LoadError::MalformedEntry {
                index,
                reason: format!("duplicate id '{}' (first used by entry {})", entry.id(), first),
            });
        }
    }

    Ok(dimension)
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a QuoteEntry;
    type IntoIter = std::slice::Iter<'a, QuoteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::QuoteMetadata;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_corpus_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_two_entries() {
        let file = write_corpus_file(
            r#"[{"text":"A","author":"X","embedding":[1,0]},
                {"text":"B","book":"Y","embedding":[0,1]}]"#,
        );
        let corpus = load(file.path()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.dimension(), 2);
        assert_eq!(corpus.entries()[0].text(), "A");
        assert_eq!(corpus.entries()[0].id(), "#0");
        assert_eq!(corpus.entries()[1].source(), Some("Y"));
    }

    #[test]
    fn test_load_not_found() {
        let err = load("/nonexistent/quotes.json").unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn test_load_directory_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. } | LoadError::ParseError(_)));
    }

    #[test]
    fn test_load_invalid_json() {
        let file = write_corpus_file("not json");
        assert!(matches!(load(file.path()), Err(LoadError::ParseError(_))));
    }

    #[test]
    fn test_empty_corpus_is_valid() {
        let file = write_corpus_file("[]");
        let corpus = load(file.path()).unwrap();
        assert!(corpus.is_empty());
        assert_eq!(corpus.dimension(), 0);
    }

    #[test]
    fn test_divergent_dimension_fails_whole_load() {
        let err = Corpus::from_json_str(
            r#"[{"text":"A","embedding":[1,0,0]},
                {"text":"B","embedding":[0,1,0]},
                {"text":"C","embedding":[0,1]}]"#,
        )
        .unwrap_err();
        match err {
            LoadError::MalformedEntry { index, reason } => {
                assert_eq!(index, 2);
                assert!(reason.contains("2 dimensions, expected 3"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_embedding_reports_index() {
        let err = Corpus::from_json_str(
            r#"[{"text":"A","embedding":[1]},{"text":"B"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::MalformedEntry { index: 1, .. }));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Corpus::from_json_str(
            r#"[{"id":"x","text":"A","embedding":[1]},{"id":"x","text":"B","embedding":[1]}]"#,
        )
        .unwrap_err();
        match err {
            LoadError::MalformedEntry { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("duplicate id 'x'"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_explicit_numeric_id_beside_positional() {
        let corpus = Corpus::from_json_str(
            r#"[{"id":1,"text":"A","embedding":[1]},{"text":"B","embedding":[1]}]"#,
        )
        .unwrap();
        assert_eq!(corpus.entries()[0].id(), "1");
        assert_eq!(corpus.entries()[1].id(), "#1");
    }

    #[test]
    fn test_explicit_id_taking_a_position_id_rejected() {
        let err = Corpus::from_json_str(
            r##"[{"id":"#1","text":"A","embedding":[1]},{"text":"B","embedding":[1]}]"##,
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::MalformedEntry { index: 1, .. }));
    }

    #[test]
    fn test_from_entries_rejects_empty_embedding() {
        let entries = vec![QuoteEntry::new("a", "A", QuoteMetadata::default(), vec![])];
        assert!(matches!(
            Corpus::from_entries(entries),
            Err(LoadError::MalformedEntry { index: 0, .. })
        ));
    }

    #[test]
    fn test_degenerate_entries_load() {
        let corpus = Corpus::from_json_str(
            r#"[{"text":"A","embedding":[0,0]},{"text":"B","embedding":[1,1]}]"#,
        )
        .unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.degenerate_count(), 1);
    }

    #[test]
    fn test_load_does_not_modify_file() {
        let json = r#"[{"text":"A","embedding":[1,0]}]"#;
        let file = write_corpus_file(json);
        load(file.path()).unwrap();
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), json);
    }
}
