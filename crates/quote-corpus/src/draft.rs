//! Corpus authoring: quotes without embeddings in, corpus file out.
//!
//! The embedding step itself lives with the caller (it needs a model); this
//! module only reads the un-embedded quote list and writes the finished
//! corpus in the format [`Corpus::load`](crate::Corpus::load) accepts.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::corpus::Corpus;
use crate::entry::{position_id, QuoteEntry, QuoteMetadata};
use crate::error::{LoadError, WriteError};
use crate::record::{parse_records, read_file, RecordOut};

/// A quote waiting for its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteDraft {
    /// Explicit id, or `None` to use the record's position
    pub id: Option<String>,
    pub text: String,
    pub metadata: QuoteMetadata,
}

impl QuoteDraft {
    /// Attach an embedding. When no id was given the entry takes
    /// [`position_id`] of `index`, the record's position.
    pub fn into_entry(self, index: usize, embedding: Vec<f32>) -> QuoteEntry {
        let id = self.id.unwrap_or_else(|| position_id(index));
        QuoteEntry::new(id, self.text, self.metadata, embedding)
    }
}

/// Read a quote list. Records use the corpus record shape; an `embedding`
/// field, if present, is validated and then discarded.
pub fn read_drafts(path: impl AsRef<Path>) -> Result<Vec<QuoteDraft>, LoadError> {
    let json = read_file(path.as_ref())?;
    let drafts = parse_records(&json, false)?
        .into_iter()
        .map(|record| QuoteDraft {
            id: record.id,
            text: record.text,
            metadata: record.metadata,
        })
        .collect();
    Ok(drafts)
}

/// Write `corpus` as a pretty-printed JSON array.
///
/// The file is written next to `path` under a temporary name and renamed
/// into place, so a concurrent reader sees either the old or the new file.
pub fn write_corpus(path: impl AsRef<Path>, corpus: &Corpus) -> Result<(), WriteError> {
    let path = path.as_ref();
    let records: Vec<RecordOut<'_>> = corpus
        .iter()
        .map(|entry| RecordOut {
            id: entry.id(),
            text: entry.text(),
            metadata: entry.metadata(),
            embedding: entry.embedding(),
        })
        .collect();
    let json = serde_json::to_vec_pretty(&records)?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    let io_err = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    {
        let mut file = fs::File::create(tmp_path).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }
    fs::rename(tmp_path, path).map_err(io_err)?;

    info!(
        path = %path.display(),
        entries = corpus.len(),
        dimension = corpus.dimension(),
        "Corpus written"
    );
    Ok(())
}
