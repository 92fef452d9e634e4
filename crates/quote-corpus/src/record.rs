//! Record-level parsing shared by the corpus loader and draft reader.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::QuoteMetadata;
use crate::error::LoadError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<RawId>,
    #[serde(default, alias = "quote")]
    text: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default, alias = "book")]
    source: Option<String>,
    #[serde(default)]
    embedding: Option<Value>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// A record that passed per-record validation.
#[derive(Debug)]
pub(crate) struct ParsedRecord {
    pub id: Option<String>,
    pub text: String,
    pub metadata: QuoteMetadata,
    pub embedding: Option<Vec<f32>>,
}

/// On-disk shape written by `write_corpus`.
#[derive(Debug, Serialize)]
pub(crate) struct RecordOut<'a> {
    pub id: &'a str,
    pub text: &'a str,
    #[serde(flatten)]
    pub metadata: &'a QuoteMetadata,
    pub embedding: &'a [f32],
}

/// Read a corpus-shaped file into memory, mapping IO failures to `LoadError`.
pub(crate) fn read_file(path: &Path) -> Result<String, LoadError> {
    match std::fs::read(path) {
        Ok(bytes) => String::from_utf8(bytes)
            .map_err(|e| LoadError::ParseError(format!("corpus is not valid UTF-8: {}", e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(LoadError::NotFound(path.to_path_buf()))
        }
        Err(source) => Err(LoadError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parse the top-level container and each record in it.
pub(crate) fn parse_records(
    json: &str,
    require_embedding: bool,
) -> Result<Vec<ParsedRecord>, LoadError> {
    let root: Value =
        serde_json::from_str(json).map_err(|e| LoadError::ParseError(e.to_string()))?;

    let items = match root {
        Value::Array(items) => items,
        other => {
            return Err(LoadError::ParseError(format!(
                "expected a JSON array of quote records, found {}",
                kind_of(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            parse_record(item, require_embedding)
                .map_err(|reason| LoadError::MalformedEntry { index, reason })
        })
        .collect()
}

fn parse_record(item: Value, require_embedding: bool) -> Result<ParsedRecord, String> {
    if !item.is_object() {
        return Err(format!("expected an object, found {}", kind_of(&item)));
    }

    let raw: RawRecord = serde_json::from_value(item).map_err(|e| e.to_string())?;

    let text = match raw.text {
        Some(text) if !text.trim().is_empty() => text,
        Some(_) => return Err("text is empty".to_string()),
        None => return Err("missing text".to_string()),
    };

    let embedding = match raw.embedding {
        None | Some(Value::Null) if require_embedding => {
            return Err("missing embedding".to_string())
        }
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_embedding(value)?),
    };

    let id = raw.id.map(|id| match id {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    });

    Ok(ParsedRecord {
        id,
        text,
        metadata: QuoteMetadata {
            author: raw.author,
            source: raw.source,
            extra: raw.extra,
        },
        embedding,
    })
}

fn parse_embedding(value: Value) -> Result<Vec<f32>, String> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(format!(
                "embedding must be an array of numbers, found {}",
                kind_of(&other)
            ))
        }
    };
    if items.is_empty() {
        return Err("embedding is empty".to_string());
    }

    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let x = v
                .as_f64()
                .ok_or_else(|| format!("embedding[{}] is not a number ({})", i, kind_of(v)))?;
            let x = x as f32;
            if !x.is_finite() {
                return Err(format!("embedding[{}] is out of range for f32", i));
            }
            Ok(x)
        })
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(json: &str) -> Result<ParsedRecord, LoadError> {
        parse_records(&format!("[{}]", json), true).map(|mut v| v.remove(0))
    }

    fn reason(err: LoadError) -> String {
        match err {
            LoadError::MalformedEntry { reason, .. } => reason,
            other => panic!("expected MalformedEntry, got {:?}", other),
        }
    }

    #[test]
    fn test_aliases_accepted() {
        let rec = one(r#"{"quote":"Q","book":"B","author":"A","embedding":[1,2]}"#).unwrap();
        assert_eq!(rec.text, "Q");
        assert_eq!(rec.metadata.source.as_deref(), Some("B"));
        assert_eq!(rec.metadata.author.as_deref(), Some("A"));
        assert_eq!(rec.embedding, Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_numeric_id_kept_as_string() {
        let rec = one(r#"{"id":42,"text":"Q","embedding":[1]}"#).unwrap();
        assert_eq!(rec.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_extra_fields_preserved() {
        let rec = one(r#"{"text":"Q","embedding":[1],"tags":["hope"]}"#).unwrap();
        assert_eq!(rec.metadata.extra["tags"], serde_json::json!(["hope"]));
        assert!(!rec.metadata.extra.contains_key("embedding"));
    }

    #[test]
    fn test_missing_embedding() {
        let err = one(r#"{"text":"Q"}"#).unwrap_err();
        assert_eq!(reason(err), "missing embedding");
    }

    #[test]
    fn test_missing_embedding_allowed_for_drafts() {
        let recs = parse_records(r#"[{"text":"Q"}]"#, false).unwrap();
        assert!(recs[0].embedding.is_none());
    }

    #[test]
    fn test_non_numeric_embedding_value() {
        let err = one(r#"{"text":"Q","embedding":[1,"x",3]}"#).unwrap_err();
        assert!(reason(err).contains("embedding[1] is not a number"));
    }

    #[test]
    fn test_embedding_not_array() {
        let err = one(r#"{"text":"Q","embedding":"1,2"}"#).unwrap_err();
        assert!(reason(err).contains("must be an array"));
    }

    #[test]
    fn test_embedding_overflowing_f32() {
        let err = one(r#"{"text":"Q","embedding":[1e300]}"#).unwrap_err();
        assert!(reason(err).contains("out of range"));
    }

    #[test]
    fn test_missing_and_empty_text() {
        assert_eq!(reason(one(r#"{"embedding":[1]}"#).unwrap_err()), "missing text");
        assert_eq!(
            reason(one(r#"{"text":"  ","embedding":[1]}"#).unwrap_err()),
            "text is empty"
        );
    }

    #[test]
    fn test_record_not_object() {
        let err = parse_records("[[1,2]]", true).unwrap_err();
        assert!(matches!(err, LoadError::MalformedEntry { index: 0, .. }));
    }

    #[test]
    fn test_container_not_array() {
        let err = parse_records(r#"{"text":"Q"}"#, true).unwrap_err();
        assert!(matches!(err, LoadError::ParseError(ref m) if m.contains("an object")));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_records("[{", true).unwrap_err();
        assert!(matches!(err, LoadError::ParseError(_)));
    }
}
