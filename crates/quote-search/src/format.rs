//! Result formatting.
//!
//! The text layout is a compatibility contract with callers and must not
//! change shape:
//!
//! ```text
//! "<text>"
//! - <author>, <source>
//! ```
//!
//! The second line becomes `- <author>` or `- <source>` when only one is
//! known and is left out when neither is. There is no trailing newline and
//! the similarity score never appears in the text; callers that need it use
//! [`MatchReport`].

use serde::{Deserialize, Serialize};

use quote_corpus::QuoteEntry;

use crate::similarity::MatchResult;

/// Render the winning quote.
pub fn format(result: &MatchResult<'_>) -> String {
    format_entry(result.entry)
}

/// Render a quote entry in the result layout.
pub fn format_entry(entry: &QuoteEntry) -> String {
    let mut out = String::with_capacity(entry.text().len() + 64);
    out.push('"');
    out.push_str(entry.text());
    out.push('"');

    let attribution = match (non_blank(entry.author()), non_blank(entry.source())) {
        (Some(author), Some(source)) => Some(format!("{}, {}", author, source)),
        (Some(author), None) => Some(author.to_string()),
        (None, Some(source)) => Some(source.to_string()),
        (None, None) => None,
    };
    if let Some(attribution) = attribution {
        out.push_str("\n- ");
        out.push_str(&attribution);
    }
    out
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Structured match result with the score as its own field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub id: String,
    pub index: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub score: f32,
}

impl From<&MatchResult<'_>> for MatchReport {
    fn from(result: &MatchResult<'_>) -> Self {
        Self {
            id: result.entry.id().to_string(),
            index: result.index,
            text: result.entry.text().to_string(),
            author: result.entry.author().map(str::to_string),
            source: result.entry.source().map(str::to_string),
            score: result.score,
        }
    }
}
