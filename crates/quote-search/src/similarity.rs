//! Similarity engine.
//!
//! [`find_best`] scans every corpus entry and keeps the one with the highest
//! cosine similarity to the query. The scan is O(entries x dimension) time
//! and O(1) extra space: no sorting and no auxiliary index. Curated quote
//! collections are a few thousand entries at most, where a linear pass over
//! contiguous vectors is faster than maintaining an index. Should the corpus
//! grow to millions of entries, an approximate nearest-neighbour index (HNSW)
//! built at load time would replace the loop in [`find_best_with`]; the
//! contract of `find_best` would not change.

use quote_corpus::{Corpus, QuoteEntry};
use tracing::debug;

use crate::error::MatchError;

/// A query vector with its norm computed once per match.
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    values: &'a [f32],
    norm: f64,
}

impl<'a> Query<'a> {
    pub fn new(values: &'a [f32]) -> Self {
        let norm = values
            .iter()
            .map(|v| f64::from(*v) * f64::from(*v))
            .sum::<f64>()
            .sqrt();
        Self { values, norm }
    }

    pub fn values(&self) -> &'a [f32] {
        self.values
    }

    pub fn norm(&self) -> f64 {
        self.norm
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A pairwise similarity measure between a query and a corpus entry.
///
/// Higher is more similar. A non-finite score (NaN, -inf) means the pair
/// has no defined similarity and the entry can never be selected.
pub trait Similarity {
    fn score(&self, query: &Query<'_>, entry: &QuoteEntry) -> f64;
}

/// Cosine similarity, `dot(q, e) / (|q| * |e|)`, accumulated in f64 and
/// clamped to [-1, 1]. Zero-norm operands score `-inf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cosine;

impl Similarity for Cosine {
    fn score(&self, query: &Query<'_>, entry: &QuoteEntry) -> f64 {
        if query.norm == 0.0 || entry.is_degenerate() {
            return f64::NEG_INFINITY;
        }
        let dot: f64 = query
            .values
            .iter()
            .zip(entry.embedding())
            .map(|(a, b)| f64::from(*a) * f64::from(*b))
            .sum();
        let score = dot / (query.norm * entry.norm());
        if score.is_nan() {
            return f64::NEG_INFINITY;
        }
        score.clamp(-1.0, 1.0)
    }
}

/// Cosine similarity of two raw vectors.
///
/// Returns `None` when the lengths differ, either vector has zero norm, or
/// the result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    let score = dot / (na.sqrt() * nb.sqrt());
    score.is_finite().then(|| score.clamp(-1.0, 1.0) as f32)
}

/// The winning entry of one match.
#[derive(Debug, Clone, Copy)]
pub struct MatchResult<'a> {
    pub entry: &'a QuoteEntry,
    /// Position of `entry` in the corpus
    pub index: usize,
    /// Similarity in [-1, 1]
    pub score: f32,
}

/// Find the corpus entry most similar to `query` by cosine similarity.
///
/// - Empty corpus: `NoMatch`.
/// - `query.len() != corpus.dimension()`: `DimensionMismatch`, checked before
///   any entry is scored.
/// - Ties keep the entry that comes first in corpus order.
/// - If no entry has a defined similarity (zero query vector, every entry
///   zero-norm, non-finite query values): `NoMatch`.
pub fn find_best<'a>(query: &[f32], corpus: &'a Corpus) -> Result<MatchResult<'a>, MatchError> {
    find_best_with(query, corpus, &Cosine)
}

/// [`find_best`] with a caller-supplied similarity measure.
pub fn find_best_with<'a, S>(
    query: &[f32],
    corpus: &'a Corpus,
    metric: &S,
) -> Result<MatchResult<'a>, MatchError>
where
    S: Similarity + ?Sized,
{
    if corpus.is_empty() {
        return Err(MatchError::NoMatch);
    }
    if query.len() != corpus.dimension() {
        return Err(MatchError::DimensionMismatch {
            expected: corpus.dimension(),
            actual: query.len(),
        });
    }

    let query = Query::new(query);
    let mut best: Option<(usize, f64)> = None;

    for (index, entry) in corpus.iter().enumerate() {
        let score = metric.score(&query, entry);
        if !score.is_finite() {
            continue;
        }
        // Strict improvement only: on a tie the earlier entry stays.
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }

    let (index, score) = best.ok_or(MatchError::NoMatch)?;
    let entry = &corpus.entries()[index];

    debug!(
        entries = corpus.len(),
        dimension = corpus.dimension(),
        index,
        id = entry.id(),
        score,
        "Best match"
    );

    Ok(MatchResult {
        entry,
        index,
        score: score as f32,
    })
}
