//! Match pipeline E2E tests.
//!
//! Corpus file on disk -> load -> nearest-quote scan -> formatted text.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use e2e_tests::{random_corpus, random_query, two_quote_corpus, TestHarness};
use quote_corpus::Corpus;
use quote_search::{
    cosine_similarity, find_best, format, match_and_format, CorpusStore, MatchError, MatchReport,
};
use quote_types::ReloadPolicy;

/// The query leaning toward the first axis picks the first quote, and the
/// one leaning toward the second picks the second, with author and source.
#[test]
fn test_two_quote_scenario() {
    let harness = TestHarness::new();
    let path = harness.write_json("quotes_with_embeddings.json", &two_quote_corpus());
    let corpus = Corpus::load(&path).unwrap();

    let result = find_best(&[0.9, 0.1], &corpus).unwrap();
    assert_eq!(format(&result), "\"The only way out is through.\"\n- Robert Frost");
    assert!((result.score - 0.9939).abs() < 1e-3);

    let result = find_best(&[0.1, 0.9], &corpus).unwrap();
    assert_eq!(format(&result), "\"Fortune favors the bold.\"\n- Virgil, Aeneid");
    assert_eq!(result.entry.id(), "q2");
}

/// Scaling the query does not change which quote wins.
#[test]
fn test_scale_invariance() {
    let harness = TestHarness::new();
    let path = harness.write_json("quotes.json", &random_corpus(11, 200, 32));
    let corpus = Corpus::load(&path).unwrap();
    let mut rng = StdRng::seed_from_u64(5);

    for _ in 0..20 {
        let q = random_query(&mut rng, 32);
        let scaled: Vec<f32> = q.iter().map(|v| v * 250.0).collect();
        let a = find_best(&q, &corpus).unwrap();
        let b = find_best(&scaled, &corpus).unwrap();
        assert_eq!(a.index, b.index);
    }
}

/// The winner matches an independent brute-force scan over the loaded file.
#[test]
fn test_matches_brute_force_over_file() {
    let harness = TestHarness::new();
    let path = harness.write_json("quotes.json", &random_corpus(21, 500, 48));
    let corpus = Corpus::load(&path).unwrap();
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..30 {
        let q = random_query(&mut rng, 48);
        let result = find_best(&q, &corpus).unwrap();

        let mut best_index = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (i, entry) in corpus.iter().enumerate() {
            let s = cosine_similarity(&q, entry.embedding()).unwrap();
            if s > best_score {
                best_score = s;
                best_index = i;
            }
        }
        assert!((result.score - best_score).abs() < 1e-5);
        // Near-ties may resolve differently after f32 rounding.
        if result.index != best_index {
            assert!((result.score - best_score).abs() < 1e-6);
        }
    }
}

/// Duplicated embeddings resolve to the first occurrence in file order.
#[test]
fn test_duplicate_embeddings_first_wins() {
    let harness = TestHarness::new();
    let path = harness.write(
        "quotes.json",
        r#"[{"text":"First","embedding":[0.6,0.8]},
            {"text":"Second","embedding":[0.6,0.8]},
            {"text":"Third","embedding":[1.2,1.6]}]"#,
    );
    let corpus = Corpus::load(&path).unwrap();
    for _ in 0..5 {
        assert_eq!(match_and_format(&[3.0, 4.0], &corpus).unwrap(), "\"First\"");
    }
}

/// Zero-norm entries load but are never selected.
#[test]
fn test_degenerate_entries_skipped() {
    let harness = TestHarness::new();
    let path = harness.write(
        "quotes.json",
        r#"[{"text":"Zero","embedding":[0,0]},{"text":"Opposite","embedding":[-1,0]}]"#,
    );
    let corpus = Corpus::load(&path).unwrap();
    assert_eq!(corpus.degenerate_count(), 1);
    assert_eq!(match_and_format(&[1.0, 0.0], &corpus).unwrap(), "\"Opposite\"");
    assert_eq!(
        find_best(&[0.0, 0.0], &corpus).unwrap_err(),
        MatchError::NoMatch
    );
}

/// The structured report carries the score the text never shows.
#[test]
fn test_report_has_score() {
    let harness = TestHarness::new();
    let path = harness.write_json("quotes.json", &two_quote_corpus());
    let corpus = Corpus::load(&path).unwrap();

    let result = find_best(&[0.0, 2.0], &corpus).unwrap();
    let report = MatchReport::from(&result);
    assert_eq!(report.id, "q2");
    assert_eq!(report.source.as_deref(), Some("Aeneid"));
    assert!((report.score - 1.0).abs() < 1e-6);
    assert!(!format(&result).contains("1.0"));
}

/// A store with `IfModified` sees a replaced file and never a torn one.
#[test]
fn test_store_follows_atomic_replacement() {
    let harness = TestHarness::new();
    let path = harness.write_json("quotes.json", &two_quote_corpus());
    let store = Arc::new(CorpusStore::new(&path, ReloadPolicy::IfModified));

    let first = store.current().unwrap();
    assert_eq!(first.corpus().len(), 2);

    harness.replace(
        "quotes.json",
        r#"[{"text":"Only one now, and a longer file than before","embedding":[1,0]}]"#,
    );
    let second = store.current().unwrap();
    assert_eq!(second.corpus().len(), 1);
    assert!(second.loaded_at() >= first.loaded_at());

    // The earlier snapshot is still intact for anyone holding it.
    assert_eq!(first.corpus().len(), 2);
}
