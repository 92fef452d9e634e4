//! End-to-end test infrastructure for the quote matcher.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering corpus files on disk through the match and call-boundary layers.

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

/// Shared test harness for E2E tests.
///
/// Owns a temp directory that corpus and quote files are written into.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Root of the temp directory
    pub root: PathBuf,
}

impl TestHarness {
    /// Create a new test harness with a fresh temp directory.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    /// Path of `name` inside the harness directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Write raw text to `name` and return its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("Failed to write test file");
        path
    }

    /// Write a JSON value to `name` and return its path.
    pub fn write_json(&self, name: &str, value: &Value) -> PathBuf {
        let bytes = serde_json::to_vec_pretty(value).expect("Failed to serialize test JSON");
        let path = self.path(name);
        std::fs::write(&path, bytes).expect("Failed to write test file");
        path
    }

    /// Replace `name` atomically (write aside, then rename).
    pub fn replace(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        let tmp = self.path(&format!("{}.swap", name));
        std::fs::write(&tmp, contents).expect("Failed to write swap file");
        std::fs::rename(&tmp, &path).expect("Failed to rename swap file");
        path
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// The two-quote corpus used throughout the matcher's examples.
pub fn two_quote_corpus() -> Value {
    json!([
        {
            "id": "q1",
            "text": "The only way out is through.",
            "author": "Robert Frost",
            "embedding": [1.0, 0.0]
        },
        {
            "id": "q2",
            "text": "Fortune favors the bold.",
            "author": "Virgil",
            "source": "Aeneid",
            "embedding": [0.0, 1.0]
        }
    ])
}

/// A corpus of `count` random vectors of length `dim`, seeded for
/// reproducibility. Every fifth quote has an author, every third a source.
pub fn random_corpus(seed: u64, count: usize, dim: usize) -> Value {
    let mut rng = StdRng::seed_from_u64(seed);
    let records: Vec<Value> = (0..count)
        .map(|i| {
            let embedding: Vec<f32> = (0..dim).map(|_| rng.random_range(-1.0..1.0)).collect();
            let mut record = json!({
                "id": format!("r{}", i),
                "text": format!("Random quote number {}", i),
                "embedding": embedding,
            });
            if i % 5 == 0 {
                record["author"] = json!(format!("Author {}", i));
            }
            if i % 3 == 0 {
                record["source"] = json!(format!("Book {}", i));
            }
            record
        })
        .collect();
    Value::Array(records)
}

/// A random query vector of length `dim`.
pub fn random_query(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rng.random_range(-1.0..1.0)).collect()
}
