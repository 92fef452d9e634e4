use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use e2e_tests::{random_corpus, random_query, TestHarness};
use quote_corpus::Corpus;
use quote_search::{find_best, format, CorpusStore};
use quote_types::ReloadPolicy;

const SMALL_ENTRIES: usize = 1_000;
const LARGE_ENTRIES: usize = 20_000;
const DEFAULT_QUERIES: usize = 200;

#[derive(Parser, Debug)]
#[command(name = "match_bench", about = "Quote matcher performance benchmark harness")]
struct Args {
    #[arg(long, value_enum, default_value = "small")]
    tier: DatasetTier,
    #[arg(long, default_value_t = 384)]
    dimension: usize,
    #[arg(long, default_value_t = DEFAULT_QUERIES)]
    queries: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Write the JSON report here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum DatasetTier {
    Small,
    Large,
}

impl DatasetTier {
    fn entries(&self) -> usize {
        match self {
            DatasetTier::Small => SMALL_ENTRIES,
            DatasetTier::Large => LARGE_ENTRIES,
        }
    }
}

#[derive(Debug, Serialize)]
struct PhaseStats {
    iterations: usize,
    mean_ms: f64,
    p50_ms: f64,
    p95_ms: f64,
    max_ms: f64,
}

impl PhaseStats {
    fn from_samples(mut samples_ms: Vec<f64>) -> Self {
        samples_ms.sort_by(|a, b| a.total_cmp(b));
        let n = samples_ms.len().max(1);
        let at = |q: f64| samples_ms.get(((n - 1) as f64 * q) as usize).copied().unwrap_or(0.0);
        Self {
            iterations: samples_ms.len(),
            mean_ms: samples_ms.iter().sum::<f64>() / n as f64,
            p50_ms: at(0.50),
            p95_ms: at(0.95),
            max_ms: samples_ms.last().copied().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    generated_at: String,
    tier: DatasetTier,
    entries: usize,
    dimension: usize,
    file_bytes: u64,
    load: PhaseStats,
    cached_lookup: PhaseStats,
    reparse_and_match: PhaseStats,
    match_only: PhaseStats,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1_000.0
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let entries = args.tier.entries();
    let harness = TestHarness::new();
    let path = harness.write_json("bench.json", &random_corpus(args.seed, entries, args.dimension));
    let file_bytes = std::fs::metadata(&path)?.len();

    let mut rng = StdRng::seed_from_u64(args.seed ^ 0x5eed);
    let queries: Vec<Vec<f32>> = (0..args.queries)
        .map(|_| random_query(&mut rng, args.dimension))
        .collect();

    let load_samples = (0..5)
        .map(|_| {
            let start = Instant::now();
            Corpus::load(&path).map(|_| elapsed_ms(start))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let cached = CorpusStore::open(&path, ReloadPolicy::IfModified)?;
    let mut cached_samples = Vec::with_capacity(queries.len());
    let mut match_samples = Vec::with_capacity(queries.len());
    for q in &queries {
        let start = Instant::now();
        let snapshot = cached.current()?;
        cached_samples.push(elapsed_ms(start));

        let start = Instant::now();
        let result = find_best(q, snapshot.corpus())?;
        let _ = format(&result);
        match_samples.push(elapsed_ms(start));
    }

    let always = CorpusStore::new(&path, ReloadPolicy::Always);
    let mut reparse_samples = Vec::new();
    for q in queries.iter().take(20) {
        let start = Instant::now();
        let snapshot = always.current()?;
        let result = find_best(q, snapshot.corpus())?;
        let _ = format(&result);
        reparse_samples.push(elapsed_ms(start));
    }

    let report = Report {
        generated_at: Utc::now().to_rfc3339(),
        tier: args.tier,
        entries,
        dimension: args.dimension,
        file_bytes,
        load: PhaseStats::from_samples(load_samples),
        cached_lookup: PhaseStats::from_samples(cached_samples),
        reparse_and_match: PhaseStats::from_samples(reparse_samples),
        match_only: PhaseStats::from_samples(match_samples),
    };

    let json = serde_json::to_string_pretty(&report)?;
    match args.out {
        Some(out) => std::fs::write(&out, json)?,
        None => println!("{}", json),
    }
    Ok(())
}
