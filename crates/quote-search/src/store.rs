//! Corpus snapshots with freshness checks.
//!
//! A [`CorpusStore`] owns the path to one corpus file and hands out
//! `Arc<CorpusSnapshot>`s. Queries hold their snapshot for the duration of
//! a match, so a reload never disturbs an in-flight query: the new corpus is
//! parsed and validated completely before the shared reference is swapped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use quote_corpus::{Corpus, LoadError};
use quote_types::ReloadPolicy;

/// Identity of a corpus file version as seen by `stat`.
///
/// Two writes within the filesystem's timestamp granularity that leave the
/// length unchanged are indistinguishable; `ReloadPolicy::Always` covers
/// callers that cannot accept that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

fn fingerprint(path: &Path) -> Result<Fingerprint, LoadError> {
    let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    Ok(Fingerprint {
        modified: meta.modified().ok(),
        len: meta.len(),
    })
}

/// A fully loaded corpus and when it was read.
#[derive(Debug)]
pub struct CorpusSnapshot {
    corpus: Corpus,
    loaded_at: DateTime<Utc>,
    fingerprint: Fingerprint,
}

impl CorpusSnapshot {
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// One corpus file plus the most recently loaded snapshot of it.
#[derive(Debug)]
pub struct CorpusStore {
    path: PathBuf,
    policy: ReloadPolicy,
    current: RwLock<Option<Arc<CorpusSnapshot>>>,
    /// Serializes reloads: callers that see the same stale snapshot parse
    /// the file once, and publishes happen in read order.
    reload_lock: Mutex<()>,
}

impl CorpusStore {
    /// Create a store. Nothing is read until the first [`current`](Self::current).
    pub fn new(path: impl Into<PathBuf>, policy: ReloadPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            current: RwLock::new(None),
            reload_lock: Mutex::new(()),
        }
    }

    /// Create a store and load it immediately.
    pub fn open(path: impl Into<PathBuf>, policy: ReloadPolicy) -> Result<Self, LoadError> {
        let store = Self::new(path, policy);
        store.reload()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> ReloadPolicy {
        self.policy
    }

    /// The last published snapshot, without touching the file.
    pub fn cached(&self) -> Option<Arc<CorpusSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The snapshot to match against, reloading per the policy.
    ///
    /// A failed reload returns the error and leaves the previously published
    /// snapshot in place; it is never replaced by a partial corpus.
    pub fn current(&self) -> Result<Arc<CorpusSnapshot>, LoadError> {
        match self.policy {
            ReloadPolicy::Always => self.reload(),
            ReloadPolicy::Never => match self.cached() {
                Some(snapshot) => Ok(snapshot),
                None => self.reload_if_stale(None),
            },
            ReloadPolicy::IfModified => {
                let fp = fingerprint(&self.path)?;
                match self.cached() {
                    Some(snapshot) if snapshot.fingerprint == fp => Ok(snapshot),
                    _ => self.reload_if_stale(Some(fp)),
                }
            }
        }
    }

    /// Unconditionally re-read the file and publish the result.
    ///
    /// Reloads run one at a time, so snapshots are published in the order
    /// the file was read and an older parse never replaces a newer one.
    pub fn reload(&self) -> Result<Arc<CorpusSnapshot>, LoadError> {
        let _guard = self.lock_reload();
        self.load_and_publish()
    }

    fn lock_reload(&self) -> MutexGuard<'_, ()> {
        self.reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Parse the file and swap it in. Callers hold `reload_lock`.
    fn load_and_publish(&self) -> Result<Arc<CorpusSnapshot>, LoadError> {
        let fp = fingerprint(&self.path)?;
        let corpus = Corpus::load(&self.path).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Corpus reload failed");
            e
        })?;

        let snapshot = Arc::new(CorpusSnapshot {
            corpus,
            loaded_at: Utc::now(),
            fingerprint: fp,
        });
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));

        info!(
            path = %self.path.display(),
            entries = snapshot.corpus.len(),
            policy = self.policy.as_str(),
            "Corpus snapshot published"
        );
        Ok(snapshot)
    }

    /// Reload under the reload lock unless another caller already published
    /// a snapshot matching `expected` (or any snapshot, when `None`).
    fn reload_if_stale(
        &self,
        expected: Option<Fingerprint>,
    ) -> Result<Arc<CorpusSnapshot>, LoadError> {
        let _guard = self.lock_reload();

        if let Some(snapshot) = self.cached() {
            let fresh = expected.map_or(true, |fp| snapshot.fingerprint == fp);
            if fresh {
                debug!(path = %self.path.display(), "Snapshot refreshed by another caller");
                return Ok(snapshot);
            }
        }
        self.load_and_publish()
    }
}

/// Stores keyed by corpus path, for callers that name the corpus per call.
#[derive(Debug)]
pub struct CorpusRegistry {
    policy: ReloadPolicy,
    stores: RwLock<HashMap<PathBuf, Arc<CorpusStore>>>,
}

impl CorpusRegistry {
    pub fn new(policy: ReloadPolicy) -> Self {
        Self {
            policy,
            stores: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> ReloadPolicy {
        self.policy
    }

    /// The current snapshot for `path`.
    ///
    /// A store is registered only after its first successful load, so
    /// lookups of bad paths leave nothing behind.
    pub fn current(&self, path: &Path) -> Result<Arc<CorpusSnapshot>, LoadError> {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        let existing = self
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(store) = existing {
            return store.current();
        }

        let store = Arc::new(CorpusStore::new(key.clone(), self.policy));
        let snapshot = store.current()?;

        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        match stores.get(&key) {
            // Lost a registration race; the winner's store is authoritative.
            Some(winner) => winner.current(),
            None => {
                stores.insert(key, store);
                Ok(snapshot)
            }
        }
    }

    /// Number of registered corpora.
    pub fn len(&self) -> usize {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    const TWO: &str = r#"[{"text":"A","embedding":[1,0]},{"text":"B","embedding":[0,1]}]"#;
    const THREE: &str = r#"[{"text":"A","embedding":[1,0]},{"text":"B","embedding":[0,1]},{"text":"C","embedding":[1,1]}]"#;

    fn corpus_file(dir: &TempDir, json: &str) -> PathBuf {
        let path = dir.path().join("quotes.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_if_modified_reuses_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = corpus_file(&dir, TWO);
        let store = CorpusStore::new(&path, ReloadPolicy::IfModified);

        let a = store.current().unwrap();
        let b = store.current().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_if_modified_picks_up_changes() {
        let dir = TempDir::new().unwrap();
        let path = corpus_file(&dir, TWO);
        let store = CorpusStore::new(&path, ReloadPolicy::IfModified);

        assert_eq!(store.current().unwrap().corpus().len(), 2);
        std::fs::write(&path, THREE).unwrap();
        assert_eq!(store.current().unwrap().corpus().len(), 3);
    }

    #[test]
    fn test_always_reparses() {
        let dir = TempDir::new().unwrap();
        let path = corpus_file(&dir, TWO);
        let store = CorpusStore::new(&path, ReloadPolicy::Always);

        let a = store.current().unwrap();
        let b = store.current().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_never_ignores_changes() {
        let dir = TempDir::new().unwrap();
        let path = corpus_file(&dir, TWO);
        let store = CorpusStore::open(&path, ReloadPolicy::Never).unwrap();

        std::fs::write(&path, THREE).unwrap();
        assert_eq!(store.current().unwrap().corpus().len(), 2);
    }

    #[test]
    fn test_failed_reload_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = corpus_file(&dir, TWO);
        let store = CorpusStore::new(&path, ReloadPolicy::IfModified);
        let before = store.current().unwrap();

        std::fs::write(&path, r#"[{"text":"A","embedding":[1,0]},{"text":"B","embedding":[1]}]"#)
            .unwrap();
        assert!(matches!(
            store.current(),
            Err(LoadError::MalformedEntry { index: 1, .. })
        ));

        let cached = store.cached().unwrap();
        assert!(Arc::ptr_eq(&before, &cached));
    }

    #[test]
    fn test_always_reload_waits_for_running_reload() {
        let dir = TempDir::new().unwrap();
        let path = corpus_file(&dir, TWO);
        let store = CorpusStore::new(&path, ReloadPolicy::Always);

        thread::scope(|scope| {
            let running = store.lock_reload();
            let waiting = scope.spawn(|| store.current().map(|s| s.corpus().len()));

            thread::sleep(std::time::Duration::from_millis(100));
            assert!(!waiting.is_finished());
            assert!(store.cached().is_none());

            std::fs::write(&path, THREE).unwrap();
            drop(running);
            assert_eq!(waiting.join().unwrap().unwrap(), 3);
        });
        assert_eq!(store.cached().unwrap().corpus().len(), 3);
    }

    #[test]
    fn test_missing_file() {
        let store = CorpusStore::new("/nonexistent/quotes.json", ReloadPolicy::IfModified);
        assert!(matches!(store.current(), Err(LoadError::NotFound(_))));
        assert!(store.cached().is_none());
    }

    #[test]
    fn test_concurrent_readers_during_reload() {
        let dir = TempDir::new().unwrap();
        let path = corpus_file(&dir, TWO);
        let store = Arc::new(CorpusStore::new(&path, ReloadPolicy::Always));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let snapshot = store.current().unwrap();
                        let n = snapshot.corpus().len();
                        assert!(n == 2 || n == 3, "partial corpus of {} entries", n);
                    }
                })
            })
            .collect();

        // Swap the file atomically while readers run.
        for i in 0..20 {
            let tmp = dir.path().join("quotes.json.tmp");
            std::fs::write(&tmp, if i % 2 == 0 { THREE } else { TWO }).unwrap();
            std::fs::rename(&tmp, &path).unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_registry_registers_only_loaded_paths() {
        let dir = TempDir::new().unwrap();
        let path = corpus_file(&dir, TWO);
        let registry = CorpusRegistry::new(ReloadPolicy::IfModified);

        assert!(registry.current(Path::new("/nonexistent/q.json")).is_err());
        assert!(registry.is_empty());

        let a = registry.current(&path).unwrap();
        let b = registry.current(&path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }
}
