//! Content-addressed cache of analysis results.
//!
//! Entries are keyed by content hash, size and language tag. Each key owns a
//! slot; the first request for a key computes the result inside the slot
//! while concurrent requests for the same key wait on it and receive the
//! same `Arc`. The map lock is only held to find or create a slot, never
//! while computing.

mod persisted;

pub use persisted::PersistedAnalyses;

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use lru::LruCache;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, warn};

use crate::analysis::AnalysisResult;
use crate::db::StoreError;
use crate::fingerprint::{Fingerprint, FingerprintKey};

/// A cached analysis. Never mutated once created.
#[derive(Debug)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub result: Arc<AnalysisResult>,
    pub inserted_at: DateTime<Utc>,
}

/// Outcome of a cache request.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub result: Arc<AnalysisResult>,
    /// True when this request did not run the computation.
    pub hit: bool,
}

/// Cache instrumentation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests served from memory, including waits on a concurrent computation.
    pub hits: u64,
    /// Requests that had to fill their slot.
    pub misses: u64,
    /// Invocations of the compute function.
    pub computations: u64,
    /// Entries dropped by LRU pressure or superseded by new content.
    pub evictions: u64,
    /// Misses satisfied from the persisted layer.
    pub persisted_hits: u64,
    /// Live in-memory entries.
    pub entries: usize,
}

#[derive(Default)]
struct Slot {
    entry: OnceCell<Arc<CacheEntry>>,
}

struct State {
    slots: LruCache<FingerprintKey, Arc<Slot>>,
    /// Latest fingerprint seen for each path, for superseding.
    by_path: HashMap<PathBuf, FingerprintKey>,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    evictions: AtomicU64,
    persisted_hits: AtomicU64,
}

/// Bounded, thread-safe analysis cache.
pub struct AnalysisCache {
    state: Mutex<State>,
    counters: Counters,
    persisted: Option<PersistedAnalyses>,
}

impl AnalysisCache {
    /// In-memory cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(State {
                slots: LruCache::new(capacity),
                by_path: HashMap::new(),
            }),
            counters: Counters::default(),
            persisted: None,
        }
    }

    /// Consult `persisted` on in-memory misses and write results back to it.
    pub fn with_persisted(mut self, persisted: PersistedAnalyses) -> Self {
        self.persisted = Some(persisted);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached result for `fingerprint` analyzed as `language`,
    /// computing it at most once.
    pub fn get_or_compute<F>(&self, fingerprint: &Fingerprint, language: &str, compute: F) -> CacheLookup
    where
        F: FnOnce() -> AnalysisResult,
    {
        let slot = self.slot_for(fingerprint.key(language), &fingerprint.path);

        if let Some(entry) = slot.entry.get() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(path = %fingerprint.path.display(), "analysis cache hit");
            return CacheLookup {
                result: Arc::clone(&entry.result),
                hit: true,
            };
        }

        let mut filled_here = false;
        let mut computed_here = false;
        let entry = slot.entry.get_or_init(|| {
            filled_here = true;
            let result = match self.load_persisted(fingerprint, language) {
                Some(result) => result,
                None => {
                    computed_here = true;
                    self.counters.computations.fetch_add(1, Ordering::Relaxed);
                    let result = compute();
                    self.store_persisted(fingerprint, &result);
                    result
                }
            };
            Arc::new(CacheEntry {
                fingerprint: fingerprint.clone(),
                result: Arc::new(result),
                inserted_at: Utc::now(),
            })
        });

        if filled_here {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            if !computed_here {
                self.counters.persisted_hits.fetch_add(1, Ordering::Relaxed);
            }
            debug!(path = %fingerprint.path.display(), computed = computed_here, "analysis cache miss");
        } else {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }

        CacheLookup {
            result: Arc::clone(&entry.result),
            hit: !computed_here,
        }
    }

    /// Find or create the slot for a fingerprint, superseding any older
    /// content recorded for the same path.
    fn slot_for(&self, key: FingerprintKey, path: &Path) -> Arc<Slot> {
        let mut state = self.lock();

        let previous = state.by_path.insert(path.to_path_buf(), key.clone());
        if let Some(previous) = previous.filter(|p| *p != key) {
            let still_used = state.by_path.values().any(|k| *k == previous);
            if !still_used && state.slots.pop(&previous).is_some() {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(path = %path.display(), "superseded cached analysis");
            }
        }

        if let Some(slot) = state.slots.get(&key) {
            return Arc::clone(slot);
        }

        let slot = Arc::new(Slot::default());
        if let Some((evicted, _)) = state.slots.push(key, Arc::clone(&slot)) {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            state.by_path.retain(|_, k| *k != evicted);
        }
        slot
    }

    fn load_persisted(&self, fingerprint: &Fingerprint, language: &str) -> Option<AnalysisResult> {
        let persisted = self.persisted.as_ref()?;
        match persisted.load(fingerprint, language) {
            Ok(found) => found,
            Err(StoreError::Corrupt { reason, .. }) => {
                warn!(path = %fingerprint.path.display(), %reason, "corrupt persisted analysis, recomputing");
                None
            }
            Err(e) => {
                warn!(path = %fingerprint.path.display(), error = %e, "persisted analysis unavailable");
                None
            }
        }
    }

    fn store_persisted(&self, fingerprint: &Fingerprint, result: &AnalysisResult) {
        if let Some(persisted) = &self.persisted {
            if let Err(e) = persisted.store(fingerprint, result) {
                warn!(path = %fingerprint.path.display(), error = %e, "failed to persist analysis");
            }
        }
    }

    /// Cached entry without computing or touching recency.
    pub fn peek(&self, fingerprint: &Fingerprint, language: &str) -> Option<Arc<CacheEntry>> {
        let state = self.lock();
        state
            .slots
            .peek(&fingerprint.key(language))
            .and_then(|slot| slot.entry.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().slots.cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            persisted_hits: self.counters.persisted_hits.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Drop every entry (in memory and persisted) and zero the counters.
    pub fn reset(&self) {
        {
            let mut state = self.lock();
            state.slots.clear();
            state.by_path.clear();
        }
        for counter in [
            &self.counters.hits,
            &self.counters.misses,
            &self.counters.computations,
            &self.counters.evictions,
            &self.counters.persisted_hits,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Some(persisted) = &self.persisted {
            if let Err(e) = persisted.clear() {
                warn!(error = %e, "failed to clear persisted analyses");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn result(lines: usize) -> AnalysisResult {
        let mut r = AnalysisResult::empty("python");
        r.lines_of_code = lines;
        r
    }

    #[test]
    fn test_hit_skips_compute() {
        let cache = AnalysisCache::new(8);
        let fp = Fingerprint::of_bytes("a.py", b"x", None);

        let first = cache.get_or_compute(&fp, "python", || result(1));
        let second = cache.get_or_compute(&fp, "python", || panic!("should not recompute"));

        assert!(!first.hit);
        assert!(second.hit);
        assert!(Arc::ptr_eq(&first.result, &second.result));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.computations), (1, 1, 1));
    }

    #[test]
    fn test_new_content_supersedes_old_entry() {
        let cache = AnalysisCache::new(8);
        let old = Fingerprint::of_bytes("a.py", b"old", None);
        let new = Fingerprint::of_bytes("a.py", b"new", None);

        cache.get_or_compute(&old, "python", || result(1));
        let lookup = cache.get_or_compute(&new, "python", || result(2));

        assert!(!lookup.hit);
        assert_eq!(lookup.result.lines_of_code, 2);
        assert!(cache.peek(&old, "python").is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_identical_content_at_two_paths_shares_entry() {
        let cache = AnalysisCache::new(8);
        let a = Fingerprint::of_bytes("a.py", b"same", None);
        let b = Fingerprint::of_bytes("b.py", b"same", None);

        cache.get_or_compute(&a, "python", || result(1));
        assert!(cache.get_or_compute(&b, "python", || result(9)).hit);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_identical_content_in_two_languages_is_two_entries() {
        let cache = AnalysisCache::new(8);
        let py = Fingerprint::of_bytes("pkg/__init__.py", b"", None);
        let rs = Fingerprint::of_bytes("src/mod.rs", b"", None);

        cache.get_or_compute(&py, "python", || AnalysisResult::empty("python"));
        let lookup = cache.get_or_compute(&rs, "rust", || AnalysisResult::empty("rust"));

        assert!(!lookup.hit);
        assert_eq!(lookup.result.language, "rust");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().computations, 2);
        assert!(cache.peek(&py, "python").is_some());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = AnalysisCache::new(2);
        for (i, body) in [b"1", b"2", b"3"].iter().enumerate() {
            let fp = Fingerprint::of_bytes(format!("{}.py", i), *body, None);
            cache.get_or_compute(&fp, "python", || result(i));
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.peek(&Fingerprint::of_bytes("0.py", b"1", None), "python").is_none());
    }

    #[test]
    fn test_concurrent_requests_compute_once() {
        let cache = Arc::new(AnalysisCache::new(8));
        let fp = Fingerprint::of_bytes("shared.py", b"shared", None);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let fp = fp.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_compute(&fp, "python", || {
                        thread::sleep(Duration::from_millis(50));
                        result(7)
                    })
                })
            })
            .collect();

        let lookups: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.stats().computations, 1);
        assert_eq!(lookups.iter().filter(|l| !l.hit).count(), 1);
        assert!(lookups
            .iter()
            .all(|l| Arc::ptr_eq(&l.result, &lookups[0].result)));
    }

    #[test]
    fn test_panicking_compute_leaves_slot_empty() {
        let cache = AnalysisCache::new(8);
        let fp = Fingerprint::of_bytes("boom.py", b"boom", None);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.get_or_compute(&fp, "python", || panic!("analysis failed"))
        }));
        assert!(outcome.is_err());

        let lookup = cache.get_or_compute(&fp, "python", || result(3));
        assert!(!lookup.hit);
        assert_eq!(lookup.result.lines_of_code, 3);
    }

    #[test]
    fn test_reset_clears_entries_and_counters() {
        let cache = AnalysisCache::new(8);
        let fp = Fingerprint::of_bytes("a.py", b"x", None);
        cache.get_or_compute(&fp, "python", || result(1));
        cache.reset();

        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
        assert!(!cache.get_or_compute(&fp, "python", || result(1)).hit);
    }

    #[test]
    fn test_persisted_layer_survives_new_cache() {
        let temp = tempfile::TempDir::new().unwrap();
        let db = crate::db::Database::open(temp.path().join("c.db")).unwrap();
        let fp = Fingerprint::of_bytes("/p/a.py", b"x = 1", None);

        let first = AnalysisCache::new(8).with_persisted(PersistedAnalyses::new(db.clone()));
        first.get_or_compute(&fp, "python", || result(4));

        let second = AnalysisCache::new(8).with_persisted(PersistedAnalyses::new(db));
        let lookup = second.get_or_compute(&fp, "python", || panic!("should load from disk"));
        assert!(lookup.hit);
        assert_eq!(lookup.result.lines_of_code, 4);
        assert_eq!(second.stats().persisted_hits, 1);
        assert_eq!(second.stats().computations, 0);
    }
}
