//! Explicit request memoization.
//!
//! Listings and downloads are memoized by argument with a fixed TTL (an
//! hour by default, matching how often the remote hierarchy actually
//! changes) behind `invalidate()` for a forced refresh. The caches sit in
//! mutexes so one `CachedStore` can serve several browsing sessions; the
//! cached values are `Arc`s, so a hit never copies a listing or a document.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::record::FileRecord;

use super::{list_all, FileStore};

/// Map with per-entry insertion times; entries older than the TTL read as
/// absent. No background eviction, values simply age out of reads.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (V, Instant)>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get<Q>(&self, key: &Q, now: Instant) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (value, stored_at) = self.entries.get(key)?;
        if now.duration_since(*stored_at) < self.ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    pub fn insert(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(key, (value, now));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bounded retry with doubling backoff for remote failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// Memoizing front for a `FileStore`.
pub struct CachedStore<S> {
    inner: S,
    retry: RetryPolicy,
    listings: Mutex<TtlCache<String, Arc<Vec<FileRecord>>>>,
    documents: Mutex<TtlCache<String, Arc<Vec<u8>>>>,
}

// A poisoned lock only means another session panicked mid-insert; the map
// itself is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: FileStore> CachedStore<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        CachedStore {
            inner,
            retry: RetryPolicy::default(),
            listings: Mutex::new(TtlCache::new(ttl)),
            documents: Mutex::new(TtlCache::new(ttl)),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Recursive listing under `root_id`, served from cache within the TTL.
    pub fn list_all(&self, root_id: &str) -> Result<Arc<Vec<FileRecord>>> {
        if let Some(hit) = lock(&self.listings).get(root_id, Instant::now()) {
            debug!("listing cache hit for `{root_id}`");
            return Ok(hit);
        }
        let records = self.retrying("listing", || list_all(&self.inner, root_id))?;
        let records = Arc::new(records);
        lock(&self.listings).insert(root_id.to_string(), Arc::clone(&records), Instant::now());
        Ok(records)
    }

    /// Recording bytes, served from cache within the TTL.
    pub fn download(&self, file_id: &str) -> Result<Arc<Vec<u8>>> {
        if let Some(hit) = lock(&self.documents).get(file_id, Instant::now()) {
            debug!("document cache hit for `{file_id}`");
            return Ok(hit);
        }
        let bytes = self.retrying("download", || self.inner.download(file_id))?;
        let bytes = Arc::new(bytes);
        lock(&self.documents).insert(file_id.to_string(), Arc::clone(&bytes), Instant::now());
        Ok(bytes)
    }

    /// Drops both caches; the next request of each kind goes to the store.
    pub fn invalidate(&self) {
        lock(&self.listings).clear();
        lock(&self.documents).clear();
        debug!("store caches invalidated");
    }

    fn retrying<T>(&self, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.retry.attempts.max(1);
        let mut delay = self.retry.base_delay;
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(Error::Remote(message)) if attempt < attempts => {
                    warn!(
                        "{what} failed (attempt {attempt}/{attempts}): {message}; \
                         retrying in {delay:?}"
                    );
                    thread::sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
