//! Single-flight TTL cache for network lookups.
//!
//! Concurrent callers asking for the same key share one fetch: the first
//! caller takes a per-key async lock and runs the fetch, the others wait on
//! that lock and then find the value already cached. Failures are never
//! cached, so the next caller (including a waiter) simply fetches again.
//! A key's lock is forgotten once its last caller finishes or is dropped.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Default time-to-live for cached results.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// A cached value and the instant after which it is no longer served.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub expiry: Instant,
}

impl<T> CacheEntry<T> {
    pub fn is_live(&self, now: Instant) -> bool {
        now < self.expiry
    }
}

/// Per-key fetch lock plus the number of callers currently using it.
struct InFlight {
    lock: Arc<Mutex<()>>,
    callers: usize,
}

type InFlightTable = std::sync::Mutex<HashMap<String, InFlight>>;

/// One caller's claim on a key's fetch lock. Dropping it, whether the
/// caller finished or was cancelled, removes the key once nobody else
/// holds a claim.
struct KeyClaim<'a> {
    table: &'a InFlightTable,
    key: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> KeyClaim<'a> {
    fn join(table: &'a InFlightTable, key: &'a str) -> Self {
        let mut in_flight = table.lock().unwrap_or_else(|e| e.into_inner());
        let entry = in_flight
            .entry(key.to_string())
            .or_insert_with(|| InFlight {
                lock: Arc::new(Mutex::new(())),
                callers: 0,
            });
        entry.callers += 1;
        Self {
            table,
            key,
            lock: Arc::clone(&entry.lock),
        }
    }
}

impl Drop for KeyClaim<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.table.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = in_flight.get_mut(self.key) {
            entry.callers = entry.callers.saturating_sub(1);
            if entry.callers == 0 {
                in_flight.remove(self.key);
            }
        }
    }
}

pub struct ResultCache<T> {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    in_flight: InFlightTable,
}

impl<T: Clone> Default for ResultCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<T: Clone> ResultCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            in_flight: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, or run `fetch` to produce it.
    ///
    /// At most one `fetch` per key runs at a time. A successful result is
    /// stored for the cache's TTL; an error is returned to this caller only.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let claim = KeyClaim::join(&self.in_flight, key);
        let _guard = claim.lock.lock().await;

        // Whoever held the lock before us may have filled the entry.
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        match fetch().await {
            Ok(value) => {
                self.insert(key, value.clone());
                Ok(value)
            }
            Err(e) => {
                log::debug!("ResultCache: fetch for '{}' failed, not cached", key);
                Err(e)
            }
        }
    }

    /// Live value for `key`, if any. Expired entries are removed.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        None
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: &str, value: T) {
        let entry = CacheEntry {
            value,
            expiry: Instant::now() + self.ttl,
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), entry);
    }

    pub fn invalidate(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including ones that have expired but not
    /// yet been purged.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "tests/result_cache_tests.rs"]
mod tests;
