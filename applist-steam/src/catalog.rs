//! Fuzzy search over the full product catalog.
//!
//! The index keeps one in-memory snapshot of every `{id, name}` pair,
//! refreshed at most once per [`CATALOG_TTL`] and persisted to disk so a
//! fresh process does not have to download it again. Searches merge the
//! local snapshot with the remote store search ("smart search") and rank
//! the union with [`crate::score`].

use std::borrow::Cow;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use applist_core::CatalogEntry;
use applist_lib::result_cache::DEFAULT_TTL;
use applist_lib::{ResultCache, Supersede};

use crate::error::SteamError;
use crate::score::{self, Query, ScoredEntry};

/// How long a catalog snapshot is served before the next refresh.
pub const CATALOG_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Queries shorter than this (after trimming) match nothing.
pub const MIN_QUERY_CHARS: usize = 2;

/// Snapshot file format version. Files with any other version are discarded.
const SNAPSHOT_VERSION: u32 = 1;

/// Upper bound on pages drained in one refresh.
const MAX_PAGES: usize = 1_000;

/// One page of the full catalog listing.
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub entries: Vec<CatalogEntry>,
    /// Cursor for the next page, or `None` when the listing is exhausted.
    pub next_cursor: Option<u64>,
}

/// Where catalog data comes from.
pub trait CatalogSource: Send + Sync {
    /// Fetch one page of the full catalog, starting after `cursor`.
    fn fetch_page(
        &self,
        cursor: Option<u64>,
    ) -> impl Future<Output = Result<CatalogPage, SteamError>> + Send;

    /// Remote relevance search for `query`.
    fn smart_search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<CatalogEntry>, SteamError>> + Send;
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Snapshot lifetime.
    pub ttl: Duration,
    /// After a failed refresh, serve the old (or empty) snapshot for this
    /// long before trying the network again.
    pub retry_after_failure: Duration,
    /// Where the snapshot is persisted. `None` keeps it in memory only.
    pub snapshot_path: Option<PathBuf>,
    /// Merge remote store search results into every search.
    pub smart_search: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            ttl: CATALOG_TTL,
            retry_after_failure: Duration::from_secs(5 * 60),
            snapshot_path: None,
            smart_search: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCatalog<'a> {
    version: u32,
    fetched_at: String,
    entries: Cow<'a, [CatalogEntry]>,
}

struct Snapshot {
    entries: Arc<Vec<CatalogEntry>>,
    expires_at: Instant,
}

#[derive(Default)]
struct IndexState {
    snapshot: Option<Snapshot>,
    last_failure: Option<Instant>,
    disk_checked: bool,
}

pub struct CatalogIndex<S> {
    source: S,
    config: CatalogConfig,
    state: RwLock<IndexState>,
    refresh_lock: Mutex<()>,
    smart_cache: ResultCache<Vec<CatalogEntry>>,
    latest: Supersede,
}

impl<S: CatalogSource> CatalogIndex<S> {
    pub fn new(source: S, config: CatalogConfig) -> Self {
        Self {
            source,
            config,
            state: RwLock::new(IndexState::default()),
            refresh_lock: Mutex::new(()),
            smart_cache: ResultCache::new(DEFAULT_TTL),
            latest: Supersede::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Ranked matches for `query`, best first, at most `max_results`.
    ///
    /// Never fails: if the catalog cannot be refreshed the previous snapshot
    /// (or nothing) is searched, and a failed smart search is left out.
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<CatalogEntry> {
        self.search_scored(query, max_results)
            .await
            .into_iter()
            .map(|hit| hit.entry)
            .collect()
    }

    /// Like [`search`](Self::search) but keeps each entry's score.
    pub async fn search_scored(&self, query: &str, max_results: usize) -> Vec<ScoredEntry> {
        let query = Query::new(query);
        if query.char_len() < MIN_QUERY_CHARS || max_results == 0 {
            return Vec::new();
        }

        let (smart, local) = tokio::join!(self.smart_hits(&query), self.entries());
        let ranked = score::rank(&query, &smart, &local, max_results);
        log::debug!(
            "Search '{}': {} smart, {} local entries, {} results",
            query.as_str(),
            smart.len(),
            local.len(),
            ranked.len()
        );
        ranked
    }

    /// Search, unless a newer `search_latest` call starts before this one
    /// finishes. Superseded calls return `None`.
    pub async fn search_latest(
        &self,
        query: &str,
        max_results: usize,
    ) -> Option<Vec<CatalogEntry>> {
        self.latest.run(self.search(query, max_results)).await
    }

    /// Forget the in-memory snapshot and cached smart-search results. The
    /// next search refreshes from the network.
    pub fn invalidate(&self) {
        let mut state = self.write_state();
        state.snapshot = None;
        state.last_failure = None;
        state.disk_checked = true;
        drop(state);
        self.smart_cache.clear();
    }

    /// Entries in the current snapshot (zero before the first search).
    pub fn snapshot_len(&self) -> usize {
        self.read_state()
            .snapshot
            .as_ref()
            .map_or(0, |s| s.entries.len())
    }

    /// The current catalog, refreshing it first if it has expired.
    pub async fn entries(&self) -> Arc<Vec<CatalogEntry>> {
        if let Some(fresh) = self.fresh_snapshot() {
            return fresh;
        }

        let _refresh = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(fresh) = self.fresh_snapshot() {
            return fresh;
        }

        if let Some(loaded) = self.load_from_disk() {
            return loaded;
        }

        if self.in_failure_backoff() {
            return self.current_or_empty();
        }

        match self.fetch_all().await {
            Ok(entries) => {
                log::info!("Catalog refreshed: {} entries", entries.len());
                let entries = Arc::new(entries);
                self.install(Arc::clone(&entries), self.config.ttl);
                self.write_state().last_failure = None;
                self.persist(&entries);
                entries
            }
            Err(e) => {
                log::warn!("Catalog refresh failed, keeping previous snapshot: {}", e);
                self.write_state().last_failure = Some(Instant::now());
                self.current_or_empty()
            }
        }
    }

    async fn smart_hits(&self, query: &Query) -> Vec<CatalogEntry> {
        if !self.config.smart_search {
            return Vec::new();
        }
        let key = query.as_str();
        match self
            .smart_cache
            .get_or_fetch(key, || self.source.smart_search(key))
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                log::warn!("Smart search for '{}' failed: {}", key, e);
                Vec::new()
            }
        }
    }

    async fn fetch_all(&self) -> Result<Vec<CatalogEntry>, SteamError> {
        let mut entries = Vec::new();
        let mut cursor = None;

        for _ in 0..MAX_PAGES {
            let page = self.source.fetch_page(cursor).await?;
            entries.extend(
                page.entries
                    .into_iter()
                    .filter(|e| !e.id.is_empty() && !e.name.trim().is_empty()),
            );
            match page.next_cursor {
                Some(next) if Some(next) != cursor => cursor = Some(next),
                Some(_) => {
                    log::warn!(
                        "Catalog cursor did not advance, stopping at {} entries",
                        entries.len()
                    );
                    return Ok(entries);
                }
                None => return Ok(entries),
            }
        }
        log::warn!("Catalog listing exceeded {} pages, truncating", MAX_PAGES);
        Ok(entries)
    }

    /// On the first refresh only, adopt the persisted snapshot. Returns it
    /// when it is still fresh; a stale one is installed as the fallback.
    fn load_from_disk(&self) -> Option<Arc<Vec<CatalogEntry>>> {
        {
            let mut state = self.write_state();
            if state.disk_checked {
                return None;
            }
            state.disk_checked = true;
        }
        let path = self.config.snapshot_path.as_deref()?;
        let (entries, age) = load_snapshot(path)?;
        let remaining = self.config.ttl.saturating_sub(age);
        let entries = Arc::new(entries);
        self.install(Arc::clone(&entries), remaining);

        if remaining.is_zero() {
            log::debug!("Persisted catalog is stale ({:?} old), refreshing", age);
            None
        } else {
            log::info!("Loaded catalog from {} ({} entries)", path.display(), entries.len());
            Some(entries)
        }
    }

    fn persist(&self, entries: &[CatalogEntry]) {
        let Some(path) = self.config.snapshot_path.as_deref() else {
            return;
        };
        if let Err(e) = save_snapshot(path, entries) {
            log::warn!("Could not write catalog snapshot to {}: {}", path.display(), e);
        }
    }

    fn install(&self, entries: Arc<Vec<CatalogEntry>>, lifetime: Duration) {
        self.write_state().snapshot = Some(Snapshot {
            entries,
            expires_at: Instant::now() + lifetime,
        });
    }

    fn fresh_snapshot(&self) -> Option<Arc<Vec<CatalogEntry>>> {
        let now = Instant::now();
        self.read_state()
            .snapshot
            .as_ref()
            .filter(|s| s.expires_at > now)
            .map(|s| Arc::clone(&s.entries))
    }

    fn current_or_empty(&self) -> Arc<Vec<CatalogEntry>> {
        self.read_state()
            .snapshot
            .as_ref()
            .map(|s| Arc::clone(&s.entries))
            .unwrap_or_default()
    }

    fn in_failure_backoff(&self) -> bool {
        self.read_state()
            .last_failure
            .is_some_and(|at| at.elapsed() < self.config.retry_after_failure)
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Read a persisted snapshot and its age. Unreadable, malformed or
/// wrong-version files are removed.
fn load_snapshot(path: &Path) -> Option<(Vec<CatalogEntry>, Duration)> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            log::warn!("Could not read catalog snapshot {}: {}", path.display(), e);
            return None;
        }
    };

    let persisted: PersistedCatalog<'static> = match serde_json::from_str(&text) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("Discarding malformed catalog snapshot {}: {}", path.display(), e);
            let _ = fs::remove_file(path);
            return None;
        }
    };
    if persisted.version != SNAPSHOT_VERSION {
        log::debug!(
            "Discarding catalog snapshot version {} (want {})",
            persisted.version,
            SNAPSHOT_VERSION
        );
        let _ = fs::remove_file(path);
        return None;
    }

    let age = match chrono::DateTime::parse_from_rfc3339(&persisted.fetched_at) {
        // A timestamp in the future counts as brand new.
        Ok(at) => chrono::Utc::now()
            .signed_duration_since(at)
            .to_std()
            .unwrap_or(Duration::ZERO),
        Err(_) => Duration::MAX,
    };
    Some((persisted.entries.into_owned(), age))
}

fn save_snapshot(path: &Path, entries: &[CatalogEntry]) -> Result<(), SteamError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let persisted = PersistedCatalog {
        version: SNAPSHOT_VERSION,
        fetched_at: chrono::Utc::now().to_rfc3339(),
        entries: Cow::Borrowed(entries),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    serde_json::to_writer(&mut tmp, &persisted)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
