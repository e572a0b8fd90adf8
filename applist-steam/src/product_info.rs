//! Session-managed client for per-id product metadata.
//!
//! A [`ProductInfoClient`] owns a background task that keeps a
//! [`ProductInfoTransport`] session alive:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Authenticated
//!      ^                                          |
//!      +------------- backoff <-- connection lost +
//! ```
//!
//! Lookups wait for `Authenticated`, query in chunks with a timeout and a
//! bounded number of retries, and cache parsed records for
//! [`DEFAULT_TTL`](applist_lib::result_cache::DEFAULT_TTL).

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};

use applist_core::{DisplayType, KvNode, PackageInfo, ProductRecord};
use applist_lib::result_cache::DEFAULT_TTL;
use applist_lib::{NetLimiter, ResultCache};

use crate::error::SteamError;
use crate::transport::ProductInfoTransport;

/// Maximum ids per upstream query.
pub const MAX_IDS_PER_QUERY: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Authenticated,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ProductInfoConfig {
    pub connect_timeout: Duration,
    pub login_timeout: Duration,
    /// How long a lookup waits for the session to become ready.
    pub ready_timeout: Duration,
    pub query_timeout: Duration,
    /// Extra attempts per chunk after the first one fails.
    pub query_retries: u32,
    pub retry_delay: Duration,
    pub reconnect_backoff: Duration,
    /// Upper bound on ids per query. The transport's
    /// [`max_batch_size`](ProductInfoTransport::max_batch_size) can lower it.
    pub chunk_size: usize,
    pub cache_ttl: Duration,
}

impl Default for ProductInfoConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            login_timeout: Duration::from_secs(10),
            ready_timeout: Duration::from_secs(15),
            query_timeout: Duration::from_secs(5),
            query_retries: 2,
            retry_delay: Duration::from_millis(500),
            reconnect_backoff: Duration::from_secs(5),
            chunk_size: MAX_IDS_PER_QUERY,
            cache_ttl: DEFAULT_TTL,
        }
    }
}

/// Anything that can produce a [`ProductRecord`] for an id.
pub trait RecordSource: Send + Sync {
    fn record(&self, id: &str) -> impl Future<Output = Option<ProductRecord>> + Send;
}

struct Shared<T> {
    transport: T,
    config: ProductInfoConfig,
    limiter: NetLimiter,
    state: watch::Sender<SessionState>,
    records: ResultCache<ProductRecord>,
}

pub struct ProductInfoClient<T: ProductInfoTransport> {
    shared: Arc<Shared<T>>,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl<T: ProductInfoTransport> ProductInfoClient<T> {
    /// Create a client. Nothing connects until [`start`](Self::start).
    pub fn new(transport: T, config: ProductInfoConfig, limiter: NetLimiter) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        let records = ResultCache::new(config.cache_ttl);
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                limiter,
                state,
                records,
            }),
            session: Mutex::new(None),
        }
    }

    /// Spawn the session task. Calling it while the task runs is a no-op.
    pub fn start(&self) {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        if session.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        *session = Some(tokio::spawn(run_session(shared)));
    }

    /// Cancel the session task and disconnect.
    pub async fn stop(&self) {
        let task = self
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }
        self.shared.transport.disconnect().await;
        self.shared.set_state(SessionState::Disconnected);
        log::debug!("Product info session stopped");
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Wait until the session is authenticated, up to `ready_timeout`.
    pub async fn wait_ready(&self) -> bool {
        self.shared.wait_ready().await
    }

    pub fn cached_records(&self) -> usize {
        self.shared.records.len()
    }

    /// Records for `ids`, fetched fresh from upstream. Ids without a
    /// response (unknown, or their chunk failed) are absent.
    pub async fn fetch_batch(&self, ids: &[u32]) -> HashMap<u32, ProductRecord> {
        let trees = self.shared.query_all(ids).await;
        let mut records = HashMap::with_capacity(trees.len());
        for (id, tree) in trees {
            let record = parse_record(id, &tree);
            self.shared.records.insert(&record.id, record.clone());
            records.insert(id, record);
        }
        records
    }

    /// One record, served from the cache when possible. Concurrent lookups
    /// of the same id share one upstream query.
    pub async fn product_record(&self, id: &str) -> Option<ProductRecord> {
        let numeric = parse_id(id)?;
        self.shared
            .records
            .get_or_fetch(id, || async {
                self.fetch_batch(&[numeric])
                    .await
                    .remove(&numeric)
                    .ok_or_else(|| SteamError::not_found(format!("app {id}")))
            })
            .await
            .map_err(|e| log::debug!("No product record for {}: {}", id, e))
            .ok()
    }

    /// Records for `ids`: cache hits are served directly, misses are
    /// fetched in one batch. Keyed by the id string.
    pub async fn records(&self, ids: &[String]) -> HashMap<String, ProductRecord> {
        let mut found = HashMap::new();
        let mut misses = Vec::new();
        for id in ids {
            if found.contains_key(id) {
                continue;
            }
            match self.shared.records.get(id) {
                Some(record) => {
                    found.insert(id.clone(), record);
                }
                None => {
                    if let Some(numeric) = parse_id(id) {
                        misses.push(numeric);
                    }
                }
            }
        }
        if !misses.is_empty() {
            log::debug!("Product records: {} cached, {} to fetch", found.len(), misses.len());
            for (_, record) in self.fetch_batch(&misses).await {
                found.insert(record.id.clone(), record);
            }
        }
        found
    }

    /// Depot and DLC membership for `ids`, in input order. Ids with no
    /// data, or that are depots themselves, are skipped.
    pub async fn fetch_package_infos(&self, ids: &[u32]) -> Vec<PackageInfo> {
        let trees = self.shared.query_all(ids).await;
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| trees.get(id).and_then(|tree| parse_package_info(*id, tree)))
            .collect()
    }
}

impl<T: ProductInfoTransport> RecordSource for ProductInfoClient<T> {
    async fn record(&self, id: &str) -> Option<ProductRecord> {
        self.product_record(id).await
    }
}

impl<T: ProductInfoTransport> Drop for ProductInfoClient<T> {
    fn drop(&mut self) {
        if let Some(task) = self
            .session
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

impl<T: ProductInfoTransport> Shared<T> {
    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            log::debug!("Product info session: {} -> {}", previous, state);
        }
    }

    async fn establish(&self) -> Result<(), SteamError> {
        self.set_state(SessionState::Connecting);
        let connect = self.config.connect_timeout;
        timeout(connect, self.transport.connect())
            .await
            .map_err(|_| SteamError::Timeout(connect))??;
        self.set_state(SessionState::Connected);

        let login = self.config.login_timeout;
        timeout(login, self.transport.login_anonymous())
            .await
            .map_err(|_| SteamError::Timeout(login))??;
        self.set_state(SessionState::Authenticated);
        log::info!("Product info session ready");
        Ok(())
    }

    async fn wait_ready(&self) -> bool {
        let mut rx = self.state.subscribe();
        matches!(
            timeout(
                self.config.ready_timeout,
                rx.wait_for(|s| *s == SessionState::Authenticated)
            )
            .await,
            Ok(Ok(_))
        )
    }

    /// Query `ids` in chunks; chunks run concurrently, as many at a time as
    /// the limiter allows. Failed chunks are left out of the result.
    async fn query_all(&self, ids: &[u32]) -> HashMap<u32, KvNode> {
        let mut seen = HashSet::new();
        let unique: Vec<u32> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if unique.is_empty() {
            return HashMap::new();
        }

        let chunk_size = self
            .config
            .chunk_size
            .min(self.transport.max_batch_size())
            .max(1);
        let chunks = unique.chunks(chunk_size);
        let results = futures::future::join_all(chunks.map(|chunk| self.query_chunk(chunk))).await;
        results.into_iter().flatten().flatten().collect()
    }

    async fn query_chunk(&self, chunk: &[u32]) -> Option<HashMap<u32, KvNode>> {
        let attempts = self.config.query_retries + 1;
        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_delay).await;
            }
            if !self.wait_ready().await {
                log::warn!(
                    "Product info session not ready after {:?} (attempt {}/{})",
                    self.config.ready_timeout,
                    attempt,
                    attempts
                );
                continue;
            }

            // The timeout starts once the permit is held, so queueing behind
            // other chunks never counts against it.
            let result = {
                let _permit = self.limiter.acquire().await;
                timeout(self.config.query_timeout, self.transport.query(chunk)).await
            };
            match result {
                Ok(Ok(trees)) => {
                    log::debug!("Product info: {}/{} ids answered", trees.len(), chunk.len());
                    return Some(trees);
                }
                Ok(Err(e)) => {
                    if e.is_connection_lost() {
                        self.set_state(SessionState::Disconnected);
                    }
                    log::debug!(
                        "Product info query failed (attempt {}/{}): {}",
                        attempt,
                        attempts,
                        e
                    );
                }
                Err(_) => {
                    log::debug!(
                        "Product info query timed out after {:?} (attempt {}/{})",
                        self.config.query_timeout,
                        attempt,
                        attempts
                    );
                }
            }
        }
        log::warn!("Giving up on {} product info ids after {} attempts", chunk.len(), attempts);
        None
    }
}

/// Keep the session alive until the task is aborted.
async fn run_session<T: ProductInfoTransport>(shared: Arc<Shared<T>>) {
    let mut rx = shared.state.subscribe();
    loop {
        let current = *rx.borrow_and_update();
        if current == SessionState::Authenticated {
            if rx.changed().await.is_err() {
                return;
            }
            if *rx.borrow() == SessionState::Disconnected {
                log::warn!(
                    "Product info connection lost, reconnecting in {:?}",
                    shared.config.reconnect_backoff
                );
                shared.transport.disconnect().await;
                tokio::time::sleep(shared.config.reconnect_backoff).await;
            }
            continue;
        }

        if let Err(e) = shared.establish().await {
            log::warn!(
                "Product info connect failed: {}; retrying in {:?}",
                e,
                shared.config.reconnect_backoff
            );
            shared.set_state(SessionState::Disconnected);
            tokio::time::sleep(shared.config.reconnect_backoff).await;
        }
    }
}

fn parse_id(id: &str) -> Option<u32> {
    match id.trim().parse::<u32>() {
        Ok(0) | Err(_) => {
            log::debug!("Ignoring invalid product id '{}'", id);
            None
        }
        Ok(n) => Some(n),
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// A string value, or its `english` child for localized keys.
fn localized(node: Option<&KvNode>) -> Option<String> {
    let node = node?;
    non_empty(node.as_str()).or_else(|| non_empty(node.str_at(&["english"])))
}

/// Normalize one id's key-value tree into a [`ProductRecord`].
pub fn parse_record(id: u32, tree: &KvNode) -> ProductRecord {
    let id_str = id.to_string();
    let common = tree.get("common");
    let field = |keys: &[&str]| common.and_then(|c| c.path(keys));

    let name = non_empty(field(&["name"]).and_then(KvNode::as_str))
        .unwrap_or_else(|| ProductRecord::placeholder_name(&id_str));
    let display_type = field(&["type"])
        .and_then(KvNode::as_str)
        .map(DisplayType::from_upstream)
        .unwrap_or_default();

    let mut record = ProductRecord::new(id_str, display_type, name);
    record.client_icon_hash = non_empty(field(&["clienticon"]).and_then(KvNode::as_str));
    record.parent_id =
        non_empty(field(&["parent"]).and_then(KvNode::as_str)).filter(|p| p != "0");
    record.hero_image_hash = localized(field(&["library_assets", "hero_capsule", "image"]));
    record.main_capsule_hash = localized(field(&["assets", "main_capsule", "image"]));
    record.header_image_path = localized(field(&["header_image"]));
    record
}

/// Depot and DLC membership for one app. Returns `None` for depot entries.
pub fn parse_package_info(id: u32, tree: &KvNode) -> Option<PackageInfo> {
    let kind = tree.str_at(&["common", "type"]).unwrap_or_default();
    if kind.eq_ignore_ascii_case("depot") {
        return None;
    }

    let mut info = PackageInfo::new(id.to_string());
    let dlc_list = tree
        .str_at(&["extended", "listofdlc"])
        .or_else(|| tree.str_at(&["common", "extended", "listofdlc"]))
        .unwrap_or_default();
    for dlc in dlc_list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        info.dlc_ids.insert(dlc.to_string());
        info.dlc_depots.entry(dlc.to_string()).or_default();
    }

    let Some(depots) = tree.get("depots") else {
        return Some(info);
    };
    for (key, depot) in depots.entries() {
        let Ok(depot_id) = key.parse::<u32>() else {
            continue;
        };
        let has_content = depot.get("manifests").is_some() || depot.get("depotfromapp").is_some();
        if depot_id == id || !has_content {
            continue;
        }
        let depot_id = depot_id.to_string();
        match depot
            .str_at(&["dlcappid"])
            .and_then(|dlc| info.dlc_depots.get_mut(dlc))
        {
            Some(dlc_depots) => {
                dlc_depots.insert(depot_id);
            }
            None => {
                info.depot_ids.insert(depot_id);
            }
        }
    }
    Some(info)
}

#[cfg(test)]
#[path = "tests/product_info_tests.rs"]
mod tests;
