use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use applist_core::CatalogEntry;
use applist_steam::*;
use tokio::time::Duration;

#[derive(Default)]
struct FakeSource {
    /// Page served for each cursor.
    pages: HashMap<Option<u64>, CatalogPage>,
    smart: HashMap<String, Vec<CatalogEntry>>,
    smart_delays: HashMap<String, Duration>,
    page_delay: Option<Duration>,
    fail_pages: AtomicBool,
    fail_smart: AtomicBool,
    page_calls: AtomicUsize,
    smart_calls: Mutex<Vec<String>>,
}

impl FakeSource {
    fn with_catalog(entries: Vec<CatalogEntry>) -> Self {
        let mut source = Self::default();
        source.pages.insert(
            None,
            CatalogPage {
                entries,
                next_cursor: None,
            },
        );
        source
    }

    fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    fn smart_calls(&self) -> Vec<String> {
        self.smart_calls.lock().unwrap().clone()
    }
}

impl CatalogSource for FakeSource {
    async fn fetch_page(&self, cursor: Option<u64>) -> Result<CatalogPage, SteamError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.page_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_pages.load(Ordering::SeqCst) {
            return Err(SteamError::Status {
                status: 503,
                url: "catalog".into(),
            });
        }
        Ok(self.pages.get(&cursor).cloned().unwrap_or_default())
    }

    async fn smart_search(&self, query: &str) -> Result<Vec<CatalogEntry>, SteamError> {
        self.smart_calls.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.smart_delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_smart.load(Ordering::SeqCst) {
            return Err(SteamError::parse("bad json"));
        }
        Ok(self.smart.get(query).cloned().unwrap_or_default())
    }
}

fn entries() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new("400", "Portal"),
        CatalogEntry::new("620", "Portal 2"),
        CatalogEntry::new("440", "Team Fortress 2"),
        CatalogEntry::new("220", "Half-Life 2"),
        CatalogEntry::new("", "Nameless id"),
        CatalogEntry::new("1", "   "),
    ]
}

fn local_only() -> CatalogConfig {
    CatalogConfig {
        smart_search: false,
        ..Default::default()
    }
}

fn ids(results: &[CatalogEntry]) -> Vec<&str> {
    results.iter().map(|e| e.id.as_str()).collect()
}

#[tokio::test(start_paused = true)]
async fn short_queries_match_nothing() {
    let index = CatalogIndex::new(FakeSource::with_catalog(entries()), CatalogConfig::default());

    assert!(index.search("p", 10).await.is_empty());
    assert!(index.search("  p  ", 10).await.is_empty());
    assert!(index.search("", 10).await.is_empty());
    assert_eq!(index.source().page_calls(), 0);
    assert!(index.source().smart_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn search_ranks_local_catalog() {
    let index = CatalogIndex::new(FakeSource::with_catalog(entries()), local_only());

    let results = index.search("portal", 10).await;
    assert_eq!(ids(&results), vec!["400", "620"]);

    let scored = index.search_scored("PORTAL", 10).await;
    assert_eq!(scored[0].score, 10_000);
    assert!(scored.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test(start_paused = true)]
async fn blank_entries_are_dropped_on_refresh() {
    let index = CatalogIndex::new(FakeSource::with_catalog(entries()), local_only());
    index.search("portal", 10).await;
    assert_eq!(index.snapshot_len(), 4);
}

#[tokio::test(start_paused = true)]
async fn concurrent_searches_share_one_refresh() {
    let mut source = FakeSource::with_catalog(entries());
    source.page_delay = Some(Duration::from_millis(200));
    let index = CatalogIndex::new(source, local_only());

    let (a, b, c) = tokio::join!(
        index.search("portal", 10),
        index.search("team", 10),
        index.search("half", 10)
    );
    assert_eq!(ids(&a), vec!["400", "620"]);
    assert_eq!(ids(&b), vec!["440"]);
    assert_eq!(ids(&c), vec!["220"]);
    assert_eq!(index.source().page_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn snapshot_refreshed_after_ttl() {
    let index = CatalogIndex::new(FakeSource::with_catalog(entries()), local_only());

    index.search("portal", 10).await;
    index.search("portal", 10).await;
    assert_eq!(index.source().page_calls(), 1);

    tokio::time::advance(Duration::from_secs(25 * 60 * 60)).await;
    index.search("portal", 10).await;
    assert_eq!(index.source().page_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_previous_snapshot() {
    let index = CatalogIndex::new(FakeSource::with_catalog(entries()), local_only());
    assert_eq!(index.search("portal", 10).await.len(), 2);

    index.source().fail_pages.store(true, Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(25 * 60 * 60)).await;

    assert_eq!(index.search("portal", 10).await.len(), 2);
    assert_eq!(index.source().page_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_first_refresh_yields_empty() {
    let source = FakeSource::with_catalog(entries());
    source.fail_pages.store(true, Ordering::SeqCst);
    let index = CatalogIndex::new(source, local_only());

    assert!(index.search("portal", 10).await.is_empty());
    assert_eq!(index.snapshot_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_is_not_retried_immediately() {
    let source = FakeSource::with_catalog(entries());
    source.fail_pages.store(true, Ordering::SeqCst);
    let index = CatalogIndex::new(source, local_only());

    index.search("portal", 10).await;
    index.search("portal", 10).await;
    assert_eq!(index.source().page_calls(), 1);

    index.source().fail_pages.store(false, Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(6 * 60)).await;
    assert_eq!(index.search("portal", 10).await.len(), 2);
    assert_eq!(index.source().page_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn pages_are_drained_until_exhausted() {
    let mut source = FakeSource::default();
    source.pages.insert(
        None,
        CatalogPage {
            entries: vec![CatalogEntry::new("10", "Counter-Strike")],
            next_cursor: Some(10),
        },
    );
    source.pages.insert(
        Some(10),
        CatalogPage {
            entries: vec![CatalogEntry::new("20", "Counter-Strike: Source")],
            next_cursor: Some(20),
        },
    );
    source.pages.insert(
        Some(20),
        CatalogPage {
            entries: vec![CatalogEntry::new("30", "Counter-Strike 2")],
            // a cursor that stops advancing ends the listing
            next_cursor: Some(20),
        },
    );
    let index = CatalogIndex::new(source, local_only());

    assert_eq!(index.search("counter", 10).await.len(), 3);
    assert_eq!(index.source().page_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn smart_hits_merged_and_cached() {
    let mut source = FakeSource::with_catalog(entries());
    source.smart.insert(
        "portal".into(),
        vec![
            CatalogEntry::new("620", "Portal 2 (Store)"),
            CatalogEntry::new("317400", "Portal Stories: Mel"),
        ],
    );
    let index = CatalogIndex::new(source, CatalogConfig::default());

    let results = index.search("Portal", 10).await;
    assert!(results.iter().any(|e| e.id == "317400"));
    let store_name = results.iter().find(|e| e.id == "620").unwrap();
    assert_eq!(store_name.name, "Portal 2 (Store)");
    assert_eq!(results.iter().filter(|e| e.id == "620").count(), 1);

    index.search("portal ", 10).await;
    assert_eq!(index.source().smart_calls(), vec!["portal"]);
}

#[tokio::test(start_paused = true)]
async fn smart_failure_only_drops_that_source() {
    let source = FakeSource::with_catalog(entries());
    source.fail_smart.store(true, Ordering::SeqCst);
    let index = CatalogIndex::new(source, CatalogConfig::default());

    assert_eq!(ids(&index.search("portal", 10).await), vec!["400", "620"]);
    // failures are not cached
    index.search("portal", 10).await;
    assert_eq!(index.source().smart_calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn newer_search_supersedes_older() {
    let mut source = FakeSource::with_catalog(entries());
    source
        .smart_delays
        .insert("portal".into(), Duration::from_secs(5));
    let index = CatalogIndex::new(source, CatalogConfig::default());

    let (old, new) = tokio::join!(index.search_latest("portal", 10), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        index.search_latest("portal 2", 10).await
    });

    assert_eq!(old, None);
    let new = new.unwrap();
    assert_eq!(new[0].id, "620");
}

#[tokio::test(start_paused = true)]
async fn invalidate_forces_refresh() {
    let index = CatalogIndex::new(FakeSource::with_catalog(entries()), local_only());
    index.search("portal", 10).await;
    assert_eq!(index.snapshot_len(), 4);

    index.invalidate();
    assert_eq!(index.snapshot_len(), 0);
    index.search("portal", 10).await;
    assert_eq!(index.source().page_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn snapshot_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    let config = CatalogConfig {
        snapshot_path: Some(path.clone()),
        smart_search: false,
        ..Default::default()
    };

    let first = CatalogIndex::new(FakeSource::with_catalog(entries()), config.clone());
    first.search("portal", 10).await;
    assert!(path.exists());

    let offline = FakeSource::default();
    offline.fail_pages.store(true, Ordering::SeqCst);
    let second = CatalogIndex::new(offline, config);
    assert_eq!(second.search("portal", 10).await.len(), 2);
    assert_eq!(second.source().page_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn stale_snapshot_is_fallback_when_offline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(
        &path,
        r#"{"version": 1, "fetched_at": "2001-01-01T00:00:00Z",
            "entries": [{"id": "400", "name": "Portal"}]}"#,
    )
    .unwrap();

    let offline = FakeSource::default();
    offline.fail_pages.store(true, Ordering::SeqCst);
    let config = CatalogConfig {
        snapshot_path: Some(path),
        smart_search: false,
        ..Default::default()
    };
    let index = CatalogIndex::new(offline, config);

    assert_eq!(ids(&index.search("portal", 10).await), vec!["400"]);
    assert_eq!(index.source().page_calls(), 1);
}
