use std::collections::{HashMap, HashSet};

use applist_core::{DisplayType, KvNode, ResolvedItem};
use applist_lib::NetLimiter;
use applist_steam::*;
use serde_json::{Value, json};
use tokio::time::Duration;

struct FakeTransport {
    trees: HashMap<u32, KvNode>,
}

impl ProductInfoTransport for FakeTransport {
    async fn connect(&self) -> Result<(), SteamError> {
        Ok(())
    }

    async fn login_anonymous(&self) -> Result<(), SteamError> {
        Ok(())
    }

    async fn query(&self, ids: &[u32]) -> Result<HashMap<u32, KvNode>, SteamError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.trees.get(id).map(|t| (*id, t.clone())))
            .collect())
    }

    async fn disconnect(&self) {}
}

/// Every request 404s; icons only come from disk.
struct NoNetwork;

impl ImageFetcher for NoNetwork {
    async fn get_bytes(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, SteamError> {
        Err(SteamError::Status {
            status: 404,
            url: url.to_string(),
        })
    }
}

struct App {
    id: u32,
    tree: Value,
}

impl App {
    fn new(id: u32, name: &str, kind: &str) -> Self {
        Self {
            id,
            tree: json!({"common": {"name": name, "type": kind}, "depots": {}}),
        }
    }

    fn parent(mut self, parent: u32) -> Self {
        self.tree["common"]["parent"] = json!(parent.to_string());
        self
    }

    fn depots(mut self, depots: &[u32]) -> Self {
        for depot in depots {
            self.tree["depots"][depot.to_string()] = json!({"manifests": {"public": {"gid": "1"}}});
        }
        self
    }

    fn dlc(mut self, dlc: u32, depots: &[u32]) -> Self {
        let list = self.tree["extended"]["listofdlc"]
            .as_str()
            .map(|s| format!("{s},{dlc}"))
            .unwrap_or_else(|| dlc.to_string());
        self.tree["extended"]["listofdlc"] = json!(list);
        for depot in depots {
            self.tree["depots"][depot.to_string()] = json!({
                "manifests": {"public": {"gid": "1"}},
                "dlcappid": dlc.to_string()
            });
        }
        self
    }
}

fn client(apps: Vec<App>) -> ProductInfoClient<FakeTransport> {
    let trees = apps
        .into_iter()
        .map(|app| (app.id, KvNode::from_json(&app.tree)))
        .collect();
    let client = ProductInfoClient::new(
        FakeTransport { trees },
        ProductInfoConfig::default(),
        NetLimiter::default(),
    );
    client.start();
    client
}

fn ids(list: &[&str]) -> HashSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn item<'a>(resolution: &'a ImportResolution, id: &str) -> &'a ResolvedItem {
    resolution
        .items
        .iter()
        .find(|i| i.id == id)
        .unwrap_or_else(|| panic!("no item {id}"))
}

#[tokio::test]
async fn depots_attach_to_their_products() {
    let products = client(vec![
        App::new(10, "Alpha", "game").depots(&[11, 12]),
        App::new(20, "Xray", "game").depots(&[21]),
    ]);
    let resolver = CatalogResolver::new(&products);

    let resolution = resolver
        .resolve_import_set(&ids(&["10", "20", "11", "12", "21"]), &[])
        .await;

    let item_ids: Vec<&str> = resolution.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(item_ids, vec!["10", "20"]);
    assert_eq!(item(&resolution, "10").depot_ids, vec!["11", "12"]);
    assert_eq!(item(&resolution, "20").depot_ids, vec!["21"]);
    assert_eq!(item(&resolution, "10").name, "Alpha");
    assert!(resolution.owned_depots.is_empty());
}

#[tokio::test]
async fn dlc_takes_its_own_depots() {
    let products = client(vec![
        App::new(10, "Alpha", "game").depots(&[11]).dlc(15, &[16]),
        App::new(15, "Alpha Soundtrack", "music").parent(10),
    ]);
    let resolver = CatalogResolver::new(&products);

    let resolution = resolver
        .resolve_import_set(&ids(&["10", "11", "15", "16"]), &[])
        .await;

    assert_eq!(resolution.items.len(), 2);
    assert_eq!(item(&resolution, "10").depot_ids, vec!["11"]);
    let dlc = item(&resolution, "15");
    assert_eq!(dlc.depot_ids, vec!["16"]);
    assert_eq!(dlc.display_type, DisplayType::Soundtrack);
}

#[tokio::test]
async fn depots_of_owned_items_are_reported_separately() {
    let products = client(vec![App::new(30, "Owned", "game").depots(&[31, 32])]);
    let mut owned = ResolvedItem::new("30", "Owned", DisplayType::Game);
    owned.add_depot("31");
    let resolver = CatalogResolver::new(&products);

    let resolution = resolver
        .resolve_import_set(&ids(&["30", "31", "32"]), &[owned])
        .await;

    assert!(resolution.items.is_empty());
    assert_eq!(resolution.owned_depots.len(), 1);
    assert_eq!(resolution.owned_depots["30"], vec!["32"]);
}

/// Known ambiguity: a depot listed by two packages goes to whichever is
/// queried first (lowest id), not necessarily its real owner.
#[tokio::test]
async fn shared_depot_goes_to_first_package() {
    let products = client(vec![
        App::new(10, "Alpha", "game").depots(&[41]),
        App::new(20, "Beta", "game").depots(&[41]),
    ]);
    let resolver = CatalogResolver::new(&products);

    let resolution = resolver
        .resolve_import_set(&ids(&["10", "20", "41"]), &[])
        .await;

    assert_eq!(item(&resolution, "10").depot_ids, vec!["41"]);
    assert!(item(&resolution, "20").depot_ids.is_empty());
}

#[tokio::test]
async fn unknown_ids_get_placeholders() {
    let products = client(vec![]);
    let resolver = CatalogResolver::new(&products);

    let resolution = resolver
        .resolve_import_set(&ids(&["99", "abc", ""]), &[])
        .await;

    assert_eq!(resolution.items.len(), 1);
    let placeholder = &resolution.items[0];
    assert_eq!(placeholder.id, "99");
    assert_eq!(placeholder.name, "App 99");
    assert_eq!(placeholder.display_type, DisplayType::Game);
}

#[tokio::test]
async fn owned_candidates_are_skipped() {
    let products = client(vec![App::new(10, "Alpha", "game")]);
    let owned = ResolvedItem::new("10", "Alpha", DisplayType::Game);
    let resolver = CatalogResolver::new(&products);

    let resolution = resolver.resolve_import_set(&ids(&["10"]), &[owned]).await;
    assert_eq!(resolution, ImportResolution::default());
}

#[tokio::test]
async fn depot_under_unmaterialized_parent_is_dropped() {
    // 20 is listed as a depot of 10, so it is never created as an item,
    // and its own depot 21 has nowhere to go.
    let products = client(vec![
        App::new(10, "Alpha", "game").depots(&[20]),
        App::new(20, "Beta", "game").depots(&[21]),
    ]);
    let resolver = CatalogResolver::new(&products);

    let resolution = resolver
        .resolve_import_set(&ids(&["10", "20", "21"]), &[])
        .await;

    assert_eq!(resolution.items.len(), 1);
    assert_eq!(item(&resolution, "10").depot_ids, vec!["20"]);
    assert!(resolution.owned_depots.is_empty());
}

#[tokio::test]
async fn items_sorted_by_name_ignoring_case() {
    let products = client(vec![
        App::new(10, "zeta", "game"),
        App::new(20, "Alpha", "game"),
        App::new(30, "beta", "game"),
    ]);
    let resolver = CatalogResolver::new(&products);

    let resolution = resolver
        .resolve_import_set(&ids(&["10", "20", "30"]), &[])
        .await;
    let names: Vec<&str> = resolution.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "beta", "zeta"]);
}

#[tokio::test]
async fn icons_resolved_when_cache_attached() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("10.jpg"), b"alpha art").unwrap();
    let icons = IconCache::new(dir.path(), NoNetwork, NetLimiter::default());
    let products = client(vec![
        App::new(10, "Alpha", "game").dlc(15, &[]),
        App::new(15, "Alpha DLC", "dlc").parent(10),
    ]);
    let resolver = CatalogResolver::with_icons(&products, &icons);

    let resolution = resolver.resolve_import_set(&ids(&["10", "15"]), &[]).await;

    assert_eq!(
        item(&resolution, "10").icon_path,
        Some(dir.path().join("10.jpg"))
    );
    assert_eq!(
        item(&resolution, "15").icon_path,
        Some(dir.path().join("15.jpg"))
    );
    assert_eq!(std::fs::read(dir.path().join("15.jpg")).unwrap(), b"alpha art");
}
