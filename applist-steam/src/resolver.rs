//! Turn a flat set of candidate ids into importable items.
//!
//! Candidates mix top-level products, DLC and depots. Depots are never
//! imported on their own: each one is attached to the product that ships
//! it, or reported against an already-owned product.

use std::collections::{BTreeMap, HashMap, HashSet};

use applist_core::{ProductRecord, ResolvedItem};

use crate::client::StoreClient;
use crate::icon::{IconCache, ImageFetcher};
use crate::product_info::ProductInfoClient;
use crate::transport::ProductInfoTransport;

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResolution {
    /// New items, sorted by name (case-insensitive) then id.
    pub items: Vec<ResolvedItem>,
    /// Depots to append to items the caller already owns, keyed by owner id.
    pub owned_depots: BTreeMap<String, Vec<String>>,
}

pub struct CatalogResolver<'a, T: ProductInfoTransport, F = StoreClient> {
    products: &'a ProductInfoClient<T>,
    icons: Option<&'a IconCache<F>>,
}

impl<'a, T: ProductInfoTransport> CatalogResolver<'a, T, StoreClient> {
    /// A resolver that does not fetch icons.
    pub fn new(products: &'a ProductInfoClient<T>) -> Self {
        Self {
            products,
            icons: None,
        }
    }
}

impl<'a, T: ProductInfoTransport, F: ImageFetcher> CatalogResolver<'a, T, F> {
    /// A resolver that also resolves an icon for every new item.
    pub fn with_icons(products: &'a ProductInfoClient<T>, icons: &'a IconCache<F>) -> Self {
        Self {
            products,
            icons: Some(icons),
        }
    }

    pub async fn resolve_import_set(
        &self,
        candidates: &HashSet<String>,
        owned: &[ResolvedItem],
    ) -> ImportResolution {
        let owned_ids: HashSet<&str> = owned.iter().map(|item| item.id.as_str()).collect();
        let owned_depot_ids: HashSet<&str> = owned
            .iter()
            .flat_map(|item| item.depot_ids.iter().map(String::as_str))
            .collect();

        // Numeric order keeps every later "first match" deterministic.
        let mut remaining: Vec<(u32, &str)> = candidates
            .iter()
            .map(|id| id.as_str())
            .filter(|id| !owned_ids.contains(id) && !owned_depot_ids.contains(id))
            .filter_map(|id| match id.parse::<u32>() {
                Ok(n) if n > 0 => Some((n, id)),
                _ => {
                    log::debug!("Skipping non-numeric candidate '{}'", id);
                    None
                }
            })
            .collect();
        remaining.sort_unstable();
        remaining.dedup();
        if remaining.is_empty() {
            return ImportResolution::default();
        }

        // Ids ending in 0 are usually products rather than depots. Owned
        // products are queried too so their depots can be recognized.
        let mut query: Vec<u32> = remaining
            .iter()
            .filter(|(_, id)| id.ends_with('0'))
            .map(|(n, _)| *n)
            .collect();
        query.extend(owned.iter().filter_map(|item| item.id.parse::<u32>().ok()));
        let packages = self.products.fetch_package_infos(&query).await;

        let known_depots: HashSet<&str> = packages
            .iter()
            .flat_map(|p| p.all_depots())
            .map(String::as_str)
            .collect();
        let (depots, to_create): (Vec<&str>, Vec<&str>) = remaining
            .iter()
            .map(|(_, id)| *id)
            .partition(|id| known_depots.contains(id));
        log::debug!(
            "Resolving {} candidates: {} packages, {} new items, {} depots",
            remaining.len(),
            packages.len(),
            to_create.len(),
            depots.len()
        );

        let mut items = self.materialize(&to_create).await;
        let candidate_depots: HashSet<&str> = depots.iter().copied().collect();

        // DLC items take the depots their parent package lists for them.
        let mut assigned: HashSet<String> = HashSet::new();
        for item in &mut items {
            let Some(dlc_depots) = packages.iter().find_map(|p| p.dlc_depots.get(&item.id)) else {
                continue;
            };
            for depot in dlc_depots {
                if candidate_depots.contains(depot.as_str()) {
                    item.add_depot(depot);
                    assigned.insert(depot.clone());
                }
            }
        }

        // Every other depot goes to the first package that lists it.
        let index: HashMap<String, usize> = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.clone(), i))
            .collect();
        let mut owned_depots: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for depot in depots {
            if assigned.contains(depot) {
                continue;
            }
            let Some(parent) = packages.iter().find(|p| p.contains_depot(depot)) else {
                continue;
            };
            if let Some(&i) = index.get(&parent.app_id) {
                items[i].add_depot(depot);
            } else if owned_ids.contains(parent.app_id.as_str()) {
                let list = owned_depots.entry(parent.app_id.clone()).or_default();
                if !list.iter().any(|d| d == depot) {
                    list.push(depot.to_string());
                }
            } else {
                log::debug!(
                    "Dropping depot {}: parent {} is neither new nor owned",
                    depot,
                    parent.app_id
                );
            }
        }

        items.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        ImportResolution {
            items,
            owned_depots,
        }
    }

    /// Build items for `ids` from product records (placeholders for ids
    /// without one), resolving icons when a cache is attached.
    async fn materialize(&self, ids: &[&str]) -> Vec<ResolvedItem> {
        let wanted: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let mut found = self.products.records(&wanted).await;
        let records: Vec<ProductRecord> = wanted
            .into_iter()
            .map(|id| {
                found.remove(&id).unwrap_or_else(|| {
                    log::debug!("No product record for {}, using placeholder", id);
                    let name = ProductRecord::placeholder_name(&id);
                    ProductRecord::new(id, Default::default(), name)
                })
            })
            .collect();

        let icon_paths = match self.icons {
            Some(icons) => {
                futures::future::join_all(
                    records
                        .iter()
                        .map(|record| icons.resolve_icon(record, self.products)),
                )
                .await
            }
            None => vec![None; records.len()],
        };

        records
            .into_iter()
            .zip(icon_paths)
            .map(|(record, icon_path)| {
                let mut item = ResolvedItem::new(record.id, record.name, record.display_type);
                item.icon_path = icon_path;
                item
            })
            .collect()
    }
}
