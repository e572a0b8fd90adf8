use serde::Deserialize;

use applist_core::CatalogEntry;

/// Response from the store search endpoint (`/api/storesearch/`).
#[derive(Debug, Deserialize)]
pub struct StoreSearchResponse {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub items: Vec<StoreSearchItem>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSearchItem {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub tiny_image: Option<String>,
}

impl StoreSearchItem {
    pub fn to_entry(&self) -> Option<CatalogEntry> {
        let name = self.name.trim();
        if self.id == 0 || name.is_empty() {
            return None;
        }
        Some(CatalogEntry::new(self.id.to_string(), name))
    }
}

/// Top-level wrapper from `IStoreService/GetAppList`.
#[derive(Debug, Deserialize)]
pub struct AppListResponse {
    #[serde(default)]
    pub response: AppListPage,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppListPage {
    #[serde(default)]
    pub apps: Vec<AppListApp>,
    #[serde(default)]
    pub have_more_results: bool,
    #[serde(default)]
    pub last_appid: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppListApp {
    pub appid: u64,
    #[serde(default)]
    pub name: String,
}

impl AppListApp {
    pub fn to_entry(&self) -> Option<CatalogEntry> {
        let name = self.name.trim();
        if self.appid == 0 || name.is_empty() {
            return None;
        }
        Some(CatalogEntry::new(self.appid.to_string(), name))
    }
}

/// Response from the product-info JSON gateway (`/v1/info/{ids}`).
///
/// `data` maps each id (as a string) to its raw key-value tree.
#[derive(Debug, Deserialize)]
pub struct ProductInfoResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl ProductInfoResponse {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_store_search() {
        let json = r#"{
            "total": 2,
            "items": [
                {"type": "app", "name": "Portal 2", "id": 620, "tiny_image": "https://cdn/x.jpg"},
                {"type": "app", "name": "  ", "id": 5}
            ]
        }"#;
        let resp: StoreSearchResponse = serde_json::from_str(json).unwrap();
        let entries: Vec<_> = resp.items.iter().filter_map(|i| i.to_entry()).collect();
        assert_eq!(entries, vec![CatalogEntry::new("620", "Portal 2")]);
        assert_eq!(resp.items[0].tiny_image.as_deref(), Some("https://cdn/x.jpg"));
    }

    #[test]
    fn parse_app_list_page() {
        let json = r#"{"response": {
            "apps": [{"appid": 10, "name": "Counter-Strike", "last_modified": 1}],
            "have_more_results": true,
            "last_appid": 10
        }}"#;
        let resp: AppListResponse = serde_json::from_str(json).unwrap();
        assert!(resp.response.have_more_results);
        assert_eq!(resp.response.last_appid, Some(10));
        assert_eq!(resp.response.apps[0].to_entry().unwrap().name, "Counter-Strike");
    }

    #[test]
    fn empty_app_list_response() {
        let resp: AppListResponse = serde_json::from_str(r#"{"response": {}}"#).unwrap();
        assert!(resp.response.apps.is_empty());
        assert!(!resp.response.have_more_results);
    }

    #[test]
    fn parse_product_info() {
        let json = r#"{"status": "success", "data": {"440": {"common": {"name": "TF2"}}}}"#;
        let resp: ProductInfoResponse = serde_json::from_str(json).unwrap();
        assert!(resp.is_success());
        assert!(resp.data.contains_key("440"));
    }
}
