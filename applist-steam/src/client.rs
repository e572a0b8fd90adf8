use tokio::time::Duration;

use applist_core::CatalogEntry;

use crate::catalog::{CatalogPage, CatalogSource};
use crate::error::SteamError;
use crate::icon::ImageFetcher;
use crate::types::{AppListResponse, StoreSearchResponse};

const STORE_SEARCH_URL: &str = "https://store.steampowered.com/api/storesearch/";
const APP_LIST_URL: &str = "https://api.steampowered.com/IStoreService/GetAppList/v1/";
const APP_LIST_PAGE_SIZE: u32 = 50_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the public store endpoints and the image CDNs.
#[derive(Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl StoreClient {
    /// Create a client. Without an API key the full catalog listing is
    /// unavailable and only store search works.
    pub fn new(api_key: Option<String>) -> Result<Self, SteamError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("applist/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Query the store search endpoint.
    pub async fn store_search(&self, term: &str) -> Result<StoreSearchResponse, SteamError> {
        let resp = self
            .http
            .get(STORE_SEARCH_URL)
            .query(&[("term", term), ("l", "english"), ("cc", "US")])
            .send()
            .await?;
        let text = checked_text(resp).await?;
        serde_json::from_str(&text).map_err(|e| {
            SteamError::parse(format!(
                "store search: {e}. Response: {}",
                truncate(&text, 200)
            ))
        })
    }

    /// Fetch one page of the full app listing, starting after `last_appid`.
    pub async fn app_list_page(
        &self,
        last_appid: Option<u64>,
    ) -> Result<AppListResponse, SteamError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SteamError::Config("no Steam Web API key configured".to_string()))?;

        let mut params = vec![
            ("key", key.to_string()),
            ("max_results", APP_LIST_PAGE_SIZE.to_string()),
        ];
        if let Some(last) = last_appid {
            params.push(("last_appid", last.to_string()));
        }

        let resp = self.http.get(APP_LIST_URL).query(&params).send().await?;
        let text = checked_text(resp).await?;
        serde_json::from_str(&text).map_err(|e| {
            SteamError::parse(format!("app list: {e}. Response: {}", truncate(&text, 200)))
        })
    }

    /// Download a file, failing on non-success status or after `timeout`.
    pub async fn download(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, SteamError> {
        let resp = self.http.get(url).timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                SteamError::Timeout(timeout)
            } else {
                SteamError::Network(e)
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SteamError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }
}

impl CatalogSource for StoreClient {
    async fn fetch_page(&self, cursor: Option<u64>) -> Result<CatalogPage, SteamError> {
        let page = self.app_list_page(cursor).await?.response;
        let next_cursor = if page.have_more_results {
            page.last_appid
        } else {
            None
        };
        Ok(CatalogPage {
            entries: page.apps.iter().filter_map(|a| a.to_entry()).collect(),
            next_cursor,
        })
    }

    async fn smart_search(&self, query: &str) -> Result<Vec<CatalogEntry>, SteamError> {
        let resp = self.store_search(query).await?;
        Ok(resp.items.iter().filter_map(|i| i.to_entry()).collect())
    }
}

impl ImageFetcher for StoreClient {
    async fn get_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, SteamError> {
        self.download(url, timeout).await
    }
}

async fn checked_text(resp: reqwest::Response) -> Result<String, SteamError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(SteamError::Status {
            status: status.as_u16(),
            url: resp.url().to_string(),
        });
    }
    Ok(resp.text().await?)
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
