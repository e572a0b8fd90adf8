//! The wire side of the product-info service.
//!
//! [`ProductInfoTransport`] is the session-oriented protocol the
//! [`ProductInfoClient`](crate::ProductInfoClient) drives: connect, log in
//! anonymously, then query batches of ids for their key-value trees.
//! [`SteamCmdTransport`] implements it over a public JSON gateway.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::time::Duration;

use applist_core::KvNode;

use crate::client::truncate;
use crate::error::SteamError;
use crate::product_info::MAX_IDS_PER_QUERY;
use crate::types::ProductInfoResponse;

pub const STEAMCMD_INFO_URL: &str = "https://api.steamcmd.net/v1/info";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub trait ProductInfoTransport: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<(), SteamError>> + Send;

    fn login_anonymous(&self) -> impl Future<Output = Result<(), SteamError>> + Send;

    /// Raw key-value trees for `ids`. Ids the service has no data for are
    /// simply absent. A dropped session is reported as
    /// [`SteamError::ConnectionLost`].
    fn query(
        &self,
        ids: &[u32],
    ) -> impl Future<Output = Result<HashMap<u32, KvNode>, SteamError>> + Send;

    /// Most ids a single [`query`](Self::query) should carry. The client
    /// never sends larger chunks, and each chunk holds one network permit
    /// for as long as its query runs.
    fn max_batch_size(&self) -> usize {
        MAX_IDS_PER_QUERY
    }

    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}

/// Product info over the steamcmd.net JSON gateway.
///
/// The gateway is plain HTTP, so "connecting" only opens the logical
/// session; transport-level connect failures during a query close it again
/// and surface as `ConnectionLost`.
///
/// The gateway answers one id per request, so batches are one id each and
/// a query for several ids requests them one after another.
pub struct SteamCmdTransport {
    http: reqwest::Client,
    base_url: String,
    connected: AtomicBool,
}

impl SteamCmdTransport {
    pub fn new() -> Result<Self, SteamError> {
        Self::with_base_url(STEAMCMD_INFO_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, SteamError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("applist/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            connected: AtomicBool::new(false),
        })
    }

    async fn query_one(&self, id: u32) -> Result<Option<KvNode>, SteamError> {
        let url = format!("{}/{}", self.base_url, id);
        let resp = self.http.get(&url).send().await.map_err(|e| {
            if e.is_connect() {
                SteamError::connection_lost(e.to_string())
            } else {
                SteamError::Network(e)
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SteamError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let text = resp.text().await?;
        let parsed: ProductInfoResponse = serde_json::from_str(&text).map_err(|e| {
            SteamError::parse(format!("product info {id}: {e}. Response: {}", truncate(&text, 200)))
        })?;
        if !parsed.is_success() {
            log::debug!("Product info for {} returned status '{}'", id, parsed.status);
            return Ok(None);
        }
        Ok(parsed.data.get(&id.to_string()).map(KvNode::from_json))
    }
}

impl ProductInfoTransport for SteamCmdTransport {
    async fn connect(&self) -> Result<(), SteamError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn login_anonymous(&self) -> Result<(), SteamError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SteamError::connection_lost("login before connect"))
        }
    }

    async fn query(&self, ids: &[u32]) -> Result<HashMap<u32, KvNode>, SteamError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SteamError::connection_lost("not connected"));
        }

        let mut found = HashMap::new();
        let mut first_error = None;
        for &id in ids {
            match self.query_one(id).await {
                Ok(Some(node)) => {
                    found.insert(id, node);
                }
                Ok(None) => {}
                Err(e) if e.is_connection_lost() => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(e);
                }
                Err(e) => {
                    log::debug!("Product info request for {} failed: {}", id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        // Only a batch where nothing came back is a failure worth retrying.
        match first_error {
            Some(e) if found.is_empty() => Err(e),
            _ => Ok(found),
        }
    }

    fn max_batch_size(&self) -> usize {
        1
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_requires_connection() {
        let transport = SteamCmdTransport::with_base_url("http://127.0.0.1:9/").unwrap();
        let err = transport.query(&[440]).await.unwrap_err();
        assert!(err.is_connection_lost());

        assert!(transport.login_anonymous().await.is_err());
        transport.connect().await.unwrap();
        assert!(transport.login_anonymous().await.is_ok());
        transport.disconnect().await;
        assert!(transport.query(&[440]).await.is_err());
    }

    #[test]
    fn gateway_batches_hold_one_id() {
        let transport = SteamCmdTransport::new().unwrap();
        assert_eq!(transport.max_batch_size(), 1);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let transport = SteamCmdTransport::with_base_url("https://example.test/v1/info/").unwrap();
        assert_eq!(transport.base_url, "https://example.test/v1/info");
    }
}
