pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod icon;
pub(crate) mod info;
pub(crate) mod resolve;
pub(crate) mod search;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use applist_lib::{NetLimiter, Settings};
use applist_steam::{
    IconCache, ProductInfoClient, ProductInfoConfig, SteamCmdTransport, StoreClient,
};

use crate::error::CliError;

/// Product-info client with its session task already started.
pub(crate) fn product_client(
    limiter: &NetLimiter,
) -> Result<ProductInfoClient<SteamCmdTransport>, CliError> {
    let transport = SteamCmdTransport::new()?;
    let client = ProductInfoClient::new(transport, ProductInfoConfig::default(), limiter.clone());
    client.start();
    Ok(client)
}

/// Icon cache rooted at the configured cache directory.
pub(crate) fn icon_cache(
    settings: &Settings,
    limiter: &NetLimiter,
) -> Result<IconCache<StoreClient>, CliError> {
    let store = StoreClient::new(settings.steam_api_key.clone())?;
    Ok(IconCache::new(settings.icon_dir(), store, limiter.clone()))
}

/// Split `ids` into numeric product ids, warning about the rest.
pub(crate) fn numeric_ids(ids: &[String]) -> Vec<u32> {
    ids.iter()
        .filter_map(|id| match id.trim().parse::<u32>() {
            Ok(n) if n > 0 => Some(n),
            _ => {
                log::warn!(
                    "  {} Ignoring invalid id '{}'",
                    "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                    id,
                );
                None
            }
        })
        .collect()
}
