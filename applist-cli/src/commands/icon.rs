use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use applist_core::ProductRecord;
use applist_core::util::format_bytes_approx;
use applist_lib::{NetLimiter, Settings};

use super::{icon_cache, numeric_ids, product_client};
use crate::error::CliError;
use crate::spinner::spinner;

/// Resolve artwork for each id and print where it was stored.
pub(crate) async fn run_icon(
    settings: &Settings,
    ids: Vec<String>,
    refresh: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let ids: Vec<String> = numeric_ids(&ids).iter().map(|id| id.to_string()).collect();
    if ids.is_empty() {
        return Err(CliError::input("no valid product ids"));
    }

    let limiter = NetLimiter::new(settings.max_concurrency);
    let icons = icon_cache(settings, &limiter)?;
    let products = product_client(&limiter)?;

    if refresh {
        for id in &ids {
            icons.delete_cached_icon(id);
        }
    }

    let pb = spinner(format!("Resolving artwork for {} ids...", ids.len()), quiet);
    let mut records = products.records(&ids).await;
    let records: Vec<ProductRecord> = ids
        .iter()
        .map(|id| {
            records.remove(id).unwrap_or_else(|| {
                ProductRecord::new(
                    id.as_str(),
                    Default::default(),
                    ProductRecord::placeholder_name(id),
                )
            })
        })
        .collect();
    let paths = futures::future::join_all(
        records
            .iter()
            .map(|record| icons.resolve_icon(record, &products)),
    )
    .await;
    pb.finish_and_clear();
    products.stop().await;

    let mut found = 0;
    for (record, path) in records.iter().zip(paths) {
        match path {
            Some(path) => {
                found += 1;
                let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                log::info!(
                    "  {} {} {} ({})",
                    "\u{2714}".if_supports_color(Stdout, |t| t.green()),
                    record.id.if_supports_color(Stdout, |t| t.bold()),
                    path.display().if_supports_color(Stdout, |t| t.cyan()),
                    format_bytes_approx(size),
                );
            }
            None => {
                log::warn!(
                    "  {} {} {}: no artwork found",
                    "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                    record.id.if_supports_color(Stdout, |t| t.bold()),
                    record.name,
                );
            }
        }
    }
    log::info!("");
    log::info!("{} of {} icons available in {}", found, records.len(), icons.dir().display());
    Ok(())
}
