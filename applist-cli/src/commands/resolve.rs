use std::collections::HashSet;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use applist_core::{DisplayType, ProductRecord, ResolvedItem};
use applist_lib::{NetLimiter, Settings};
use applist_steam::{CatalogResolver, ImportResolution};

use super::{icon_cache, product_client};
use crate::error::CliError;
use crate::spinner::spinner;

/// Resolve `ids` into importable items and print the outcome.
pub(crate) async fn run_resolve(
    settings: &Settings,
    ids: Vec<String>,
    owned: Vec<String>,
    with_icons: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let candidates: HashSet<String> = ids.into_iter().map(|id| id.trim().to_string()).collect();
    // Owned items are only known by id here; their depots are reported back.
    let owned: Vec<ResolvedItem> = owned
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(|id| {
            let name = ProductRecord::placeholder_name(&id);
            ResolvedItem::new(id, name, DisplayType::Game)
        })
        .collect();

    let limiter = NetLimiter::new(settings.max_concurrency);
    let products = product_client(&limiter)?;

    let pb = spinner(format!("Resolving {} candidates...", candidates.len()), quiet);
    let resolution = if with_icons {
        let icons = icon_cache(settings, &limiter)?;
        CatalogResolver::with_icons(&products, &icons)
            .resolve_import_set(&candidates, &owned)
            .await
    } else {
        CatalogResolver::new(&products)
            .resolve_import_set(&candidates, &owned)
            .await
    };
    pb.finish_and_clear();
    products.stop().await;

    print_resolution(&resolution);
    Ok(())
}

fn print_resolution(resolution: &ImportResolution) {
    if resolution.items.is_empty() && resolution.owned_depots.is_empty() {
        log::info!(
            "{}",
            "Nothing new to import.".if_supports_color(Stdout, |t| t.dimmed()),
        );
        return;
    }

    if !resolution.items.is_empty() {
        log::info!("{}", "New items:".if_supports_color(Stdout, |t| t.bold()));
        for item in &resolution.items {
            log::info!(
                "  {} {} [{}]",
                item.id.if_supports_color(Stdout, |t| t.cyan()),
                item.name,
                item.display_type,
            );
            if !item.depot_ids.is_empty() {
                log::info!(
                    "    {} {}",
                    "Depots:".if_supports_color(Stdout, |t| t.dimmed()),
                    item.depot_ids.join(", ")
                );
            }
            if let Some(path) = &item.icon_path {
                log::info!(
                    "    {} {}",
                    "Icon:".if_supports_color(Stdout, |t| t.dimmed()),
                    path.display()
                );
            }
        }
    }

    if !resolution.owned_depots.is_empty() {
        if !resolution.items.is_empty() {
            log::info!("");
        }
        log::info!(
            "{}",
            "Depots for owned items:".if_supports_color(Stdout, |t| t.bold()),
        );
        for (owner, depots) in &resolution.owned_depots {
            log::info!(
                "  {} {}",
                owner.if_supports_color(Stdout, |t| t.cyan()),
                depots.join(", ")
            );
        }
    }
}
