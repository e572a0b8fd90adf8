use std::collections::HashSet;
use std::fs;

use chrono::{DateTime, Local};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use applist_core::util::format_bytes_approx;
use applist_lib::{NetLimiter, Settings};

use super::icon_cache;
use crate::error::CliError;

/// List the catalog snapshot and cached artwork.
pub(crate) fn run_cache_list(settings: &Settings) -> Result<(), CliError> {
    let icons = icon_cache(settings, &NetLimiter::default())?;

    let catalog = settings.catalog_path();
    match fs::metadata(&catalog) {
        Ok(meta) => {
            let modified = meta
                .modified()
                .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            log::info!(
                "{} {} ({}, updated {})",
                "Catalog snapshot:".if_supports_color(Stdout, |t| t.bold()),
                catalog.display().if_supports_color(Stdout, |t| t.cyan()),
                format_bytes_approx(meta.len()),
                modified,
            );
        }
        Err(_) => {
            log::info!(
                "{} {}",
                "Catalog snapshot:".if_supports_color(Stdout, |t| t.bold()),
                "none".if_supports_color(Stdout, |t| t.dimmed()),
            );
        }
    }
    log::info!("");

    let entries = icons.list();
    if entries.is_empty() {
        log::info!(
            "{}",
            "No cached icons.".if_supports_color(Stdout, |t| t.dimmed()),
        );
        log::info!("Run 'applist icon <id>' to download artwork.");
        return Ok(());
    }

    log::info!(
        "{} {}",
        "Cached icons in".if_supports_color(Stdout, |t| t.bold()),
        icons.dir().display().if_supports_color(Stdout, |t| t.cyan()),
    );
    let mut total_size = 0u64;
    for entry in &entries {
        total_size += entry.size;
        let file = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!(
            "  {} {} ({})",
            entry.id.if_supports_color(Stdout, |t| t.bold()),
            file.if_supports_color(Stdout, |t| t.dimmed()),
            format_bytes_approx(entry.size),
        );
    }
    log::info!("");
    log::info!(
        "Total: {} files, {}",
        entries.len(),
        format_bytes_approx(total_size)
    );
    Ok(())
}

/// Delete all cached artwork and the catalog snapshot.
pub(crate) fn run_cache_clear(settings: &Settings) -> Result<(), CliError> {
    let icons = icon_cache(settings, &NetLimiter::default())?;
    let mut freed = icons.clear();

    let catalog = settings.catalog_path();
    if let Ok(meta) = fs::metadata(&catalog) {
        match fs::remove_file(&catalog) {
            Ok(()) => freed += meta.len(),
            Err(e) => log::warn!(
                "{} Could not delete {}: {}",
                "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                catalog.display(),
                e,
            ),
        }
    }

    log::info!(
        "{} Cache cleared ({} freed)",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        format_bytes_approx(freed),
    );
    Ok(())
}

/// Delete artwork for every id not in `keep`.
pub(crate) fn run_cache_prune(settings: &Settings, keep: Vec<String>) -> Result<(), CliError> {
    let icons = icon_cache(settings, &NetLimiter::default())?;
    let keep: HashSet<String> = keep
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();

    let removed = icons.delete_unused_icons(&keep);
    log::info!(
        "{} Removed {} icon{}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        removed,
        if removed == 1 { "" } else { "s" }
    );
    Ok(())
}
