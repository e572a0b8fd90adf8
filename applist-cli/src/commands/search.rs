use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use applist_lib::Settings;
use applist_steam::catalog::MIN_QUERY_CHARS;
use applist_steam::{CatalogConfig, CatalogIndex, StoreClient};

use crate::error::CliError;
use crate::spinner::spinner;

/// Search the catalog and print ranked matches.
pub(crate) async fn run_search(
    settings: &Settings,
    query: &str,
    limit: usize,
    local: bool,
    show_scores: bool,
    quiet: bool,
) -> Result<(), CliError> {
    if query.trim().chars().count() < MIN_QUERY_CHARS {
        return Err(CliError::input(format!(
            "search text must be at least {} characters",
            MIN_QUERY_CHARS
        )));
    }

    let client = StoreClient::new(settings.steam_api_key.clone())?;
    if !client.has_api_key() {
        log::debug!("No API key configured, the full catalog listing is unavailable");
    }
    let config = CatalogConfig {
        snapshot_path: Some(settings.catalog_path()),
        smart_search: !local,
        ..Default::default()
    };
    let index = CatalogIndex::new(client, config);

    let pb = spinner(format!("Searching for \"{}\"...", query.trim()), quiet);
    let results = index.search_scored(query, limit).await;
    pb.finish_and_clear();

    if results.is_empty() {
        log::info!(
            "{}",
            format!("No matches for \"{}\".", query.trim())
                .if_supports_color(Stdout, |t| t.dimmed()),
        );
        if local && index.snapshot_len() == 0 {
            log::info!("The local catalog is empty; set a Steam API key or drop --local.");
        }
        return Ok(());
    }

    let id_width = results.iter().map(|r| r.entry.id.len()).max().unwrap_or(0);
    for result in &results {
        if show_scores {
            log::info!(
                "  {:>5}  {:>width$}  {}",
                result.score.if_supports_color(Stdout, |t| t.dimmed()),
                result.entry.id.if_supports_color(Stdout, |t| t.cyan()),
                result.entry.name,
                width = id_width,
            );
        } else {
            log::info!(
                "  {:>width$}  {}",
                result.entry.id.if_supports_color(Stdout, |t| t.cyan()),
                result.entry.name,
                width = id_width,
            );
        }
    }
    log::info!("");
    log::info!(
        "{} result{}",
        results.len(),
        if results.len() == 1 { "" } else { "s" }
    );
    Ok(())
}
