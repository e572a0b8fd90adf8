use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use applist_core::{PackageInfo, ProductRecord};
use applist_lib::{NetLimiter, Settings};

use super::{numeric_ids, product_client};
use crate::error::CliError;
use crate::spinner::spinner;

/// Print product metadata (and optionally package membership) for `ids`.
pub(crate) async fn run_info(
    settings: &Settings,
    ids: Vec<String>,
    packages: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let ids = numeric_ids(&ids);
    if ids.is_empty() {
        return Err(CliError::input("no valid product ids"));
    }

    let limiter = NetLimiter::new(settings.max_concurrency);
    let client = product_client(&limiter)?;

    let pb = spinner(format!("Fetching {} product records...", ids.len()), quiet);
    let records = client.fetch_batch(&ids).await;
    let package_infos = if packages {
        pb.set_message("Fetching package info...");
        client.fetch_package_infos(&ids).await
    } else {
        Vec::new()
    };
    pb.finish_and_clear();
    client.stop().await;

    for id in &ids {
        match records.get(id) {
            Some(record) => {
                print_record(record);
                let key = id.to_string();
                if let Some(info) = package_infos.iter().find(|p| p.app_id == key) {
                    print_package(info);
                }
            }
            None => {
                log::warn!(
                    "  {} {}: no product info",
                    "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                    id.if_supports_color(Stdout, |t| t.bold()),
                );
            }
        }
        log::info!("");
    }
    Ok(())
}

fn print_record(record: &ProductRecord) {
    log::info!(
        "{} {} [{}]",
        record.id.if_supports_color(Stdout, |t| t.cyan()),
        record.name.if_supports_color(Stdout, |t| t.bold()),
        record.display_type,
    );
    let fields = [
        ("Parent", record.parent_id.as_deref()),
        ("Client icon", record.client_icon_hash.as_deref()),
        ("Hero image", record.hero_image_hash.as_deref()),
        ("Main capsule", record.main_capsule_hash.as_deref()),
        ("Header image", record.header_image_path.as_deref()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            log::info!(
                "  {} {}",
                format!("{}:", label).if_supports_color(Stdout, |t| t.dimmed()),
                value
            );
        }
    }
}

fn print_package(info: &PackageInfo) {
    if !info.depot_ids.is_empty() {
        let depots: Vec<&str> = info.depot_ids.iter().map(String::as_str).collect();
        log::info!(
            "  {} {}",
            "Depots:".if_supports_color(Stdout, |t| t.dimmed()),
            depots.join(", ")
        );
    }
    for dlc in &info.dlc_ids {
        match info.dlc_depots.get(dlc) {
            Some(depots) if !depots.is_empty() => {
                let depots: Vec<&str> = depots.iter().map(String::as_str).collect();
                log::info!(
                    "  {} {} (depots {})",
                    "DLC:".if_supports_color(Stdout, |t| t.dimmed()),
                    dlc,
                    depots.join(", ")
                );
            }
            _ => log::info!("  {} {}", "DLC:".if_supports_color(Stdout, |t| t.dimmed()), dlc),
        }
    }
}
