use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use applist_core::util::mask_secret;
use applist_lib::settings::settings_path;
use applist_lib::{SettingSource, Settings};

/// Show effective settings and their sources.
pub(crate) fn run_config_show() {
    let path = settings_path();
    let (settings, sources) = Settings::load_with_sources();

    log::info!(
        "{}",
        "applist Configuration".if_supports_color(Stdout, |t| t.bold()),
    );
    log::info!("");

    if path.exists() {
        log::info!(
            "  Config file: {} {}",
            path.display().if_supports_color(Stdout, |t| t.cyan()),
            "(exists)".if_supports_color(Stdout, |t| t.green()),
        );
    } else {
        log::info!(
            "  Config file: {} {}",
            path.display().if_supports_color(Stdout, |t| t.cyan()),
            "(not found)".if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    log::info!("");

    let fields: [(&str, &SettingSource, Option<String>); 4] = [
        (
            "steam_api_key",
            &sources.steam_api_key,
            settings.steam_api_key.as_deref().map(mask_secret),
        ),
        (
            "cache_dir",
            &sources.cache_dir,
            Some(settings.cache_dir.display().to_string()),
        ),
        (
            "max_concurrency",
            &sources.max_concurrency,
            Some(settings.max_concurrency.to_string()),
        ),
        (
            "max_results",
            &sources.max_results,
            Some(settings.max_results.to_string()),
        ),
    ];

    for (name, source, value) in fields {
        let source_str = format!("({})", source);
        match value {
            Some(v) => {
                log::info!(
                    "  {} {} {}",
                    format!("{}:", name).if_supports_color(Stdout, |t| t.cyan()),
                    v,
                    source_str.if_supports_color(Stdout, |t| t.dimmed()),
                );
            }
            None => {
                log::info!(
                    "  {} {} {}",
                    format!("{}:", name).if_supports_color(Stdout, |t| t.cyan()),
                    "not set".if_supports_color(Stdout, |t| t.yellow()),
                    source_str.if_supports_color(Stdout, |t| t.dimmed()),
                );
            }
        }
    }
}

/// Print the settings file path.
pub(crate) fn run_config_path() {
    println!("{}", settings_path().display());
}
