//! applist CLI
//!
//! Command-line front end for the Steam catalog pipeline: search the
//! catalog, inspect product metadata, fetch artwork and resolve sets of
//! candidate ids into importable items.

mod commands;
mod error;
mod spinner;

use std::io::Write;

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stderr;

use applist_lib::Settings;

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "applist")]
#[command(about = "Search the Steam catalog and resolve apps, DLC and depots", long_about = None)]
struct Cli {
    /// Show debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fuzzy search the catalog by name
    Search {
        /// Search text (at least two characters)
        query: String,

        /// Maximum number of results (defaults to the configured limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Only search the local catalog snapshot, skip the store search
        #[arg(long)]
        local: bool,

        /// Show match scores
        #[arg(long)]
        scores: bool,
    },

    /// Show product metadata for one or more ids
    Info {
        /// Product ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Also list DLC and depots
        #[arg(long)]
        packages: bool,
    },

    /// Download (or locate cached) artwork for one or more ids
    Icon {
        /// Product ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Discard any cached file and download again
        #[arg(long)]
        refresh: bool,
    },

    /// Resolve candidate ids into items with their depots
    Resolve {
        /// Candidate ids (products, DLC and depots, in any order)
        #[arg(required = true)]
        ids: Vec<String>,

        /// Ids of items that are already owned
        #[arg(long, value_delimiter = ',')]
        owned: Vec<String>,

        /// Also resolve artwork for new items
        #[arg(long)]
        icons: bool,
    },

    /// Manage cached artwork and the catalog snapshot
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached files
    List,
    /// Delete all cached files
    Clear,
    /// Delete cached artwork for ids not in the keep list
    Prune {
        /// Ids whose artwork is kept
        #[arg(long, value_delimiter = ',')]
        keep: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective settings and where each value comes from
    Show,
    /// Print the settings file path
    Path,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli) {
        eprintln!(
            "{} {}",
            "\u{2718}".if_supports_color(Stderr, |t| t.red()),
            e
        );
        std::process::exit(1);
    }
}

/// Route `log` output to the terminal. Info-level messages are the normal
/// command output, so they are printed without any prefix.
fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else if quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("APPLIST_LOG")
        .target(env_logger::Target::Stdout)
        .format(|buf, record| match record.level() {
            log::Level::Info => writeln!(buf, "{}", record.args()),
            level => writeln!(buf, "[{}] {}", level, record.args()),
        })
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => commands::config::run_config_show(),
                ConfigAction::Path => commands::config::run_config_path(),
            }
            Ok(())
        }
        Commands::Cache { action } => {
            let settings = Settings::load();
            match action {
                CacheAction::List => commands::cache::run_cache_list(&settings),
                CacheAction::Clear => commands::cache::run_cache_clear(&settings),
                CacheAction::Prune { keep } => commands::cache::run_cache_prune(&settings, keep),
            }
        }
        command => run_network(command, &Settings::load(), cli.quiet),
    }
}

/// Run a command that talks to the network on a fresh tokio runtime.
fn run_network(command: Commands, settings: &Settings, quiet: bool) -> Result<(), CliError> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| CliError::runtime(e.to_string()))?;

    rt.block_on(async {
        match command {
            Commands::Search {
                query,
                limit,
                local,
                scores,
            } => {
                let limit = limit.unwrap_or(settings.max_results);
                commands::search::run_search(settings, &query, limit, local, scores, quiet).await
            }
            Commands::Info { ids, packages } => {
                commands::info::run_info(settings, ids, packages, quiet).await
            }
            Commands::Icon { ids, refresh } => {
                commands::icon::run_icon(settings, ids, refresh, quiet).await
            }
            Commands::Resolve { ids, owned, icons } => {
                commands::resolve::run_resolve(settings, ids, owned, icons, quiet).await
            }
            Commands::Cache { .. } | Commands::Config { .. } => Ok(()),
        }
    })
}
