//! Application settings: config file location, env overrides, defaults.
//!
//! The settings file lives at `~/.config/applist/settings.toml`. Every field
//! can be overridden from the environment; the priority is
//! env var > config file > built-in default. A missing or malformed file is
//! not an error, the defaults are used and a warning is logged.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::limiter::DEFAULT_MAX_CONCURRENCY;

pub const ENV_API_KEY: &str = "APPLIST_STEAM_API_KEY";
pub const ENV_API_KEY_FALLBACK: &str = "STEAM_API_KEY";
pub const ENV_CACHE_DIR: &str = "APPLIST_CACHE_DIR";
pub const ENV_MAX_CONCURRENCY: &str = "APPLIST_MAX_CONCURRENCY";

pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Canonical path to the settings file: `~/.config/applist/settings.toml`.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("applist").join("settings.toml")
}

/// Default cache root: `~/.cache/applist`.
pub fn default_cache_dir() -> PathBuf {
    let cache = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    cache.join("applist")
}

/// Effective settings after merging env, file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Web API key for the full catalog listing. Without it only the store
    /// search endpoint is available.
    pub steam_api_key: Option<String>,
    pub cache_dir: PathBuf,
    pub max_concurrency: usize,
    pub max_results: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            steam_api_key: None,
            cache_dir: default_cache_dir(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Where a setting's value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingSource {
    EnvVar(&'static str),
    ConfigFile,
    Default,
    Missing,
}

impl std::fmt::Display for SettingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnvVar(var) => write!(f, "env ${}", var),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
            Self::Missing => write!(f, "not set"),
        }
    }
}

/// Provenance of each setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingSources {
    pub steam_api_key: SettingSource,
    pub cache_dir: SettingSource,
    pub max_concurrency: SettingSource,
    pub max_results: SettingSource,
}

/// TOML file format.
#[derive(Debug, Default, Deserialize, Serialize)]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    steam: Option<SteamSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache: Option<CacheSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    network: Option<NetworkSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    search: Option<SearchSection>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct SteamSection {
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct CacheSection {
    dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct NetworkSection {
    max_concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct SearchSection {
    max_results: Option<usize>,
}

impl Settings {
    /// Load from the canonical settings file and the process environment.
    pub fn load() -> Self {
        Self::load_with_sources().0
    }

    /// Like [`Settings::load`], also reporting where each value came from.
    pub fn load_with_sources() -> (Self, SettingSources) {
        Self::load_from(&settings_path(), |var| std::env::var(var).ok())
    }

    /// Load from an explicit file path with a custom environment lookup.
    pub fn load_from(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> (Self, SettingSources) {
        let file = read_file(path);
        resolve(file, env)
    }

    /// Directory holding cached icons.
    pub fn icon_dir(&self) -> PathBuf {
        self.cache_dir.join("icons")
    }

    /// Path of the persisted catalog snapshot.
    pub fn catalog_path(&self) -> PathBuf {
        self.cache_dir.join("catalog.json")
    }

    /// Write these settings to `path`, atomically (temp file + rename).
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        let file = SettingsFile {
            steam: Some(SteamSection {
                api_key: self.steam_api_key.clone(),
            }),
            cache: Some(CacheSection {
                dir: Some(self.cache_dir.clone()),
            }),
            network: Some(NetworkSection {
                max_concurrency: Some(self.max_concurrency),
            }),
            search: Some(SearchSection {
                max_results: Some(self.max_results),
            }),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string_pretty(&file).map_err(io::Error::other)?;
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, serialized)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn read_file(path: &Path) -> Option<SettingsFile> {
    let contents = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&contents) {
        Ok(file) => Some(file),
        Err(e) => {
            log::warn!("Ignoring malformed settings file {}: {}", path.display(), e);
            None
        }
    }
}

fn resolve(
    file: Option<SettingsFile>,
    env: impl Fn(&str) -> Option<String>,
) -> (Settings, SettingSources) {
    let file = file.unwrap_or_default();
    let non_empty = |var: &'static str| env(var).filter(|v| !v.trim().is_empty());

    let (steam_api_key, key_source) = if let Some(v) = non_empty(ENV_API_KEY) {
        (Some(v), SettingSource::EnvVar(ENV_API_KEY))
    } else if let Some(v) = non_empty(ENV_API_KEY_FALLBACK) {
        (Some(v), SettingSource::EnvVar(ENV_API_KEY_FALLBACK))
    } else if let Some(v) = file
        .steam
        .and_then(|s| s.api_key)
        .filter(|v| !v.trim().is_empty())
    {
        (Some(v), SettingSource::ConfigFile)
    } else {
        (None, SettingSource::Missing)
    };

    let (cache_dir, dir_source) = if let Some(v) = non_empty(ENV_CACHE_DIR) {
        (PathBuf::from(v), SettingSource::EnvVar(ENV_CACHE_DIR))
    } else if let Some(dir) = file.cache.and_then(|c| c.dir) {
        (dir, SettingSource::ConfigFile)
    } else {
        (default_cache_dir(), SettingSource::Default)
    };

    let env_concurrency = non_empty(ENV_MAX_CONCURRENCY).and_then(|v| match v.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("{} is not a number: {:?}", ENV_MAX_CONCURRENCY, v);
            None
        }
    });
    let (max_concurrency, concurrency_source) = if let Some(n) = env_concurrency {
        (n, SettingSource::EnvVar(ENV_MAX_CONCURRENCY))
    } else if let Some(n) = file.network.and_then(|n| n.max_concurrency) {
        (n, SettingSource::ConfigFile)
    } else {
        (DEFAULT_MAX_CONCURRENCY, SettingSource::Default)
    };

    let (max_results, results_source) = match file.search.and_then(|s| s.max_results) {
        Some(n) => (n, SettingSource::ConfigFile),
        None => (DEFAULT_MAX_RESULTS, SettingSource::Default),
    };

    let settings = Settings {
        steam_api_key,
        cache_dir,
        max_concurrency: max_concurrency.max(1),
        max_results: max_results.max(1),
    };
    let sources = SettingSources {
        steam_api_key: key_source,
        cache_dir: dir_source,
        max_concurrency: concurrency_source,
        max_results: results_source,
    };
    (settings, sources)
}
