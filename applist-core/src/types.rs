use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One `{id, name}` pair from the remote searchable product list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// User-facing product category.
///
/// Upstream type strings are mapped through [`DisplayType::from_upstream`];
/// anything unrecognised is treated as a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayType {
    #[default]
    Game,
    Dlc,
    Demo,
    Mod,
    Video,
    Soundtrack,
    Bundle,
    Episode,
    Software,
}

const ALL_DISPLAY_TYPES: &[DisplayType] = &[
    DisplayType::Game,
    DisplayType::Dlc,
    DisplayType::Demo,
    DisplayType::Mod,
    DisplayType::Video,
    DisplayType::Soundtrack,
    DisplayType::Bundle,
    DisplayType::Episode,
    DisplayType::Software,
];

impl DisplayType {
    /// Map a raw upstream type string (`"game"`, `"dlc"`, `"music"`, ...).
    pub fn from_upstream(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "game" => Self::Game,
            "dlc" => Self::Dlc,
            "demo" => Self::Demo,
            "mod" => Self::Mod,
            "video" => Self::Video,
            "music" => Self::Soundtrack,
            "bundle" => Self::Bundle,
            "episode" => Self::Episode,
            "tool" | "advertising" => Self::Software,
            _ => Self::Game,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Game => "Game",
            Self::Dlc => "DLC",
            Self::Demo => "Demo",
            Self::Mod => "Mod",
            Self::Video => "Video",
            Self::Soundtrack => "Soundtrack",
            Self::Bundle => "Bundle",
            Self::Episode => "Episode",
            Self::Software => "Software",
        }
    }

    pub fn all() -> &'static [DisplayType] {
        ALL_DISPLAY_TYPES
    }
}

impl std::fmt::Display for DisplayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a string is not one of the display labels.
#[derive(Debug, Clone)]
pub struct DisplayTypeParseError(pub String);

impl std::fmt::Display for DisplayTypeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown display type: '{}'", self.0)
    }
}

impl std::error::Error for DisplayTypeParseError {}

impl std::str::FromStr for DisplayType {
    type Err = DisplayTypeParseError;

    /// Parse a display label (`"DLC"`, `"soundtrack"`), case-insensitive.
    ///
    /// Unlike [`DisplayType::from_upstream`] this is strict: unknown labels
    /// are an error rather than a game.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_DISPLAY_TYPES
            .iter()
            .copied()
            .find(|t| t.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DisplayTypeParseError(s.to_string()))
    }
}

/// Normalized per-id metadata from the product-info service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub display_type: DisplayType,
    pub name: String,
    pub parent_id: Option<String>,
    pub client_icon_hash: Option<String>,
    pub hero_image_hash: Option<String>,
    pub main_capsule_hash: Option<String>,
    /// Header image file name relative to the app's CDN folder, e.g. `header.jpg`.
    pub header_image_path: Option<String>,
}

impl ProductRecord {
    /// A record with only an id, type and name; all image hashes unset.
    pub fn new(id: impl Into<String>, display_type: DisplayType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_type,
            name: name.into(),
            parent_id: None,
            client_icon_hash: None,
            hero_image_hash: None,
            main_capsule_hash: None,
            header_image_path: None,
        }
    }

    /// Placeholder name used when an id has no upstream record.
    pub fn placeholder_name(id: &str) -> String {
        format!("App {id}")
    }

    pub fn is_dlc(&self) -> bool {
        self.display_type == DisplayType::Dlc
    }
}

/// Depot and DLC membership for one top-level id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    pub app_id: String,
    pub dlc_ids: BTreeSet<String>,
    /// Depots delivered under the app itself.
    pub depot_ids: BTreeSet<String>,
    /// Depots that belong to a specific DLC of this app.
    pub dlc_depots: BTreeMap<String, BTreeSet<String>>,
}

impl PackageInfo {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    /// True if `depot_id` is one of the app's own depots or any DLC's depot.
    pub fn contains_depot(&self, depot_id: &str) -> bool {
        self.depot_ids.contains(depot_id)
            || self.dlc_depots.values().any(|set| set.contains(depot_id))
    }

    /// Every depot id this package knows about, own and DLC.
    pub fn all_depots(&self) -> impl Iterator<Item = &String> {
        self.depot_ids
            .iter()
            .chain(self.dlc_depots.values().flat_map(|set| set.iter()))
    }
}

/// An item ready to be added to a catalog, with the depots it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedItem {
    pub id: String,
    pub name: String,
    pub display_type: DisplayType,
    #[serde(default)]
    pub depot_ids: Vec<String>,
    #[serde(default)]
    pub icon_path: Option<PathBuf>,
}

impl ResolvedItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, display_type: DisplayType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            display_type,
            depot_ids: Vec::new(),
            icon_path: None,
        }
    }

    /// Append a depot id unless it is already listed. Returns true if added.
    pub fn add_depot(&mut self, depot_id: &str) -> bool {
        if self.depot_ids.iter().any(|d| d == depot_id) {
            return false;
        }
        self.depot_ids.push(depot_id.to_string());
        true
    }
}
