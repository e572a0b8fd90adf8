//! Catalog pipeline for Steam products.
//!
//! - [`CatalogIndex`]: fuzzy search over the full catalog plus store search
//! - [`ProductInfoClient`]: session-managed, batched product metadata lookups
//! - [`IconCache`]: on-disk artwork cache with DLC-to-parent fallback
//! - [`CatalogResolver`]: turns candidate ids into items with their depots
//!
//! Network access goes through small traits ([`CatalogSource`],
//! [`ProductInfoTransport`], [`ImageFetcher`]) so every component can run
//! against in-memory fakes.

pub mod catalog;
pub mod client;
pub mod error;
pub mod icon;
pub mod product_info;
pub mod resolver;
pub mod score;
pub mod transport;
pub mod types;

pub use catalog::{CatalogConfig, CatalogIndex, CatalogPage, CatalogSource};
pub use client::StoreClient;
pub use error::{ErrorKind, SteamError};
pub use icon::{CachedIcon, IconCache, IconCacheConfig, IconCandidate, ImageFetcher};
pub use product_info::{
    ProductInfoClient, ProductInfoConfig, RecordSource, SessionState, parse_package_info,
    parse_record,
};
pub use resolver::{CatalogResolver, ImportResolution};
pub use score::ScoredEntry;
pub use transport::{ProductInfoTransport, SteamCmdTransport};
