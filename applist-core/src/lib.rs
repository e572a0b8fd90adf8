//! Data model shared by the applist crates.
//!
//! Nothing in here performs I/O: the types describe catalog entries,
//! normalized product records, package (depot/DLC) membership and the raw
//! key-value trees the product-info service returns.

pub mod kv;
pub mod types;
pub mod util;

pub use kv::KvNode;
pub use types::{
    CatalogEntry, DisplayType, DisplayTypeParseError, PackageInfo, ProductRecord, ResolvedItem,
};
