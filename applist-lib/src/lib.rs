//! Runtime plumbing shared by the applist pipeline.
//!
//! - [`ResultCache`]: single-flight, TTL-bounded result cache
//! - [`NetLimiter`]: process-wide cap on simultaneous network operations
//! - [`Supersede`]: latest-call-wins runner for interactive searches
//! - [`settings`]: config file, env overrides and cache locations

pub mod limiter;
pub mod result_cache;
pub mod settings;
pub mod supersede;

pub use limiter::NetLimiter;
pub use result_cache::{CacheEntry, ResultCache};
pub use settings::{SettingSource, SettingSources, Settings};
pub use supersede::Supersede;
