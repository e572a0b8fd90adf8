//! On-disk cache of product artwork.
//!
//! Icons live in one flat directory as `{id}.{ext}`. Resolving an icon
//! checks the disk first, then walks an ordered list of CDN candidates, and
//! for DLC falls back to the parent product's artwork.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::future::Future;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use tokio::time::{Duration, timeout};

use applist_core::ProductRecord;
use applist_lib::NetLimiter;

use crate::error::SteamError;
use crate::product_info::RecordSource;

/// Cached file extensions, in lookup order.
pub const ICON_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

pub const CDN_MIRRORS: &[&str] = &[
    "https://cdn.cloudflare.steamstatic.com",
    "https://cdn.akamai.steamstatic.com",
    "https://steamcdn-a.akamaihd.net",
];

/// Smaller payloads are error pages or placeholders, not artwork.
const MIN_PAYLOAD_BYTES: usize = 256;
const CLIENT_ICON_MIN_WIDTH: u32 = 32;

/// Fetches raw bytes for a URL.
pub trait ImageFetcher: Send + Sync {
    fn get_bytes(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, SteamError>> + Send;
}

/// One URL to try, with an optional minimum decoded width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconCandidate {
    pub url: String,
    pub min_width: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct IconCacheConfig {
    /// Tries per candidate, including the first.
    pub attempts: u32,
    pub attempt_timeout: Duration,
    pub retry_delay: Duration,
    /// How many parent hops a DLC may take to find artwork.
    pub max_parent_depth: usize,
}

impl Default for IconCacheConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_timeout: Duration::from_secs(15),
            retry_delay: Duration::from_millis(400),
            max_parent_depth: 2,
        }
    }
}

/// A file in the icon cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedIcon {
    pub id: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Candidate URLs for `record`, best first, without duplicates.
pub fn build_candidates(record: &ProductRecord) -> Vec<IconCandidate> {
    let id = &record.id;
    let mut paths: Vec<(String, Option<u32>)> = Vec::new();

    if let Some(hash) = &record.hero_image_hash {
        paths.push((format!("/steam/apps/{id}/{hash}/library_600x900.jpg"), None));
    }
    if let Some(hash) = &record.main_capsule_hash {
        paths.push((format!("/steam/apps/{id}/{hash}/capsule_616x353.jpg"), None));
    }
    if let Some(header) = &record.header_image_path {
        let header = header.trim_start_matches('/');
        paths.push((format!("/steam/apps/{id}/{header}"), None));
    }
    if let Some(hash) = &record.client_icon_hash {
        paths.push((
            format!("/steamcommunity/public/images/apps/{id}/{hash}.jpg"),
            Some(CLIENT_ICON_MIN_WIDTH),
        ));
    }
    paths.push((format!("/steam/apps/{id}/header.jpg"), None));
    paths.push((format!("/steam/apps/{id}/capsule_231x87.jpg"), None));

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for (path, min_width) in paths {
        for mirror in CDN_MIRRORS {
            let url = format!("{mirror}{path}");
            if seen.insert(url.clone()) {
                candidates.push(IconCandidate { url, min_width });
            }
        }
    }
    candidates
}

/// File extension for a downloaded image: sniffed from the bytes, else
/// guessed from the URL.
fn image_extension(bytes: &[u8], url: &str) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => "jpg",
        Ok(image::ImageFormat::Png) => "png",
        Ok(image::ImageFormat::Gif) => "gif",
        Ok(image::ImageFormat::WebP) => "webp",
        _ => {
            let lower = url.to_lowercase();
            if lower.contains(".png") {
                "png"
            } else if lower.contains(".gif") {
                "gif"
            } else if lower.contains(".webp") {
                "webp"
            } else {
                "jpg"
            }
        }
    }
}

fn decoded_width(bytes: &[u8]) -> Option<u32> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
        .map(|(width, _)| width)
}

pub struct IconCache<F> {
    dir: PathBuf,
    fetcher: F,
    limiter: NetLimiter,
    config: IconCacheConfig,
}

impl<F> IconCache<F> {
    pub fn new(dir: impl Into<PathBuf>, fetcher: F, limiter: NetLimiter) -> Self {
        Self::with_config(dir, fetcher, limiter, IconCacheConfig::default())
    }

    pub fn with_config(
        dir: impl Into<PathBuf>,
        fetcher: F,
        limiter: NetLimiter,
        config: IconCacheConfig,
    ) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
            limiter,
            config,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached file for `id`, if a non-empty one exists.
    pub fn cached_path(&self, id: &str) -> Option<PathBuf> {
        if id.is_empty() {
            return None;
        }
        ICON_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{id}.{ext}")))
            .find(|path| fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0))
    }

    /// Remove the cached file for `id`. Returns true if one was deleted.
    pub fn delete_cached_icon(&self, id: &str) -> bool {
        let Some(path) = self.cached_path(id) else {
            return false;
        };
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not delete {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Delete every cached file whose id is not in `valid`. Returns how many
    /// files were removed.
    pub fn delete_unused_icons(&self, valid: &HashSet<String>) -> usize {
        let mut removed = 0;
        for (path, stem) in self.files() {
            if valid.contains(&stem) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Could not delete {}: {}", path.display(), e),
            }
        }
        if removed > 0 {
            log::info!("Removed {} unused icons from {}", removed, self.dir.display());
        }
        removed
    }

    /// Every cached icon, sorted by id.
    pub fn list(&self) -> Vec<CachedIcon> {
        let mut icons: Vec<CachedIcon> = self
            .files()
            .into_iter()
            .filter(|(path, _)| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| ICON_EXTENSIONS.contains(&e))
            })
            .map(|(path, id)| {
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                CachedIcon { id, path, size }
            })
            .collect();
        icons.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.path.cmp(&b.path)));
        icons
    }

    /// Delete every file in the cache. Returns the bytes freed.
    pub fn clear(&self) -> u64 {
        let mut freed = 0;
        for (path, _) in self.files() {
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            if fs::remove_file(&path).is_ok() {
                freed += size;
            }
        }
        freed
    }

    /// `(path, stem)` for every regular file in the cache directory.
    fn files(&self) -> Vec<(PathBuf, String)> {
        let Ok(read_dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        read_dir
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter_map(|p| {
                let stem = p.file_stem()?.to_str()?.to_string();
                Some((p, stem))
            })
            .collect()
    }

    /// Write `bytes` as the icon for `id`, replacing any file atomically.
    fn store(&self, id: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf, SteamError> {
        fs::create_dir_all(&self.dir)?;
        let dest = self.dir.join(format!("{id}.{ext}"));
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(&dest).map_err(|e| e.error)?;
        Ok(dest)
    }

    /// Copy a resolved parent icon under each child id. Returns the copy
    /// for the first child, or `found` itself when there are no children.
    fn share_with_children(&self, found: PathBuf, children: &[String]) -> PathBuf {
        let ext = found
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_string();
        let mut first_copy = None;
        for child in children {
            let copied = fs::read(&found)
                .map_err(SteamError::from)
                .and_then(|bytes| self.store(child, &ext, &bytes));
            match copied {
                Ok(path) => {
                    log::debug!("Icon for {} taken from {}", child, found.display());
                    first_copy.get_or_insert(path);
                }
                Err(e) => log::warn!("Could not copy icon for {}: {}", child, e),
            }
        }
        first_copy.unwrap_or(found)
    }
}

impl<F: ImageFetcher> IconCache<F> {
    /// Local path of the artwork for `record`, downloading it if needed.
    ///
    /// A DLC without usable artwork of its own borrows its parent's (up to
    /// `max_parent_depth` hops), copied under the DLC's id. Returns `None`
    /// when nothing could be found.
    pub async fn resolve_icon<R: RecordSource>(
        &self,
        record: &ProductRecord,
        records: &R,
    ) -> Option<PathBuf> {
        if record.id.is_empty() {
            return None;
        }

        let mut children: Vec<String> = Vec::new();
        let mut current = Cow::Borrowed(record);
        for depth in 0..=self.config.max_parent_depth {
            if let Some(path) = self.cached_path(&current.id) {
                return Some(self.share_with_children(path, &children));
            }
            if let Some(path) = self.download_first(&current).await {
                return Some(self.share_with_children(path, &children));
            }

            if depth == self.config.max_parent_depth || !current.is_dlc() {
                break;
            }
            let Some(parent_id) = current.parent_id.clone() else {
                break;
            };
            children.push(current.id.clone());
            match records.record(&parent_id).await {
                Some(parent) => {
                    log::debug!("No icon for {}, trying parent {}", current.id, parent_id);
                    current = Cow::Owned(parent);
                }
                None => {
                    log::debug!("Parent {} of {} could not be resolved", parent_id, current.id);
                    break;
                }
            }
        }
        log::debug!("No icon found for {}", record.id);
        None
    }

    async fn download_first(&self, record: &ProductRecord) -> Option<PathBuf> {
        for candidate in build_candidates(record) {
            let Some(bytes) = self.fetch_candidate(&candidate).await else {
                continue;
            };
            let ext = image_extension(&bytes, &candidate.url);
            return match self.store(&record.id, ext, &bytes) {
                Ok(path) => {
                    log::debug!("Cached icon for {} from {}", record.id, candidate.url);
                    Some(path)
                }
                Err(e) => {
                    log::warn!("Could not write icon for {}: {}", record.id, e);
                    None
                }
            };
        }
        None
    }

    /// Bytes of `candidate` if it passes validation. Network failures are
    /// retried; client errors and invalid payloads are not.
    async fn fetch_candidate(&self, candidate: &IconCandidate) -> Option<Vec<u8>> {
        let attempts = self.config.attempts.max(1);
        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_delay).await;
            }
            let result = {
                let _permit = self.limiter.acquire().await;
                let limit = self.config.attempt_timeout;
                timeout(limit, self.fetcher.get_bytes(&candidate.url, limit))
                    .await
                    .unwrap_or_else(|_| Err(SteamError::Timeout(limit)))
            };

            match result {
                Ok(bytes) => return self.validate(candidate, bytes),
                Err(SteamError::Status { status, .. }) if (400..500).contains(&status) => {
                    log::debug!("{} returned {}", candidate.url, status);
                    return None;
                }
                Err(e) => {
                    log::debug!(
                        "Fetching {} failed (attempt {}/{}): {}",
                        candidate.url,
                        attempt,
                        attempts,
                        e
                    );
                }
            }
        }
        None
    }

    fn validate(&self, candidate: &IconCandidate, bytes: Vec<u8>) -> Option<Vec<u8>> {
        if bytes.len() < MIN_PAYLOAD_BYTES {
            log::debug!("{}: payload too small ({} bytes)", candidate.url, bytes.len());
            return None;
        }
        if let Some(min_width) = candidate.min_width {
            match decoded_width(&bytes) {
                Some(width) if width >= min_width => {}
                Some(width) => {
                    log::debug!("{}: {}px wide, need {}", candidate.url, width, min_width);
                    return None;
                }
                None => {
                    log::debug!("{}: not a decodable image", candidate.url);
                    return None;
                }
            }
        }
        Some(bytes)
    }
}

#[cfg(test)]
#[path = "tests/icon_tests.rs"]
mod tests;
