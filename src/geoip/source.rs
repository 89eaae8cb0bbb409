//! Geo range source loading
//!
//! A source is either a local file path or an `http(s)://` URL. Remote
//! sources go through a fixed cache file: a cache younger than the
//! freshness window is used without touching the network, a stale or
//! missing cache triggers a fetch, and a failed fetch falls back to
//! whatever cache exists.

use crate::error::ProxyError;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Fixed cache file for remote sources, relative to the working directory
pub const CACHE_FILE_NAME: &str = "cache_ipranges.txt";

/// Maximum cache age before a refetch is attempted
pub const CACHE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Whether a source string refers to a remote URL
pub fn is_remote_source(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Whether a cache written at `modified` is still fresh at `now`.
///
/// A modification time in the future counts as fresh.
fn is_fresh(modified: SystemTime, now: SystemTime) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age < CACHE_MAX_AGE,
        Err(_) => true,
    }
}

async fn cache_is_fresh(cache_path: &Path) -> bool {
    match tokio::fs::metadata(cache_path).await {
        Ok(meta) => match meta.modified() {
            Ok(modified) => is_fresh(modified, SystemTime::now()),
            Err(_) => false,
        },
        Err(_) => false,
    }
}

async fn fetch_remote(url: &str) -> Result<String, String> {
    let response = reqwest::get(url).await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("unexpected status: {}", response.status()));
    }
    response.text().await.map_err(|e| e.to_string())
}

/// Load the raw text of a geo source.
///
/// Local paths are read directly; URLs use the fixed [`CACHE_FILE_NAME`]
/// cache in the working directory.
pub async fn load_source(source: &str) -> Result<String, ProxyError> {
    if is_remote_source(source) {
        load_url_cached(source, Path::new(CACHE_FILE_NAME)).await
    } else {
        Ok(tokio::fs::read_to_string(source).await?)
    }
}

/// Load a remote source through a cache file.
pub(crate) async fn load_url_cached(url: &str, cache_path: &Path) -> Result<String, ProxyError> {
    if cache_is_fresh(cache_path).await {
        debug!("Using cache file {:?} (within freshness window)", cache_path);
        return Ok(tokio::fs::read_to_string(cache_path).await?);
    }

    info!("Fetching remote geo source: {}", url);
    match fetch_remote(url).await {
        Ok(body) => {
            if let Err(e) = tokio::fs::write(cache_path, &body).await {
                warn!("Failed to write cache file {:?}: {}", cache_path, e);
            } else {
                info!("Cache file {:?} updated", cache_path);
            }
            Ok(body)
        }
        Err(e) => {
            warn!("Remote load failed: {}", e);
            if tokio::fs::metadata(cache_path).await.is_ok() {
                info!("Falling back to existing cache file {:?}", cache_path);
                Ok(tokio::fs::read_to_string(cache_path).await?)
            } else {
                Err(ProxyError::RemoteFetch(format!(
                    "{} unreachable and no cache available: {}",
                    url, e
                )))
            }
        }
    }
}
