/*!
 * HLS playlist inspection.
 *
 * Deleting a film must remove every segment its playlists reference. The
 * playlist itself is the only record of those segments, so deletion reads
 * each variant's `index.m3u8` and recovers the segment storage keys from
 * its entries before removing anything.
 */

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use url::Url;

use crate::asset_store::AssetStore;

/// Recover segment storage keys from a playlist's content.
///
/// Comment and tag lines are skipped. Relative entries resolve against the
/// playlist's own directory; absolute URLs and absolute paths have the
/// leading `/{bucket}/` prefix stripped so the result is a bare storage key.
/// Entries pointing outside the bucket are ignored.
pub fn segment_keys(playlist: &str, manifest_key: &str, bucket: &str) -> Vec<String> {
    let manifest_dir = match manifest_key.rfind('/') {
        Some(pos) => &manifest_key[..pos],
        None => "",
    };
    let bucket_prefix = format!("/{}/", bucket);

    let mut keys = Vec::new();
    for line in playlist.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let key = if let Ok(parsed) = Url::parse(trimmed) {
            // Absolute URL: the path must start with the bucket
            match parsed.path().strip_prefix(&bucket_prefix) {
                Some(rest) => rest.to_string(),
                None => continue,
            }
        } else if let Some(rest) = trimmed.strip_prefix(&bucket_prefix) {
            // Absolute path within the bucket
            rest.to_string()
        } else if manifest_dir.is_empty() {
            trimmed.to_string()
        } else {
            format!("{}/{}", manifest_dir, trimmed)
        };

        keys.push(key);
    }

    debug!("Recovered {} segment keys from '{}'", keys.len(), manifest_key);
    keys
}

/// Resolves a playlist key into the segment keys it references
#[async_trait]
pub trait ManifestResolver: Send + Sync {
    /// Fetch the playlist and return its segment storage keys
    async fn segment_keys_for(&self, manifest_key: &str) -> Result<Vec<String>>;
}

/// Resolver that downloads playlists from their published URLs
pub struct HttpManifestResolver {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
}

impl HttpManifestResolver {
    /// Create a resolver fetching from `{base_url}/{bucket}/{key}`
    pub fn new(base_url: &str, bucket: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ManifestResolver for HttpManifestResolver {
    async fn segment_keys_for(&self, manifest_key: &str) -> Result<Vec<String>> {
        let url = format!("{}/{}/{}", self.base_url, self.bucket, manifest_key);

        let playlist = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch playlist from {}", url))?
            .error_for_status()
            .with_context(|| format!("Playlist request rejected for {}", url))?
            .text()
            .await
            .with_context(|| format!("Failed to read playlist body from {}", url))?;

        Ok(segment_keys(&playlist, manifest_key, &self.bucket))
    }
}

/// Resolver that reads playlists straight from the asset store
pub struct StoreManifestResolver {
    store: Arc<dyn AssetStore>,
    bucket: String,
}

impl StoreManifestResolver {
    /// Create a resolver over the given store
    pub fn new(store: Arc<dyn AssetStore>, bucket: String) -> Self {
        Self { store, bucket }
    }
}

#[async_trait]
impl ManifestResolver for StoreManifestResolver {
    async fn segment_keys_for(&self, manifest_key: &str) -> Result<Vec<String>> {
        let bytes = self
            .store
            .get_bytes(manifest_key)
            .await
            .with_context(|| format!("Failed to fetch playlist '{}'", manifest_key))?;
        let playlist = String::from_utf8(bytes)
            .with_context(|| format!("Playlist '{}' is not valid UTF-8", manifest_key))?;

        Ok(segment_keys(&playlist, manifest_key, &self.bucket))
    }
}
