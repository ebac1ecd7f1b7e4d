/*!
 * Object storage for film assets.
 *
 * Posters, HLS segments and playlists all live in a single S3-compatible
 * bucket. The [`AssetStore`] trait is the seam the pipeline works against;
 * [`S3AssetStore`] is the production implementation (AWS S3 or MinIO via a
 * custom endpoint), and [`MemoryAssetStore`] backs the tests.
 */

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use log::{debug, warn};
use std::path::Path;

use crate::app_config::StorageConfig;
use crate::errors::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Content type served for a storage key, derived from its extension
pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("mp4") => "video/mp4",
        Some("srt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Interface to the object store holding all film assets.
///
/// Keys never carry a leading slash; the bucket is fixed per store.
/// Deletes are idempotent: removing a missing key is not an error.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Store raw bytes under a key with the given content type, returning
    /// the key
    async fn put_bytes(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> StorageResult<String>;

    /// Store a local file under a key, deriving the content type from the
    /// key's extension
    async fn put_file(&self, key: &str, path: &Path) -> StorageResult<String>;

    /// Retrieve an object as bytes
    async fn get_bytes(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Delete a single object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Public URL of an object, as served to playback clients
    fn object_url(&self, key: &str) -> String;
}

/// S3-compatible asset store
pub struct S3AssetStore {
    client: Client,
    bucket: String,
    endpoint: String,
}

impl S3AssetStore {
    /// Build a client from the storage configuration.
    ///
    /// A custom endpoint switches the client into path-style addressing,
    /// which MinIO requires.
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "kinolingo",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .behavior_version_latest()
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn put_bytes(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        debug!("Uploading {} bytes to '{}' ({})", data.len(), key, content_type);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::PutFailed {
                key: key.to_string(),
                detail: e.to_string(),
            })?;

        Ok(key.to_string())
    }

    async fn put_file(&self, key: &str, path: &Path) -> StorageResult<String> {
        let data = tokio::fs::read(path).await.map_err(|e| StorageError::PutFailed {
            key: key.to_string(),
            detail: format!("failed to read {:?}: {}", path, e),
        })?;
        self.put_bytes(key, data, content_type_for(key)).await
    }

    async fn get_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::GetFailed {
                        key: key.to_string(),
                        detail: e.to_string(),
                    }
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::GetFailed {
                key: key.to_string(),
                detail: e.to_string(),
            })?;

        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting object '{}'", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed {
                key: key.to_string(),
                detail: e.to_string(),
            })?;

        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        // Path-style: endpoint/bucket/key
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

/// In-memory asset store for tests.
///
/// Records every put and delete so tests can assert on the exact set of
/// storage operations a pipeline run performed, and can be told to fail
/// deletion of specific keys.
pub struct MemoryAssetStore {
    objects: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
    deleted_keys: std::sync::Mutex<Vec<String>>,
    fail_delete_keys: std::sync::Mutex<Vec<String>>,
    bucket: String,
}

impl Default for MemoryAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAssetStore {
    /// Create an empty store with the default test bucket
    pub fn new() -> Self {
        Self {
            objects: std::sync::Mutex::new(std::collections::HashMap::new()),
            deleted_keys: std::sync::Mutex::new(Vec::new()),
            fail_delete_keys: std::sync::Mutex::new(Vec::new()),
            bucket: "kinolingo-test".to_string(),
        }
    }

    /// Make subsequent deletes of this key fail
    pub fn fail_delete_of(&self, key: &str) {
        self.fail_delete_keys.lock().unwrap().push(key.to_string());
    }

    /// Keys currently present in the store, sorted
    pub fn stored_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// All keys for which delete was attempted, in order
    pub fn delete_attempts(&self) -> Vec<String> {
        self.deleted_keys.lock().unwrap().clone()
    }

    /// Whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    /// Seed an object directly (for delete-path tests)
    pub fn insert(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), data);
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn put_bytes(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(key.to_string())
    }

    async fn put_file(&self, key: &str, path: &Path) -> StorageResult<String> {
        let data = tokio::fs::read(path).await.map_err(|e| StorageError::PutFailed {
            key: key.to_string(),
            detail: format!("failed to read {:?}: {}", path, e),
        })?;
        self.put_bytes(key, data, content_type_for(key)).await
    }

    async fn get_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.deleted_keys.lock().unwrap().push(key.to_string());

        if self.fail_delete_keys.lock().unwrap().iter().any(|k| k == key) {
            warn!("Simulated delete failure for '{}'", key);
            return Err(StorageError::DeleteFailed {
                key: key.to_string(),
                detail: "simulated failure".to_string(),
            });
        }

        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("http://memory.test/{}/{}", self.bucket, key)
    }
}
