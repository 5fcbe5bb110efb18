use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use futures::StreamExt;
use object_store::{path::Path, Attribute, Attributes, ObjectStore, WriteMultipart};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod disk;
pub mod s3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskStorageConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    pub s3: Option<S3Config>,
    pub disk: Option<DiskStorageConfig>,
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        let path = std::env::current_dir()
            .map(|d| d.join("federation_storage/blobs"))
            .unwrap_or_else(|_| "federation_storage/blobs".into());
        BlobStorageConfig {
            s3: None,
            disk: Some(DiskStorageConfig {
                path: path.to_string_lossy().to_string(),
            }),
        }
    }
}

/// Binary content reconstructed per request, base64-encoded so it can be
/// embedded in a JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePayload {
    pub content: String,
    pub content_type: String,
    pub size: u64,
    pub last_modified: Option<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("object store error: {0}")]
    Upstream(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct PutResult {
    pub url: String,
    pub size_bytes: u64,
}

/// Read seam for the HTTP layer; lets handler tests stand in a double for
/// the real object store.
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FilePayload, FetchError>;

    /// Connectivity probe. Never errors.
    async fn ping(&self) -> bool;
}

#[derive(Clone)]
pub struct BlobStorage {
    config: BlobStorageConfig,
}

impl BlobStorage {
    pub fn new(config: BlobStorageConfig) -> Self {
        BlobStorage { config }
    }

    pub fn uses_s3(&self) -> bool {
        self.config.s3.is_some()
    }

    /// Bucket used when the caller does not name one.
    pub fn default_bucket(&self) -> &str {
        match &self.config.s3 {
            Some(s3) => s3.bucket.as_str(),
            None => disk::DEFAULT_BUCKET,
        }
    }

    // Clients are bucket-scoped, so one is built per (bucket, call). Both
    // backends are cheap to construct; no caching.
    fn store_for_bucket(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        if let Some(s3) = &self.config.s3 {
            return s3::build_store(bucket, s3);
        }
        let disk = self.config.disk.clone().unwrap_or_else(|| DiskStorageConfig {
            path: "federation_storage/blobs".to_string(),
        });
        disk::build_store(&disk.path, bucket)
    }

    /// Best-effort browsable URL for an uploaded object.
    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        match &self.config.s3 {
            Some(s3) => s3::public_url(bucket, key, &s3.region),
            None => {
                let root = self
                    .config
                    .disk
                    .as_ref()
                    .map(|d| d.path.as_str())
                    .unwrap_or("federation_storage/blobs");
                format!("file://{}/{}/{}", root, bucket, key)
            }
        }
    }

    pub async fn put(
        &self,
        bucket: &str,
        key: &str,
        mut data: impl futures::Stream<Item = Result<Bytes>> + Send + Unpin,
    ) -> Result<PutResult> {
        let store = self.store_for_bucket(bucket)?;
        let path = Path::from(key);
        let m = store.put_multipart(&path).await?;
        let mut w = WriteMultipart::new(m);
        let mut size_bytes = 0;
        while let Some(chunk) = data.next().await {
            w.wait_for_capacity(1).await?;
            let chunk = chunk?;
            size_bytes += chunk.len() as u64;
            w.write(&chunk);
        }
        w.finish().await?;
        Ok(PutResult {
            url: self.public_url(bucket, key),
            size_bytes,
        })
    }

    pub async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let store = self.store_for_bucket(bucket)?;
        store.delete(&Path::from(key)).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobFetcher for BlobStorage {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FilePayload, FetchError> {
        debug!("fetching object: {}/{}", bucket, key);
        let store = self
            .store_for_bucket(bucket)
            .map_err(FetchError::Upstream)?;
        let result = store.get(&Path::from(key)).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => FetchError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            other => FetchError::Upstream(anyhow::anyhow!(
                "can't get object {}/{}: {:?}",
                bucket,
                key,
                other
            )),
        })?;

        let content_type = resolve_content_type(&result.attributes, key);
        let last_modified = Some(result.meta.last_modified.to_rfc3339());
        let bytes = result.bytes().await.map_err(|e| {
            FetchError::Upstream(anyhow::anyhow!(
                "error reading object {}/{}: {:?}",
                bucket,
                key,
                e
            ))
        })?;
        debug!("fetched object: {}/{} ({} bytes)", bucket, key, bytes.len());

        Ok(FilePayload {
            size: bytes.len() as u64,
            content: BASE64_STANDARD.encode(&bytes),
            content_type,
            last_modified,
        })
    }

    async fn ping(&self) -> bool {
        let store = match self.store_for_bucket(self.default_bucket()) {
            Ok(store) => store,
            Err(e) => {
                warn!("object store unreachable: {:?}", e);
                return false;
            }
        };
        // One-entry listing of the default bucket; an empty bucket is healthy.
        match store.list(None).next().await {
            Some(Err(e)) => {
                warn!("object store listing failed: {:?}", e);
                false
            }
            _ => true,
        }
    }
}

/// Content type from store-provided attributes, falling back to an
/// extension-based guess.
fn resolve_content_type(attributes: &Attributes, key: &str) -> String {
    attributes
        .get(&Attribute::ContentType)
        .map(|v| v.to_string())
        .unwrap_or_else(|| {
            mime_guess::from_path(key)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        })
}
