use std::path::Path;

use blob_store::{s3, BlobStorage};
use bytes::Bytes;
use futures::stream;
use metadata_store::{
    attach_file_reference, json_to_record, DocumentStore, FileReference, MetadataStoreError,
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("object store credentials not available")]
    CredentialsMissing,
    #[error("failed to read source file {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("upload failed: {0}")]
    Upload(#[from] anyhow::Error),
    #[error(transparent)]
    Store(#[from] MetadataStoreError),
}

/// One-shot ingestion: upload the file, then write a metadata record
/// carrying the File Reference. The upload happens first so that a failed
/// upload never leaves behind a record pointing at nothing.
pub async fn ingest_file(
    store: &dyn DocumentStore,
    blobs: &BlobStorage,
    file_path: &Path,
    bucket: Option<&str>,
    key: Option<&str>,
    metadata: &serde_json::Value,
) -> Result<String, IngestError> {
    if blobs.uses_s3() && !s3::credentials_present() {
        return Err(IngestError::CredentialsMissing);
    }

    let bucket = bucket.unwrap_or_else(|| blobs.default_bucket());
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let key = object_key_for(key, &file_name);

    let mut record = json_to_record(metadata)?;

    let bytes = tokio::fs::read(file_path)
        .await
        .map_err(|source| IngestError::Source {
            path: file_path.display().to_string(),
            source,
        })?;
    let put = blobs
        .put(bucket, &key, stream::iter(vec![Ok(Bytes::from(bytes))]))
        .await?;
    info!("uploaded {}/{} ({} bytes)", bucket, key, put.size_bytes);

    let reference = FileReference {
        bucket: bucket.to_string(),
        key: key.clone(),
        url: Some(put.url),
    };
    attach_file_reference(&mut record, &reference)?;

    match store.insert(record).await {
        Ok(id) => {
            info!("stored document {} referencing {}/{}", id, bucket, key);
            Ok(id)
        }
        Err(e) => {
            // The blob is already uploaded; try not to leave it orphaned.
            if let Err(del) = blobs.delete(bucket, &key).await {
                warn!(
                    "metadata write failed and uploaded blob {}/{} could not be deleted: {:?}",
                    bucket, key, del
                );
            }
            Err(e.into())
        }
    }
}

/// Supplied key, or `{uuid}_{file_name}` like the uploads this system has
/// always produced.
fn object_key_for(supplied: Option<&str>, file_name: &str) -> String {
    match supplied {
        Some(key) => key.to_string(),
        None => format!("{}_{}", Uuid::new_v4(), file_name),
    }
}
