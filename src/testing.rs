use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use base64::prelude::*;
use blob_store::{BlobFetcher, FetchError, FilePayload};
use metadata_store::{
    parse_document_id, Document, DocumentStore, MetadataStoreError, ObjectId,
};

/// Deterministic ObjectId for tests.
pub fn oid(n: u8) -> ObjectId {
    let mut bytes = [0u8; 12];
    bytes[11] = n;
    ObjectId::from_bytes(bytes)
}

/// In-memory stand-in for the MongoDB-backed store.
#[derive(Default)]
pub struct FakeDocumentStore {
    records: Mutex<HashMap<String, Document>>,
    fail: bool,
    down: bool,
}

impl FakeDocumentStore {
    pub fn with_record(self, id: ObjectId, record: Document) -> Self {
        self.records
            .lock()
            .unwrap()
            .insert(id.to_hex(), record);
        self
    }

    /// Every read and write fails with a store error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.down = true;
        self
    }

    pub fn inserted(&self) -> Vec<Document> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    fn store_error() -> MetadataStoreError {
        MetadataStoreError::Store(mongodb::error::Error::custom("store unavailable"))
    }
}

#[async_trait]
impl DocumentStore for FakeDocumentStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Document>, MetadataStoreError> {
        let id = parse_document_id(id)?;
        if self.fail {
            return Err(Self::store_error());
        }
        Ok(self.records.lock().unwrap().get(&id.to_hex()).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Document>, MetadataStoreError> {
        if self.fail {
            return Err(Self::store_error());
        }
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn insert(&self, record: Document) -> Result<String, MetadataStoreError> {
        if self.fail {
            return Err(Self::store_error());
        }
        let id = ObjectId::new();
        self.records.lock().unwrap().insert(id.to_hex(), record);
        Ok(id.to_hex())
    }

    async fn ping(&self) -> bool {
        !self.down
    }
}

/// In-memory stand-in for the object store; objects keyed by bucket/key.
#[derive(Default)]
pub struct FakeBlobFetcher {
    objects: HashMap<String, Vec<u8>>,
    down: bool,
}

impl FakeBlobFetcher {
    pub fn with_object(mut self, bucket: &str, key: &str, bytes: &[u8]) -> Self {
        self.objects
            .insert(format!("{}/{}", bucket, key), bytes.to_vec());
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.down = true;
        self
    }
}

#[async_trait]
impl BlobFetcher for FakeBlobFetcher {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FilePayload, FetchError> {
        if self.down {
            return Err(FetchError::Upstream(anyhow::anyhow!("object store offline")));
        }
        let bytes = self
            .objects
            .get(&format!("{}/{}", bucket, key))
            .ok_or_else(|| FetchError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        Ok(FilePayload {
            content: BASE64_STANDARD.encode(bytes),
            content_type: mime_type_of(key),
            size: bytes.len() as u64,
            last_modified: None,
        })
    }

    async fn ping(&self) -> bool {
        !self.down
    }
}

fn mime_type_of(key: &str) -> String {
    if key.ends_with(".txt") {
        "text/plain".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}
