use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{bson::Bson, Client, Collection};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use mongodb::bson::{doc, oid::ObjectId, Document};

/// Record field holding the object-store back-reference.
pub const FILE_REFERENCE_FIELD: &str = "file_reference";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataStoreConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for MetadataStoreConfig {
    fn default() -> Self {
        MetadataStoreConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "federation".to_string(),
            collection: "documents".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MetadataStoreError {
    #[error("invalid document identifier: {0}")]
    InvalidIdentifier(String),
    #[error("metadata must be a JSON object: {0}")]
    InvalidRecord(String),
    #[error("metadata store error: {0}")]
    Store(#[from] mongodb::error::Error),
}

/// Location of a record's blob. Written once at ingestion, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub bucket: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Access seam for the metadata store; the HTTP layer and the ingestion
/// routine only see this trait.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `InvalidIdentifier` if `id` is not a well-formed ObjectId string.
    async fn get_by_id(&self, id: &str) -> Result<Option<Document>, MetadataStoreError>;

    /// Entire collection, materialized. No pagination.
    async fn list_all(&self) -> Result<Vec<Document>, MetadataStoreError>;

    /// Inserts a new record and returns its stringified identifier.
    async fn insert(&self, record: Document) -> Result<String, MetadataStoreError>;

    /// Connectivity probe. Never errors.
    async fn ping(&self) -> bool;
}

#[derive(Clone)]
pub struct MongoDocumentStore {
    client: Client,
    collection: Collection<Document>,
}

impl MongoDocumentStore {
    pub async fn new(config: &MetadataStoreConfig) -> Result<Self, MetadataStoreError> {
        let client = Client::with_uri_str(&config.uri).await?;
        let collection = client
            .database(&config.database)
            .collection(&config.collection);
        Ok(MongoDocumentStore { client, collection })
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Document>, MetadataStoreError> {
        let oid = parse_document_id(id)?;
        let record = self.collection.find_one(doc! { "_id": oid }).await?;
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<Document>, MetadataStoreError> {
        let cursor = self.collection.find(doc! {}).await?;
        let records: Vec<Document> = cursor.try_collect().await?;
        debug!("listed {} documents", records.len());
        Ok(records)
    }

    async fn insert(&self, record: Document) -> Result<String, MetadataStoreError> {
        let result = self.collection.insert_one(record).await?;
        Ok(stringify_id(&result.inserted_id))
    }

    async fn ping(&self) -> bool {
        match self
            .client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!("metadata store ping failed: {:?}", e);
                false
            }
        }
    }
}

/// `InvalidIdentifier` unless `id` parses into the store's native id format.
pub fn parse_document_id(id: &str) -> Result<ObjectId, MetadataStoreError> {
    ObjectId::parse_str(id).map_err(|_| MetadataStoreError::InvalidIdentifier(id.to_string()))
}

/// Serialization boundary for native identifiers: ObjectIds leave the store
/// as plain hex strings, everything else through Display.
pub fn stringify_id(value: &Bson) -> String {
    match value {
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

/// Converts a stored record into a JSON object, coercing every top-level
/// ObjectId value to its string form.
pub fn record_to_json(record: Document) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (field, value) in record {
        let converted = match value {
            Bson::ObjectId(oid) => serde_json::Value::String(oid.to_hex()),
            other => other.into_relaxed_extjson(),
        };
        map.insert(field, converted);
    }
    map
}

/// Inverse boundary for ingestion input. Fails unless `value` is an object.
pub fn json_to_record(value: &serde_json::Value) -> Result<Document, MetadataStoreError> {
    if !value.is_object() {
        return Err(MetadataStoreError::InvalidRecord(
            "expected a JSON object".to_string(),
        ));
    }
    mongodb::bson::to_document(value).map_err(|e| MetadataStoreError::InvalidRecord(e.to_string()))
}

/// The record's File Reference, if it carries a well-formed one. A malformed
/// reference is treated as absent rather than failing the whole record.
pub fn file_reference(record: &Document) -> Option<FileReference> {
    let value = record.get(FILE_REFERENCE_FIELD)?;
    match mongodb::bson::from_bson::<FileReference>(value.clone()) {
        Ok(reference) => Some(reference),
        Err(e) => {
            warn!("malformed file_reference on record, ignoring: {:?}", e);
            None
        }
    }
}

pub fn attach_file_reference(
    record: &mut Document,
    reference: &FileReference,
) -> Result<(), MetadataStoreError> {
    let value = mongodb::bson::to_bson(reference)
        .map_err(|e| MetadataStoreError::InvalidRecord(e.to_string()))?;
    record.insert(FILE_REFERENCE_FIELD, value);
    Ok(())
}
