use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Path, Request, State},
    http::Method,
    routing::get,
    Json, Router,
};
use blob_store::BlobFetcher;
use metadata_store::{file_reference, record_to_json, DocumentStore};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::http_objects::{subsystem_status, ApiError, HealthStatus};

#[derive(Clone)]
pub struct RouteState {
    pub document_store: Arc<dyn DocumentStore>,
    pub blob_fetcher: Arc<dyn BlobFetcher>,
}

pub fn create_routes(route_state: RouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/documents",
            get(list_documents).with_state(route_state.clone()),
        )
        .route(
            "/api/documents/{id}",
            get(get_document).with_state(route_state.clone()),
        )
        .route(
            "/api/documents/{id}/file",
            get(get_document_file).with_state(route_state.clone()),
        )
        .route("/health", get(health).with_state(route_state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri();

                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::debug_span!("request", %method, %uri, matched_path)
                })
                .on_failure(()),
        )
        .layer(cors)
}

/// Get a document and, when it references one, its stored file.
///
/// Metadata availability and blob availability are independent: a record
/// whose blob cannot be fetched is still served with a 200 and a
/// `file_error` marker instead of `file_data`.
async fn get_document(
    Path(document_id): Path<String>,
    State(state): State<RouteState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    info!("retrieving document: {}", document_id);
    let record = state.document_store.get_by_id(&document_id).await?;
    let Some(record) = record else {
        warn!("document not found: {}", document_id);
        return Err(ApiError::not_found("Document not found"));
    };

    let reference = file_reference(&record);
    let mut body = record_to_json(record);
    if let Some(reference) = reference {
        match state
            .blob_fetcher
            .fetch(&reference.bucket, &reference.key)
            .await
        {
            Ok(payload) => {
                let payload = serde_json::to_value(payload)
                    .map_err(|e| ApiError::internal_error(&e.to_string()))?;
                body.insert("file_data".to_string(), payload);
            }
            Err(e) => {
                warn!(
                    "retrieved document {} but could not get associated file: {:?}",
                    document_id, e
                );
                body.insert(
                    "file_error".to_string(),
                    serde_json::Value::String("Could not retrieve associated file".to_string()),
                );
            }
        }
    }
    Ok(Json(serde_json::Value::Object(body)))
}

/// List every document. File contents are never attached here; a listing
/// must not fan out into one blob fetch per record.
async fn list_documents(
    State(state): State<RouteState>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let records = state.document_store.list_all().await?;
    info!("retrieved {} documents", records.len());
    let records = records
        .into_iter()
        .map(|record| serde_json::Value::Object(record_to_json(record)))
        .collect();
    Ok(Json(records))
}

/// Get only the file associated with a document. Unlike `get_document`
/// there is no metadata to fall back to, so a failed fetch is a 500.
async fn get_document_file(
    Path(document_id): Path<String>,
    State(state): State<RouteState>,
) -> Result<Json<blob_store::FilePayload>, ApiError> {
    info!("retrieving file for document: {}", document_id);
    let record = state.document_store.get_by_id(&document_id).await?;
    let Some(record) = record else {
        warn!("document not found: {}", document_id);
        return Err(ApiError::not_found("Document not found"));
    };

    let Some(reference) = file_reference(&record) else {
        warn!("document has no associated file: {}", document_id);
        return Err(ApiError::not_found(
            "Document does not have an associated file",
        ));
    };

    let payload = state
        .blob_fetcher
        .fetch(&reference.bucket, &reference.key)
        .await
        .map_err(|e| {
            warn!(
                "could not retrieve file for document {}: {:?}",
                document_id, e
            );
            ApiError::internal_error("Could not retrieve file")
        })?;
    Ok(Json(payload))
}

/// Probes both subsystems independently; neither failure affects the other
/// or the 200 status.
async fn health(State(state): State<RouteState>) -> Json<HealthStatus> {
    let mongodb = state.document_store.ping().await;
    let s3 = state.blob_fetcher.ping().await;
    Json(HealthStatus {
        status: "healthy".to_string(),
        mongodb: subsystem_status(mongodb),
        s3: subsystem_status(s3),
    })
}
