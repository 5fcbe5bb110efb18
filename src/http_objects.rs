use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metadata_store::MetadataStoreError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct ApiError {
    status_code: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status_code: StatusCode, message: &str) -> Self {
        Self {
            status_code,
            message: message.to_string(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("API error: {} - {}", self.status_code, self.message);
        (self.status_code, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<MetadataStoreError> for ApiError {
    fn from(e: MetadataStoreError) -> Self {
        match e {
            MetadataStoreError::InvalidIdentifier(_) | MetadataStoreError::InvalidRecord(_) => {
                Self::bad_request(&e.to_string())
            }
            MetadataStoreError::Store(_) => Self::internal_error(&e.to_string()),
        }
    }
}

/// Health body. Always served with a 200; the per-subsystem fields carry
/// the actual state.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub mongodb: String,
    pub s3: String,
}

pub fn subsystem_status(up: bool) -> String {
    if up { "Connected" } else { "Failed" }.to_string()
}
