//! HTTP handlers for the snapshot store.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::StoreError;
use super::state::{parse_expires_in, ReadOutcome, SnapshotMetadata, StoreState, StoredSnapshot};
use crate::codec;

/// Body of `POST /api/upload`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub html: String,
    #[serde(default)]
    pub compressed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<String>,
}

/// Successful upload response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: String,
    pub url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// `POST /api/upload`: store one document, optionally transport-compressed,
/// with an optional time-to-live.
pub async fn upload(
    State(state): State<Arc<StoreState>>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, StoreError> {
    let ceiling = state.config.max_upload_bytes;
    if request.html.len() > ceiling {
        return Err(StoreError::PayloadTooLarge);
    }

    let html = if request.compressed {
        let bytes = codec::decode(&request.html)
            .map_err(|e| StoreError::BadRequest(format!("undecodable payload: {e}")))?;
        let html = codec::decompress(&bytes)
            .map_err(|e| StoreError::BadRequest(format!("decompression failed: {e}")))?;
        // The ceiling also applies to what we would actually store.
        if html.len() > ceiling {
            return Err(StoreError::PayloadTooLarge);
        }
        html
    } else {
        request.html
    };

    let now = Utc::now();
    let expires_at = request
        .expires_in
        .as_deref()
        .and_then(parse_expires_in)
        .map(|ttl| now + ttl);

    let snapshot = StoredSnapshot {
        html,
        content_type: "text/html; charset=utf-8".to_string(),
        metadata: SnapshotMetadata {
            title: request.title,
            source_url: request.source_url,
            created_at: now,
            expires_at,
        },
    };

    let id = state.insert(snapshot);
    let url = format!("{}/{id}", state.config.public_base());
    log::info!("stored snapshot {id} (expires: {expires_at:?})");

    Ok(Json(UploadResponse {
        id,
        url,
        expires_at,
    }))
}

/// `GET /{id}`: serve a stored document with its original content type.
pub async fn fetch_snapshot(
    State(state): State<Arc<StoreState>>,
    Path(id): Path<String>,
) -> Result<Response, StoreError> {
    match state.read(&id) {
        ReadOutcome::Found { html, content_type } => {
            Ok(([(header::CONTENT_TYPE, content_type)], html).into_response())
        }
        ReadOutcome::Missing => Err(StoreError::NotFound),
        ReadOutcome::Expired => Err(StoreError::Gone),
    }
}
