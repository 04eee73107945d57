//! Upload Routes
//!
//! HTTP endpoints for the chunk relay protocol.
//!
//! Endpoints:
//! - POST /register_file - Register a file, get its id and chunk plan
//! - POST /upload_chunk/:id/:sequence - Upload one chunk (raw body, `Chunk-Hash` header)
//! - GET /complete_upload/:id - Reassemble and verify the file
//! - GET /upload_status/:id - Inspect an upload

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;
use crate::upload::{
    validate_upload_id, RegisterRequest, UploadError, UploadMetadata, UploadStatus,
    CHUNK_HASH_HEADER,
};

// ============================================================================
// Error Response
// ============================================================================

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for UploadError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        } else {
            tracing::warn!(code = self.code(), "{}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the upload router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register_file", post(register_file))
        .route("/upload_chunk/:upload_id/:sequence", post(upload_chunk))
        .route("/complete_upload/:upload_id", get(complete_upload))
        .route("/upload_status/:upload_id", get(upload_status))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /register_file
///
/// Register a file. Returns its id together with the fixed chunk plan.
async fn register_file(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<UploadMetadata>, UploadError> {
    let Json(request) = payload.map_err(|e| UploadError::InvalidRequest(e.body_text()))?;

    let metadata = state.registry().register(&request).await?;
    Ok(Json(metadata))
}

/// POST /upload_chunk/:upload_id/:sequence
///
/// Upload a single chunk. The chunk data is the raw request body, streamed
/// to disk and verified against the `Chunk-Hash` header.
async fn upload_chunk(
    State(state): State<AppState>,
    Path((upload_id, sequence)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, UploadError> {
    validate_upload_id(&upload_id)?;

    let claimed_hash = headers
        .get(CHUNK_HASH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(UploadError::MissingChunkHash)?
        .to_string();

    let sequence = parse_sequence(&sequence)?;

    let receipt = state
        .chunk_store()
        .receive_chunk(&upload_id, sequence, body.into_data_stream(), &claimed_hash)
        .await?;

    tracing::debug!(
        upload_id = %upload_id,
        sequence = receipt.sequence,
        bytes = receipt.bytes,
        "Chunk uploaded"
    );

    Ok(StatusCode::OK)
}

/// GET /complete_upload/:upload_id
///
/// Assemble chunks, verify the whole-file hash and record the completion.
async fn complete_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> Result<StatusCode, UploadError> {
    state.assembler().complete(&upload_id).await?;
    Ok(StatusCode::OK)
}

/// GET /upload_status/:upload_id
///
/// Get the registered plan and which chunks are stored.
async fn upload_status(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> Result<Json<UploadStatusResponse>, UploadError> {
    validate_upload_id(&upload_id)?;

    let session = state
        .registry()
        .get(&upload_id)
        .await
        .map_err(|_| UploadError::UploadNotFound(upload_id.clone()))?;

    let received_chunks = state.chunk_store().stored_sequences(&upload_id).await?;
    let missing_chunks = (1..=session.metadata.total_chunks)
        .filter(|seq| received_chunks.binary_search(seq).is_err())
        .collect();

    Ok(Json(UploadStatusResponse {
        metadata: session.metadata,
        status: session.status,
        received_chunks,
        missing_chunks,
        expires_at: session.expires_at,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadStatusResponse {
    #[serde(flatten)]
    metadata: UploadMetadata,
    status: UploadStatus,
    received_chunks: Vec<u64>,
    missing_chunks: Vec<u64>,
    expires_at: DateTime<Utc>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Sequence numbers are 1-indexed
fn parse_sequence(raw: &str) -> Result<u64, UploadError> {
    match raw.parse::<u64>() {
        Ok(sequence) if sequence >= 1 => Ok(sequence),
        _ => Err(UploadError::InvalidSequence(raw.to_string())),
    }
}
