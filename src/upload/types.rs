//! Upload types for the chunk relay protocol

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Smallest randomly chosen chunk size: 100KB
pub const MIN_CHUNK_SIZE: u64 = 100 * 1024;

/// Largest randomly chosen chunk size: 4MB
pub const MAX_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Upload lease: 24 hours
pub const UPLOAD_EXPIRY_HOURS: i64 = 24;

/// Header carrying the hex digest of a chunk body
pub const CHUNK_HASH_HEADER: &str = "Chunk-Hash";

/// Prefix of reassembled files, keeps them apart from a source in the same directory
pub const FINAL_FILE_PREFIX: &str = "final_";

// ============================================================================
// Registration Types
// ============================================================================

/// Request to register a file before any chunk is sent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Original file name
    pub file_name: String,

    /// Total file size in bytes
    pub file_size: u64,

    /// SHA-256 hash of the complete file
    pub file_hash: String,
}

/// Identity and shape of one file transfer.
///
/// Also the body of the registration response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_hash: String,
    /// Fixed at registration
    pub chunk_size: u64,
    /// Fixed at registration
    pub total_chunks: u64,
}

// ============================================================================
// Session Types
// ============================================================================

/// Server-side state of a registered upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub metadata: UploadMetadata,

    pub status: UploadStatus,

    pub created_at: DateTime<Utc>,

    /// Lease end; the reaper may drop the upload after this instant
    pub expires_at: DateTime<Utc>,
}

impl UploadSession {
    /// Wrap freshly registered metadata with a lease of `lease_hours`
    pub fn new(metadata: UploadMetadata, lease_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            metadata,
            status: UploadStatus::Pending,
            created_at: now,
            expires_at: now + chrono::Duration::hours(lease_hours),
        }
    }

    /// Check if the lease has run out
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Upload status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Registered, accepting chunks
    Pending,
    /// A completion request is folding chunks
    Assembling,
    /// File assembled, verified and recorded in the ledger
    Completed,
}

// ============================================================================
// Ledger Types
// ============================================================================

/// Durable evidence that a transfer finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    #[serde(flatten)]
    pub metadata: UploadMetadata,

    pub completed_at: DateTime<Utc>,

    /// Path of the reassembled file
    pub stored_as: String,
}

// ============================================================================
// Error Types
// ============================================================================

/// Upload error types
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Chunk hash is missing")]
    MissingChunkHash,

    #[error("Invalid chunk sequence number: {0}")]
    InvalidSequence(String),

    #[error("Invalid upload id: {0}")]
    InvalidUploadId(String),

    #[error("Upload not found: {0}")]
    UploadNotFound(String),

    #[error("File metadata not found: {0}")]
    MetadataNotFound(String),

    #[error("Completion already in progress: {0}")]
    CompletionInProgress(String),

    #[error("Chunk hash mismatch: expected {expected}, got {actual}")]
    ChunkHashMismatch { expected: String, actual: String },

    #[error("Missing chunk {sequence} of {total}")]
    MissingChunk { sequence: u64, total: u64 },

    #[error("Final hash mismatch: expected {expected}, got {actual}")]
    FinalHashMismatch { expected: String, actual: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Ledger error: {0}")]
    LedgerError(String),
}

impl UploadError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MissingChunkHash => StatusCode::BAD_REQUEST,
            Self::InvalidSequence(_) => StatusCode::BAD_REQUEST,
            Self::InvalidUploadId(_) => StatusCode::BAD_REQUEST,
            Self::UploadNotFound(_) => StatusCode::NOT_FOUND,
            Self::MetadataNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CompletionInProgress(_) => StatusCode::CONFLICT,
            Self::ChunkHashMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingChunk { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::FinalHashMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::LedgerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::MissingChunkHash => "MISSING_CHUNK_HASH",
            Self::InvalidSequence(_) => "INVALID_SEQUENCE",
            Self::InvalidUploadId(_) => "INVALID_UPLOAD_ID",
            Self::UploadNotFound(_) => "UPLOAD_NOT_FOUND",
            Self::MetadataNotFound(_) => "METADATA_NOT_FOUND",
            Self::CompletionInProgress(_) => "COMPLETION_IN_PROGRESS",
            Self::ChunkHashMismatch { .. } => "CHUNK_HASH_MISMATCH",
            Self::MissingChunk { .. } => "MISSING_CHUNK",
            Self::FinalHashMismatch { .. } => "FINAL_HASH_MISMATCH",
            Self::StorageError(_) => "STORAGE_ERROR",
            Self::LedgerError(_) => "LEDGER_ERROR",
        }
    }

    pub(crate) fn storage(e: impl std::fmt::Display) -> Self {
        Self::StorageError(e.to_string())
    }
}
