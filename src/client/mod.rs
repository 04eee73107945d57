//! Sender side of the chunk relay protocol
//!
//! [`UploadClient`] issues the three protocol requests; [`Sender`] drives a
//! whole file through them one chunk at a time.

pub mod http;
pub mod sender;

pub use http::UploadClient;
pub use sender::{ChunkReader, OutgoingChunk, Sender, TransferReport};

/// Sender error types
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("File is empty: {0}")]
    EmptyFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request failed during {stage}: {source}")]
    Http {
        stage: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server rejected {stage} with status {status}: {body}")]
    Rejected {
        stage: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid registration response: {0}")]
    InvalidResponse(String),

    #[error("File changed during transfer: sent {sent} chunks, expected {expected}")]
    ChunkCountMismatch { sent: u64, expected: u64 },
}
