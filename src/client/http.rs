//! HTTP client for the relay endpoints

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;

use super::SendError;
use crate::upload::{RegisterRequest, UploadMetadata, CHUNK_HASH_HEADER};

/// Client bound to one receiver
#[derive(Clone)]
pub struct UploadClient {
    base_url: String,
    client: reqwest::Client,
}

impl UploadClient {
    /// Create a client for `http://host:port` with a per-request timeout
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, SendError> {
        Self::with_base_url(&format!("http://{}:{}", host, port), timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SendError::Http {
                stage: "client setup",
                source: e,
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /register_file
    pub async fn register(&self, request: &RegisterRequest) -> Result<UploadMetadata, SendError> {
        let url = format!("{}/register_file", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| SendError::Http {
                stage: "registration",
                source: e,
            })?;

        let response = check_status("registration", response).await?;

        let metadata: UploadMetadata = response
            .json()
            .await
            .map_err(|e| SendError::InvalidResponse(e.to_string()))?;

        if metadata.chunk_size == 0 || metadata.chunk_size > request.file_size {
            return Err(SendError::InvalidResponse(format!(
                "chunk size {} for a {} byte file",
                metadata.chunk_size, request.file_size
            )));
        }

        Ok(metadata)
    }

    /// POST /upload_chunk/:id/:sequence
    pub async fn send_chunk(
        &self,
        upload_id: &str,
        sequence: u64,
        payload: Vec<u8>,
        hash: &str,
    ) -> Result<(), SendError> {
        let url = format!("{}/upload_chunk/{}/{}", self.base_url, upload_id, sequence);
        tracing::debug!(url = %url, bytes = payload.len(), "Sending chunk");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CHUNK_HASH_HEADER, hash)
            .body(payload)
            .send()
            .await
            .map_err(|e| SendError::Http {
                stage: "chunk upload",
                source: e,
            })?;

        check_status("chunk upload", response).await?;
        Ok(())
    }

    /// GET /complete_upload/:id
    pub async fn complete(&self, upload_id: &str) -> Result<(), SendError> {
        let url = format!("{}/complete_upload/{}", self.base_url, upload_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SendError::Http {
                stage: "completion",
                source: e,
            })?;

        check_status("completion", response).await?;
        Ok(())
    }
}

async fn check_status(
    stage: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, SendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(stage = stage, status = status.as_u16(), body = %body, "Server returned non-OK status");
    Err(SendError::Rejected {
        stage,
        status: status.as_u16(),
        body,
    })
}
