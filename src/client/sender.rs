//! Sender orchestration
//!
//! hash file → register → send chunks in order → complete

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::{SendError, UploadClient};
use crate::upload::{compute_hash, hash_reader, RegisterRequest};

/// One chunk read from the source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingChunk {
    /// 1-indexed
    pub sequence: u64,
    pub data: Vec<u8>,
    pub hash: String,
}

/// Reads a file in fixed-size chunks with SHA-256 checksums.
pub struct ChunkReader {
    file: File,
    chunk_size: usize,
    next_sequence: u64,
}

impl ChunkReader {
    /// Rewinds `file` and prepares to read `chunk_size` pieces
    pub async fn new(mut file: File, chunk_size: u64) -> Result<Self, SendError> {
        let chunk_size = usize::try_from(chunk_size)
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| SendError::InvalidResponse(format!("unusable chunk size {}", chunk_size)))?;

        file.seek(std::io::SeekFrom::Start(0)).await?;

        Ok(Self {
            file,
            chunk_size,
            next_sequence: 1,
        })
    }

    /// Reads the next chunk. Returns `None` at EOF.
    ///
    /// Short reads are filled up so every chunk but the last is exactly
    /// `chunk_size` bytes.
    pub async fn next_chunk(&mut self) -> Result<Option<OutgoingChunk>, SendError> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);

        let chunk = OutgoingChunk {
            sequence: self.next_sequence,
            hash: compute_hash(&buf),
            data: buf,
        };
        self.next_sequence += 1;
        Ok(Some(chunk))
    }
}

/// Summary of a finished transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub upload_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_hash: String,
    pub chunk_size: u64,
    pub total_chunks: u64,
}

/// Drives one file through the protocol, strictly sequentially
pub struct Sender {
    client: UploadClient,
    chunk_retries: u32,
}

impl Sender {
    pub fn new(client: UploadClient) -> Self {
        Self {
            client,
            chunk_retries: 0,
        }
    }

    /// Re-send a failed chunk up to `retries` times before aborting
    pub fn with_chunk_retries(mut self, retries: u32) -> Self {
        self.chunk_retries = retries;
        self
    }

    /// Transfer the file at `path`
    pub async fn send_file(&self, path: &Path) -> Result<TransferReport, SendError> {
        let mut file = File::open(path).await?;
        let file_size = file.metadata().await?.len();
        if file_size == 0 {
            return Err(SendError::EmptyFile(path.display().to_string()));
        }

        let file_hash = hash_reader(&mut file).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        let metadata = self
            .client
            .register(&RegisterRequest {
                file_name: file_name.clone(),
                file_size,
                file_hash: file_hash.clone(),
            })
            .await?;

        tracing::info!(
            upload_id = %metadata.id,
            file_name = %file_name,
            file_size = file_size,
            chunk_size = metadata.chunk_size,
            total_chunks = metadata.total_chunks,
            "File registered"
        );

        let mut reader = ChunkReader::new(file, metadata.chunk_size).await?;
        let mut sent = 0u64;
        while let Some(chunk) = reader.next_chunk().await? {
            tracing::info!(
                upload_id = %metadata.id,
                sequence = chunk.sequence,
                hash = %chunk.hash,
                "Sending chunk"
            );
            self.send_chunk(&metadata.id, chunk).await?;
            sent += 1;
        }

        if sent != metadata.total_chunks {
            return Err(SendError::ChunkCountMismatch {
                sent,
                expected: metadata.total_chunks,
            });
        }

        self.client.complete(&metadata.id).await?;

        tracing::info!(upload_id = %metadata.id, "File upload completed successfully");

        Ok(TransferReport {
            upload_id: metadata.id,
            file_name,
            file_size,
            file_hash,
            chunk_size: metadata.chunk_size,
            total_chunks: metadata.total_chunks,
        })
    }

    async fn send_chunk(&self, upload_id: &str, mut chunk: OutgoingChunk) -> Result<(), SendError> {
        let mut attempt = 0;
        loop {
            let payload = if attempt < self.chunk_retries {
                chunk.data.clone()
            } else {
                std::mem::take(&mut chunk.data)
            };

            match self
                .client
                .send_chunk(upload_id, chunk.sequence, payload, &chunk.hash)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.chunk_retries => {
                    attempt += 1;
                    tracing::warn!(
                        upload_id = %upload_id,
                        sequence = chunk.sequence,
                        attempt = attempt,
                        error = %e,
                        "Chunk upload failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn reader_for(data: &[u8], chunk_size: u64) -> (TempDir, ChunkReader) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("source.bin");
        tokio::fs::write(&path, data).await.unwrap();

        let mut file = File::open(&path).await.unwrap();
        // Leave the cursor at EOF the way the whole-file hash does
        hash_reader(&mut file).await.unwrap();

        let reader = ChunkReader::new(file, chunk_size).await.unwrap();
        (temp_dir, reader)
    }

    #[tokio::test]
    async fn test_reader_splits_ten_bytes_by_four() {
        let (_dir, mut reader) = reader_for(b"0123456789", 4).await;

        let mut chunks = Vec::new();
        while let Some(chunk) = reader.next_chunk().await.unwrap() {
            chunks.push(chunk);
        }

        let lens: Vec<usize> = chunks.iter().map(|c| c.data.len()).collect();
        assert_eq!(lens, vec![4, 4, 2]);
        let sequences: Vec<u64> = chunks.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(chunks[2].data, b"89");
        assert_eq!(chunks[0].hash, compute_hash(b"0123"));
    }

    #[tokio::test]
    async fn test_reader_concatenation_reproduces_file() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 256) as u8).collect();
        let (_dir, mut reader) = reader_for(&data, 333).await;

        let mut joined = Vec::new();
        while let Some(chunk) = reader.next_chunk().await.unwrap() {
            joined.extend_from_slice(&chunk.data);
        }
        assert_eq!(compute_hash(&joined), compute_hash(&data));
    }

    #[tokio::test]
    async fn test_empty_file_rejected_before_network() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.bin");
        tokio::fs::write(&path, b"").await.unwrap();

        // Nothing listens on port 9 of the test host; a request would fail differently
        let client = UploadClient::new("127.0.0.1", 9, Duration::from_secs(1)).unwrap();
        let result = Sender::new(client).send_file(&path).await;

        assert!(matches!(result, Err(SendError::EmptyFile(_))));
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("source.bin");
        tokio::fs::write(&path, b"abc").await.unwrap();
        let file = File::open(&path).await.unwrap();

        assert!(matches!(
            ChunkReader::new(file, 0).await,
            Err(SendError::InvalidResponse(_))
        ));
    }
}
