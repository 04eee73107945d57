//! Chunk Store
//!
//! Filesystem storage for received chunks until reassembly.
//! Layout: `<base>/<upload id>/<sequence:08>.part`

use std::path::{Path, PathBuf};

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::hasher::StreamHasher;
use super::types::UploadError;

const CHUNK_EXTENSION: &str = "part";

/// Outcome of a verified chunk write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReceipt {
    pub sequence: u64,
    pub bytes: u64,
    pub hash: String,
}

/// Local filesystem chunk storage
#[derive(Debug, Clone)]
pub struct ChunkStore {
    base_path: PathBuf,
}

impl ChunkStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn upload_dir(&self, upload_id: &str) -> PathBuf {
        self.base_path.join(upload_id)
    }

    /// Storage unit of one chunk
    pub fn chunk_path(&self, upload_id: &str, sequence: u64) -> PathBuf {
        self.upload_dir(upload_id)
            .join(format!("{:08}.{}", sequence, CHUNK_EXTENSION))
    }

    // ========================================================================
    // Receive
    // ========================================================================

    /// Stream a chunk body to disk while hashing it.
    ///
    /// The bytes land in a temporary file that only replaces the chunk's
    /// storage unit once the digest matches `claimed_hash`.
    pub async fn receive_chunk<S, E>(
        &self,
        upload_id: &str,
        sequence: u64,
        body: S,
        claimed_hash: &str,
    ) -> Result<ChunkReceipt, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        validate_upload_id(upload_id)?;
        if sequence == 0 {
            return Err(UploadError::InvalidSequence("0".to_string()));
        }

        let dir = self.upload_dir(upload_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(UploadError::storage)?;

        let final_path = self.chunk_path(upload_id, sequence);
        let temp_path = dir.join(format!("{:08}.{}.tmp", sequence, Uuid::new_v4().simple()));

        let mut temp = TempChunk::new(temp_path);
        let (bytes, actual) = write_hashed(temp.path(), body).await?;

        if !actual.eq_ignore_ascii_case(claimed_hash) {
            tracing::warn!(
                upload_id = %upload_id,
                sequence = sequence,
                claimed = %claimed_hash,
                actual = %actual,
                "Chunk hash mismatch, chunk discarded"
            );
            return Err(UploadError::ChunkHashMismatch {
                expected: claimed_hash.to_string(),
                actual,
            });
        }

        tokio::fs::rename(temp.path(), &final_path)
            .await
            .map_err(UploadError::storage)?;
        temp.persisted();

        tracing::debug!(
            upload_id = %upload_id,
            sequence = sequence,
            bytes = bytes,
            "Chunk stored"
        );

        Ok(ChunkReceipt {
            sequence,
            bytes,
            hash: actual,
        })
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Check if a chunk is stored
    pub async fn chunk_exists(&self, upload_id: &str, sequence: u64) -> bool {
        tokio::fs::try_exists(self.chunk_path(upload_id, sequence))
            .await
            .unwrap_or(false)
    }

    /// Open a stored chunk, `None` when absent
    pub async fn open_chunk(
        &self,
        upload_id: &str,
        sequence: u64,
    ) -> Result<Option<tokio::fs::File>, UploadError> {
        match tokio::fs::File::open(self.chunk_path(upload_id, sequence)).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(UploadError::storage(e)),
        }
    }

    /// Sorted sequence numbers stored for an upload
    pub async fn stored_sequences(&self, upload_id: &str) -> Result<Vec<u64>, UploadError> {
        let mut sequences = Vec::new();
        let mut entries = match tokio::fs::read_dir(self.upload_dir(upload_id)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sequences),
            Err(e) => return Err(UploadError::storage(e)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(UploadError::storage)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CHUNK_EXTENSION) {
                continue;
            }
            if let Some(seq) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                sequences.push(seq);
            }
        }

        sequences.sort_unstable();
        Ok(sequences)
    }

    /// Upload ids that currently own chunk storage
    pub async fn stored_upload_ids(&self) -> Result<Vec<String>, UploadError> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(UploadError::storage(e)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(UploadError::storage)? {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }

        Ok(ids)
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Delete all storage of an upload.
    ///
    /// Returns the number of files removed.
    pub async fn delete_upload(&self, upload_id: &str) -> Result<usize, UploadError> {
        validate_upload_id(upload_id)?;
        let dir = self.upload_dir(upload_id);

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(UploadError::storage(e)),
        };

        let mut count = 0;
        while let Some(entry) = entries.next_entry().await.map_err(UploadError::storage)? {
            tokio::fs::remove_file(entry.path())
                .await
                .map_err(UploadError::storage)?;
            count += 1;
        }

        // Remove empty directory
        let _ = tokio::fs::remove_dir(&dir).await;

        Ok(count)
    }
}

/// Temporary chunk file, removed on drop unless it was renamed into place.
///
/// Covers handlers dropped mid-stream (request timeout, client disconnect).
struct TempChunk {
    path: PathBuf,
    persisted: bool,
}

impl TempChunk {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            persisted: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn persisted(&mut self) {
        self.persisted = true;
    }
}

impl Drop for TempChunk {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

async fn write_hashed<S, E>(path: &Path, mut body: S) -> Result<(u64, String), UploadError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(UploadError::storage)?;
    let mut hasher = StreamHasher::new();

    while let Some(piece) = body.next().await {
        let piece = piece.map_err(|e| UploadError::StorageError(format!("body read failed: {}", e)))?;
        hasher.update(&piece);
        file.write_all(&piece).await.map_err(UploadError::storage)?;
    }

    file.flush().await.map_err(UploadError::storage)?;
    file.sync_data().await.map_err(UploadError::storage)?;

    let bytes = hasher.bytes_hashed();
    Ok((bytes, hasher.finalize()))
}

/// Upload ids become directory names; only plain tokens are accepted
pub fn validate_upload_id(upload_id: &str) -> Result<(), UploadError> {
    let valid = !upload_id.is_empty()
        && upload_id.len() <= 128
        && upload_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(UploadError::InvalidUploadId(upload_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::hasher::compute_hash;
    use tempfile::TempDir;

    fn body_of(pieces: &[&'static str]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        futures::stream::iter(
            pieces
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_receive_chunk() {
        let temp_dir = TempDir::new().unwrap();
        let store = ChunkStore::new(temp_dir.path().to_path_buf());
        let hash = compute_hash(b"test chunk data");

        let receipt = store
            .receive_chunk("up1", 1, body_of(&["test ", "chunk ", "data"]), &hash)
            .await
            .unwrap();

        assert_eq!(receipt.bytes, 15);
        assert_eq!(receipt.hash, hash);
        assert!(store.chunk_exists("up1", 1).await);

        let stored = tokio::fs::read(store.chunk_path("up1", 1)).await.unwrap();
        assert_eq!(stored, b"test chunk data");
        assert_eq!(store.stored_sequences("up1").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_tampered_chunk_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = ChunkStore::new(temp_dir.path().to_path_buf());
        let hash = compute_hash(b"original");

        let result = store
            .receive_chunk("up1", 1, body_of(&["originaL"]), &hash)
            .await;

        assert!(matches!(result, Err(UploadError::ChunkHashMismatch { .. })));
        assert!(!store.chunk_exists("up1", 1).await);
        assert!(store.stored_sequences("up1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resent_chunk_replaces_previous() {
        let temp_dir = TempDir::new().unwrap();
        let store = ChunkStore::new(temp_dir.path().to_path_buf());

        store
            .receive_chunk("up1", 2, body_of(&["first"]), &compute_hash(b"first"))
            .await
            .unwrap();
        store
            .receive_chunk("up1", 2, body_of(&["second"]), &compute_hash(b"second"))
            .await
            .unwrap();

        let stored = tokio::fs::read(store.chunk_path("up1", 2)).await.unwrap();
        assert_eq!(stored, b"second");
    }

    #[tokio::test]
    async fn test_failed_body_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = ChunkStore::new(temp_dir.path().to_path_buf());
        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);

        let result = store.receive_chunk("up1", 1, body, "00").await;
        assert!(matches!(result, Err(UploadError::StorageError(_))));

        let mut entries = tokio::fs::read_dir(temp_dir.path().join("up1")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abandoned_body_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = ChunkStore::new(temp_dir.path().to_path_buf());
        let body = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"head"))])
            .chain(futures::stream::pending());

        let stalled = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            store.receive_chunk("up1", 1, body, "00"),
        )
        .await;
        assert!(stalled.is_err());

        let mut entries = tokio::fs::read_dir(temp_dir.path().join("up1")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
        assert!(!store.chunk_exists("up1", 1).await);
    }

    #[tokio::test]
    async fn test_rejects_unsafe_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = ChunkStore::new(temp_dir.path().to_path_buf());

        for id in ["", "..", "a/b", "../etc"] {
            let result = store.receive_chunk(id, 1, body_of(&["x"]), "00").await;
            assert!(matches!(result, Err(UploadError::InvalidUploadId(_))), "{id}");
        }
    }

    #[tokio::test]
    async fn test_delete_upload() {
        let temp_dir = TempDir::new().unwrap();
        let store = ChunkStore::new(temp_dir.path().to_path_buf());

        for (seq, data) in [(1u64, "aa"), (2, "bb")] {
            store
                .receive_chunk("up1", seq, body_of(&[data]), &compute_hash(data.as_bytes()))
                .await
                .unwrap();
        }
        assert_eq!(store.stored_upload_ids().await.unwrap(), vec!["up1".to_string()]);

        let deleted = store.delete_upload("up1").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(store.stored_upload_ids().await.unwrap().is_empty());
        assert_eq!(store.delete_upload("up1").await.unwrap(), 0);
    }
}
