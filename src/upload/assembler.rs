//! Reassembly
//!
//! Folds stored chunks into a per-upload staging file, verifies the whole-file
//! hash and only then renames it over the destination and records the
//! completion. Chunks are only deleted once the hash matches, so a failed
//! attempt can be retried after the bad chunks are re-sent. A failed attempt
//! never touches a previously stored destination.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use super::chunk_store::ChunkStore;
use super::hasher::hash_reader;
use super::ledger::CompletionLedger;
use super::registry::UploadRegistry;
use super::types::{
    CompletionRecord, UploadError, UploadMetadata, UploadStatus, FINAL_FILE_PREFIX,
};

/// Reassembly service
#[derive(Clone)]
pub struct Assembler {
    registry: UploadRegistry,
    chunk_store: ChunkStore,
    ledger: CompletionLedger,
    output_dir: PathBuf,
}

impl Assembler {
    pub fn new(
        registry: UploadRegistry,
        chunk_store: ChunkStore,
        ledger: CompletionLedger,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            chunk_store,
            ledger,
            output_dir,
        }
    }

    /// Where the reassembled copy of `file_name` is written
    pub fn destination_path(&self, file_name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}{}", FINAL_FILE_PREFIX, stored_name(file_name)))
    }

    /// Where an upload is folded before its hash is checked.
    ///
    /// Keyed by upload id so uploads sharing a file name never write the
    /// same file. Left on disk when the hash check fails.
    pub fn staging_path(&self, metadata: &UploadMetadata) -> PathBuf {
        self.output_dir.join(format!(
            ".{}{}.{}.partial",
            FINAL_FILE_PREFIX,
            stored_name(&metadata.file_name),
            metadata.id
        ))
    }

    /// Complete an upload
    pub async fn complete(&self, upload_id: &str) -> Result<CompletionRecord, UploadError> {
        let (metadata, previous) = self.registry.begin_completion(upload_id).await?;

        let result = self.assemble(&metadata).await;

        let outcome = if result.is_ok() {
            UploadStatus::Completed
        } else {
            previous
        };
        if let Err(e) = self.registry.finish_completion(upload_id, outcome).await {
            tracing::warn!(upload_id = %upload_id, error = %e, "Failed to update upload status");
        }

        if let Err(e) = &result {
            tracing::error!(upload_id = %upload_id, error = %e, "Upload completion failed");
        }

        result
    }

    async fn assemble(&self, metadata: &UploadMetadata) -> Result<CompletionRecord, UploadError> {
        let destination = self.destination_path(&metadata.file_name);
        let staging = self.staging_path(metadata);

        tracing::info!(
            upload_id = %metadata.id,
            file_name = %metadata.file_name,
            chunks = metadata.total_chunks,
            destination = %destination.display(),
            "Assembling file from chunks"
        );

        for sequence in 1..=metadata.total_chunks {
            if !self.chunk_store.chunk_exists(&metadata.id, sequence).await {
                return Err(missing_chunk(metadata, sequence));
            }
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(UploadError::storage)?;

        let mut output = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&staging)
            .await
            .map_err(UploadError::storage)?;

        for sequence in 1..=metadata.total_chunks {
            // Can vanish after the presence check
            let Some(mut chunk) = self.chunk_store.open_chunk(&metadata.id, sequence).await? else {
                return Err(missing_chunk(metadata, sequence));
            };

            tokio::io::copy(&mut chunk, &mut output)
                .await
                .map_err(UploadError::storage)?;
        }

        output.flush().await.map_err(UploadError::storage)?;
        output.sync_all().await.map_err(UploadError::storage)?;

        output
            .seek(std::io::SeekFrom::Start(0))
            .await
            .map_err(UploadError::storage)?;
        let actual = hash_reader(&mut output).await.map_err(UploadError::storage)?;

        if !actual.eq_ignore_ascii_case(&metadata.file_hash) {
            return Err(UploadError::FinalHashMismatch {
                expected: metadata.file_hash.clone(),
                actual,
            });
        }

        drop(output);
        tokio::fs::rename(&staging, &destination)
            .await
            .map_err(UploadError::storage)?;

        let record = CompletionRecord {
            metadata: metadata.clone(),
            completed_at: Utc::now(),
            stored_as: destination.to_string_lossy().to_string(),
        };
        self.ledger.append(record.clone()).await?;

        match self.chunk_store.delete_upload(&metadata.id).await {
            Ok(count) => tracing::debug!(upload_id = %metadata.id, count = count, "Chunks deleted"),
            Err(e) => tracing::warn!(upload_id = %metadata.id, error = %e, "Failed to delete chunks"),
        }

        tracing::info!(
            upload_id = %metadata.id,
            file_hash = %metadata.file_hash,
            size = metadata.file_size,
            "File stored successfully"
        );

        Ok(record)
    }

}

fn missing_chunk(metadata: &UploadMetadata, sequence: u64) -> UploadError {
    tracing::warn!(
        upload_id = %metadata.id,
        sequence = sequence,
        "Chunk file does not exist"
    );
    UploadError::MissingChunk {
        sequence,
        total: metadata.total_chunks,
    }
}

/// Final path component of a client-supplied file name
fn stored_name(file_name: &str) -> &str {
    Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("upload")
}
