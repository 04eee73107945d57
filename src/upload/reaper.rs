//! Background cleanup of expired uploads and orphaned chunk storage

use std::collections::HashSet;
use std::time::Duration;

use super::chunk_store::ChunkStore;
use super::registry::UploadRegistry;
use super::types::UploadError;

/// What one reaper pass removed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReapReport {
    /// Uploads whose lease ran out
    pub expired: Vec<String>,
    /// Chunk directories with no registered upload
    pub orphaned: Vec<String>,
}

#[derive(Clone)]
pub struct UploadReaper {
    registry: UploadRegistry,
    chunk_store: ChunkStore,
    interval: Duration,
}

impl UploadReaper {
    pub fn new(registry: UploadRegistry, chunk_store: ChunkStore, interval: Duration) -> Self {
        Self {
            registry,
            chunk_store,
            interval,
        }
    }

    /// Run a single cleanup pass
    pub async fn run_once(&self) -> Result<ReapReport, UploadError> {
        let expired = self.registry.cleanup_expired().await;
        for id in &expired {
            self.chunk_store.delete_upload(id).await?;
        }

        let live: HashSet<String> = self.registry.live_ids().await.into_iter().collect();
        let mut orphaned = Vec::new();
        for id in self.chunk_store.stored_upload_ids().await? {
            if live.contains(&id) {
                continue;
            }
            match self.chunk_store.delete_upload(&id).await {
                Ok(count) => {
                    tracing::debug!(upload_id = %id, count = count, "Removed orphaned chunks");
                    orphaned.push(id);
                }
                Err(e) => {
                    tracing::warn!(upload_id = %id, error = %e, "Failed to remove orphaned chunks");
                }
            }
        }

        if !orphaned.is_empty() {
            tracing::info!(count = orphaned.len(), "Cleaned up orphaned chunk storage");
        }

        Ok(ReapReport { expired, orphaned })
    }

    /// Start background cleanup task
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);

            loop {
                interval.tick().await;
                if let Err(e) = self.run_once().await {
                    tracing::warn!(error = %e, "Upload reaper pass failed");
                }
            }
        })
    }
}
