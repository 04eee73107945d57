//! Upload Registry
//!
//! Allocates upload identities and keeps their metadata:
//! - Pluggable metadata store (in-memory by default)
//! - Lease expiry for abandoned uploads
//! - Status transitions around completion

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::planner::ChunkPlanner;
use super::types::{
    RegisterRequest, UploadError, UploadMetadata, UploadSession, UploadStatus,
    UPLOAD_EXPIRY_HOURS,
};

// ============================================================================
// Metadata Store Trait
// ============================================================================

/// Backend holding upload sessions keyed by upload id.
///
/// Every method is atomic with respect to the others.
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new session
    async fn insert(&self, session: UploadSession) -> Result<(), UploadError>;

    /// Get a session by id
    async fn get(&self, id: &str) -> Option<UploadSession>;

    /// Move a session to `to` if its current status is one of `from`.
    ///
    /// Returns the status found before the transition.
    async fn transition(
        &self,
        id: &str,
        from: &[UploadStatus],
        to: UploadStatus,
    ) -> Result<UploadStatus, UploadError>;

    /// Remove a session
    async fn remove(&self, id: &str) -> Option<UploadSession>;

    /// All stored sessions
    async fn list(&self) -> Vec<UploadSession>;
}

/// In-memory metadata store
#[derive(Default)]
pub struct InMemoryMetadataStore {
    sessions: RwLock<HashMap<String, UploadSession>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn insert(&self, session: UploadSession) -> Result<(), UploadError> {
        let mut sessions = self.sessions.write().await;
        let id = session.metadata.id.clone();
        if sessions.contains_key(&id) {
            return Err(UploadError::StorageError(format!("duplicate upload id {}", id)));
        }
        sessions.insert(id, session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Option<UploadSession> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    async fn transition(
        &self,
        id: &str,
        from: &[UploadStatus],
        to: UploadStatus,
    ) -> Result<UploadStatus, UploadError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| UploadError::MetadataNotFound(id.to_string()))?;

        let previous = session.status;
        if !from.contains(&previous) {
            return Err(UploadError::CompletionInProgress(id.to_string()));
        }
        session.status = to;
        Ok(previous)
    }

    async fn remove(&self, id: &str) -> Option<UploadSession> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id)
    }

    async fn list(&self) -> Vec<UploadSession> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }
}

// ============================================================================
// Upload Registry
// ============================================================================

/// Registers uploads and tracks their lifecycle
#[derive(Clone)]
pub struct UploadRegistry {
    inner: Arc<UploadRegistryInner>,
}

struct UploadRegistryInner {
    store: Arc<dyn MetadataStore>,
    planner: ChunkPlanner,
    lease_hours: i64,
}

impl UploadRegistry {
    /// Create a registry over the in-memory store
    pub fn new(planner: ChunkPlanner) -> Self {
        Self::with_store(Arc::new(InMemoryMetadataStore::new()), planner, UPLOAD_EXPIRY_HOURS)
    }

    /// Create a registry over an injected store
    pub fn with_store(store: Arc<dyn MetadataStore>, planner: ChunkPlanner, lease_hours: i64) -> Self {
        Self {
            inner: Arc::new(UploadRegistryInner {
                store,
                planner,
                lease_hours,
            }),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a file and fix its chunk plan
    pub async fn register(&self, request: &RegisterRequest) -> Result<UploadMetadata, UploadError> {
        let plan = self.inner.planner.plan(request.file_size)?;

        let metadata = UploadMetadata {
            id: Uuid::new_v4().to_string(),
            file_name: request.file_name.clone(),
            file_size: request.file_size,
            file_hash: request.file_hash.to_ascii_lowercase(),
            chunk_size: plan.chunk_size,
            total_chunks: plan.total_chunks,
        };

        self.inner
            .store
            .insert(UploadSession::new(metadata.clone(), self.inner.lease_hours))
            .await?;

        tracing::info!(
            upload_id = %metadata.id,
            file_name = %metadata.file_name,
            file_size = metadata.file_size,
            chunk_size = metadata.chunk_size,
            total_chunks = metadata.total_chunks,
            "Registered upload"
        );

        Ok(metadata)
    }

    /// Get a session by id
    pub async fn get(&self, id: &str) -> Result<UploadSession, UploadError> {
        self.inner
            .store
            .get(id)
            .await
            .ok_or_else(|| UploadError::MetadataNotFound(id.to_string()))
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Claim an upload for reassembly.
    ///
    /// Fails if another completion for the same id is running. Returns the
    /// metadata and the status to restore if the attempt fails.
    pub async fn begin_completion(
        &self,
        id: &str,
    ) -> Result<(UploadMetadata, UploadStatus), UploadError> {
        let previous = self
            .inner
            .store
            .transition(
                id,
                &[UploadStatus::Pending, UploadStatus::Completed],
                UploadStatus::Assembling,
            )
            .await?;
        Ok((self.get(id).await?.metadata, previous))
    }

    /// Record the outcome of a completion attempt
    pub async fn finish_completion(&self, id: &str, outcome: UploadStatus) -> Result<(), UploadError> {
        self.inner
            .store
            .transition(id, &[UploadStatus::Assembling], outcome)
            .await?;

        if outcome == UploadStatus::Completed {
            tracing::info!(upload_id = %id, "Upload completed");
        }
        Ok(())
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Ids of every known upload
    pub async fn live_ids(&self) -> Vec<String> {
        self.inner
            .store
            .list()
            .await
            .into_iter()
            .map(|s| s.metadata.id)
            .collect()
    }

    /// Drop sessions whose lease ran out, skipping those being assembled.
    ///
    /// Returns the removed ids.
    pub async fn cleanup_expired(&self) -> Vec<String> {
        let now = Utc::now();
        let expired: Vec<String> = self
            .inner
            .store
            .list()
            .await
            .into_iter()
            .filter(|s| s.expires_at < now && s.status != UploadStatus::Assembling)
            .map(|s| s.metadata.id)
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(session) = self.inner.store.remove(&id).await {
                tracing::debug!(
                    upload_id = %id,
                    file_name = %session.metadata.file_name,
                    "Expired upload removed"
                );
                removed.push(id);
            }
        }

        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "Cleaned up expired uploads");
        }

        removed
    }
}
