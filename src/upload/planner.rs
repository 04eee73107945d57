//! Chunk Planner
//!
//! Derives the chunk size and chunk count for a registered file.

use rand::Rng;

use super::types::{UploadError, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};

/// How the chunk size is picked for a new upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Uniformly random within `[min, max]` on every registration
    Random { min: u64, max: u64 },
    /// Always the same size
    Fixed(u64),
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        ChunkPolicy::Random {
            min: MIN_CHUNK_SIZE,
            max: MAX_CHUNK_SIZE,
        }
    }
}

/// Chunk layout of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub file_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u64,
}

impl ChunkPlan {
    /// Build the plan for `file_size` bytes split into `chunk_size` pieces.
    ///
    /// `chunk_size` is clamped to `1..=file_size`.
    pub fn new(file_size: u64, chunk_size: u64) -> Result<Self, UploadError> {
        if file_size == 0 {
            return Err(UploadError::InvalidRequest(
                "file size must be greater than zero".to_string(),
            ));
        }
        let chunk_size = chunk_size.clamp(1, file_size);
        Ok(Self {
            file_size,
            chunk_size,
            total_chunks: file_size.div_ceil(chunk_size),
        })
    }

    /// Expected payload length of a 1-indexed chunk, `None` when out of range
    pub fn chunk_len(&self, sequence: u64) -> Option<u64> {
        if sequence == 0 || sequence > self.total_chunks {
            return None;
        }
        if sequence == self.total_chunks {
            Some(self.file_size - self.chunk_size * (self.total_chunks - 1))
        } else {
            Some(self.chunk_size)
        }
    }
}

/// Picks chunk plans according to a [`ChunkPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkPlanner {
    policy: ChunkPolicy,
}

impl ChunkPlanner {
    pub fn new(policy: ChunkPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ChunkPolicy {
        self.policy
    }

    /// Plan a file of `file_size` bytes
    pub fn plan(&self, file_size: u64) -> Result<ChunkPlan, UploadError> {
        let chunk_size = match self.policy {
            ChunkPolicy::Fixed(size) => size,
            ChunkPolicy::Random { min, max } => {
                rand::thread_rng().gen_range(min.max(1)..=max.max(min).max(1))
            }
        };
        ChunkPlan::new(file_size, chunk_size)
    }
}
