//! Completion Ledger
//!
//! Append-only JSON array of completed transfers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::types::{CompletionRecord, UploadError};

/// Durable record of finished uploads, shared by all completions
#[derive(Clone)]
pub struct CompletionLedger {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl CompletionLedger {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record.
    ///
    /// The read-append-write cycle runs under the ledger lock and the new
    /// array replaces the file through a rename.
    pub async fn append(&self, record: CompletionRecord) -> Result<usize, UploadError> {
        let _guard = self.lock.lock().await;

        let mut records = self.read_records().await?;
        records.push(record);

        let data = serde_json::to_vec_pretty(&records)
            .map_err(|e| UploadError::LedgerError(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UploadError::LedgerError(e.to_string()))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &data)
            .await
            .map_err(|e| UploadError::LedgerError(e.to_string()))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| UploadError::LedgerError(e.to_string()))?;

        Ok(records.len())
    }

    /// All records in append order
    pub async fn records(&self) -> Result<Vec<CompletionRecord>, UploadError> {
        let _guard = self.lock.lock().await;
        self.read_records().await
    }

    /// A ledger that does not exist yet is empty
    async fn read_records(&self) -> Result<Vec<CompletionRecord>, UploadError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(UploadError::LedgerError(e.to_string())),
        };

        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&data).map_err(|e| {
            UploadError::LedgerError(format!("{} is not a valid ledger: {}", self.path.display(), e))
        })
    }
}
