//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::upload::{
    Assembler, ChunkPlanner, ChunkStore, CompletionLedger, InMemoryMetadataStore, MetadataStore,
    UploadReaper, UploadRegistry,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    registry: UploadRegistry,
    chunk_store: ChunkStore,
    ledger: CompletionLedger,
    assembler: Assembler,
}

impl AppState {
    /// Create state backed by the in-memory metadata store
    pub fn new(config: Config) -> Self {
        Self::with_metadata_store(config, Arc::new(InMemoryMetadataStore::new()))
    }

    /// Create state over an injected metadata store
    pub fn with_metadata_store(config: Config, store: Arc<dyn MetadataStore>) -> Self {
        let registry = UploadRegistry::with_store(
            store,
            ChunkPlanner::new(config.upload.chunk_policy()),
            config.upload.expiry_hours,
        );
        let chunk_store = ChunkStore::new(config.storage.chunk_dir.clone());
        let ledger = CompletionLedger::new(config.storage.ledger_path.clone());
        let assembler = Assembler::new(
            registry.clone(),
            chunk_store.clone(),
            ledger.clone(),
            config.storage.output_dir.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                registry,
                chunk_store,
                ledger,
                assembler,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn registry(&self) -> &UploadRegistry {
        &self.inner.registry
    }

    pub fn chunk_store(&self) -> &ChunkStore {
        &self.inner.chunk_store
    }

    pub fn ledger(&self) -> &CompletionLedger {
        &self.inner.ledger
    }

    pub fn assembler(&self) -> &Assembler {
        &self.inner.assembler
    }

    /// Reaper over this state's registry and chunk store
    pub fn reaper(&self) -> UploadReaper {
        UploadReaper::new(
            self.inner.registry.clone(),
            self.inner.chunk_store.clone(),
            self.inner.config.upload.reaper_interval(),
        )
    }
}
