//! Chunked Upload Module
//!
//! Receiver side of the chunk relay protocol:
//! - SHA-256 digests for every chunk and for the whole file
//! - Chunk plan fixed at registration
//! - Streaming chunk storage with per-chunk verification
//! - Ordered reassembly, final verification and a completion ledger
//!
//! Protocol Flow:
//! 1. Client registers file name, size and hash, gets an id and chunk size
//! 2. Client uploads chunks 1..=totalChunks with their hashes
//! 3. Client asks for completion; server reassembles and verifies

pub mod assembler;
pub mod chunk_store;
pub mod hasher;
pub mod ledger;
pub mod planner;
pub mod reaper;
pub mod registry;
pub mod types;

pub use assembler::Assembler;
pub use chunk_store::{validate_upload_id, ChunkReceipt, ChunkStore};
pub use hasher::{compute_hash, hash_file, hash_reader, verify_hash, StreamHasher};
pub use ledger::CompletionLedger;
pub use planner::{ChunkPlan, ChunkPlanner, ChunkPolicy};
pub use reaper::{ReapReport, UploadReaper};
pub use registry::{InMemoryMetadataStore, MetadataStore, UploadRegistry};
pub use types::*;
