//! Chunk Relay
//!
//! Chunked file transfer with per-chunk and whole-file SHA-256 verification.
//!
//! # Modules
//!
//! - `upload`: Receiver side (registration, chunk storage, reassembly, ledger)
//! - `routes`: HTTP surface of the receiver
//! - `client`: Sender side (HTTP client and orchestrator)
//! - `config`: Environment configuration shared by both binaries

pub mod client;
pub mod config;
pub mod routes;
pub mod state;
pub mod upload;
