//! Remote-service seams for the PlayFab toolkit.
//!
//! This module provides trait-based interfaces for the three remote
//! collaborators the gateways talk to (identity service, file store,
//! raw blob transport), a PlayFab implementation over HTTPS, and an
//! in-memory implementation for tests and offline runs.
//!
//! # Design Principles
//! - Backend isolation: no PlayFab wire types leak into the gateways
//! - Async operations: every remote call is async
//! - Pass-through errors: backend error reports are surfaced verbatim
//! - No retries: each call is issued once

pub mod memory;
pub mod playfab;
pub mod provider;
pub mod transport;

pub use memory::{MemoryBackend, MemoryOp};
pub use playfab::{PlayFabBackend, PlayFabClient, SessionStore};
pub use provider::{
    FileBackend, FileListing, IdentityBackend, InitiatedUpload, LoginResult, RemoteFile,
    UploadSlot,
};
pub use transport::{BlobTransport, HttpTransport};
