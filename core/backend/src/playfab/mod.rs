//! PlayFab backend for the toolkit.
//!
//! This module talks to the PlayFab REST API with:
//! - Session ticket and entity token tracking
//! - Client/Authentication API calls for the identity service
//! - File API calls for the per-entity file store
//! - PlayFab-style error reports passed through to callers

pub mod backend;
pub mod client;
pub mod session;

pub use backend::PlayFabBackend;
pub use client::{ApiErrorBody, PlayFabClient, RequestAuth, SDK_VERSION};
pub use session::{EntityTokenGrant, SessionStore};
