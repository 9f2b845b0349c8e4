//! Common types shared across the PlayFab toolkit crates.
//!
//! This module provides the error type and the small value types
//! (title id, entity key, file record, credentials) that flow between
//! the backend seams and the gateways.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Credential, EntityKey, FileRecord, TitleId};
