//! Common types used throughout the toolkit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Identifier of a PlayFab title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TitleId(String);

impl TitleId {
    /// Create a new TitleId from a string.
    ///
    /// # Errors
    /// - Returns error if id is empty or only whitespace
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "PlayFab Title ID cannot be null or empty.".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The backend's identity unit that scopes file storage to an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Entity identifier.
    #[serde(rename = "Id")]
    pub id: String,
    /// Entity type, e.g. `title_player_account`.
    #[serde(rename = "Type")]
    pub entity_type: String,
}

impl EntityKey {
    /// Create a new entity key.
    ///
    /// # Errors
    /// - Returns error if either part is empty
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        let entity_type = entity_type.into();
        if id.is_empty() || entity_type.is_empty() {
            return Err(crate::Error::MissingEntity);
        }
        Ok(Self { id, entity_type })
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

/// A stored file as reported by a list query.
///
/// Never persisted locally; rebuilt from every list call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// File name, unique within the owning entity.
    pub name: String,
    /// Time-limited download URL.
    pub download_url: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}

impl FileRecord {
    /// Check whether the name starts with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.name.starts_with(prefix)
    }
}

/// Secret string (session ticket, entity token) that zeroizes on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Credential(String);

impl Credential {
    /// Wrap a secret value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret for use in a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential([REDACTED; {} chars])", self.0.len())
    }
}
