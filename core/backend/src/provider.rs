//! Backend trait definitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use pftoolkit_common::{EntityKey, Result};

/// Outcome of a successful login or registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    /// PlayFab player id.
    pub playfab_id: String,
    /// Display name from the player profile, when requested and set.
    pub display_name: Option<String>,
    /// Whether the account was created by this call.
    pub newly_created: bool,
}

/// Destination URL for a single file upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSlot {
    /// File name the slot was issued for.
    pub file_name: String,
    /// Time-limited URL accepting a raw PUT.
    pub upload_url: String,
}

/// Result of initiating one or more uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatedUpload {
    /// One slot per requested file name.
    pub slots: Vec<UploadSlot>,
    /// Profile version to pass back when finalizing.
    pub profile_version: Option<i64>,
}

impl InitiatedUpload {
    /// Find the slot issued for `name`.
    pub fn slot_for(&self, name: &str) -> Option<&UploadSlot> {
        self.slots.iter().find(|slot| slot.file_name == name)
    }
}

/// Metadata of one stored file as returned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Time-limited download URL.
    pub download_url: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Content checksum, if the store reports one.
    pub checksum: Option<String>,
}

/// All files owned by an entity, keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileListing {
    /// Files keyed by name.
    pub files: HashMap<String, RemoteFile>,
    /// Current profile version.
    pub profile_version: Option<i64>,
}

/// Remote identity service.
///
/// Implementations hold whatever session credentials the service issues;
/// callers never see them.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Get the backend name (e.g., "playfab", "memory").
    fn name(&self) -> &str;

    /// Log in with email and password.
    ///
    /// When `with_profile` is set the player profile (display name) is
    /// requested alongside the login.
    async fn login_with_email(
        &self,
        email: &str,
        password: &str,
        with_profile: bool,
    ) -> Result<LoginResult>;

    /// Register a new account identified by email.
    ///
    /// A username is not required.
    async fn register_with_email(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<LoginResult>;

    /// Log in with a caller-chosen custom id.
    async fn login_with_custom_id(&self, custom_id: &str, create_account: bool)
        -> Result<LoginResult>;

    /// Ask the service to send an account recovery email.
    async fn send_account_recovery_email(&self, email: &str) -> Result<()>;

    /// Exchange the current session for an entity key.
    ///
    /// # Errors
    /// - No active session
    /// - Remote failure
    async fn get_entity_token(&self) -> Result<EntityKey>;

    /// Whether a session is currently active.
    async fn is_logged_in(&self) -> bool;

    /// Drop all local session credentials. Never contacts the service.
    async fn forget_credentials(&self);
}

/// Remote per-entity file store.
#[async_trait]
pub trait FileBackend: Send + Sync {
    /// Request upload slots for `names`.
    async fn initiate_uploads(&self, entity: &EntityKey, names: &[String])
        -> Result<InitiatedUpload>;

    /// Mark previously initiated uploads as complete.
    async fn finalize_uploads(
        &self,
        entity: &EntityKey,
        names: &[String],
        profile_version: Option<i64>,
    ) -> Result<()>;

    /// List all files owned by `entity`.
    async fn get_files(&self, entity: &EntityKey) -> Result<FileListing>;

    /// Delete `names` in a single batch.
    async fn delete_files(&self, entity: &EntityKey, names: &[String]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_for_finds_exact_name() {
        let initiated = InitiatedUpload {
            slots: vec![
                UploadSlot {
                    file_name: "save_001".to_string(),
                    upload_url: "https://blob/1".to_string(),
                },
                UploadSlot {
                    file_name: "save_002".to_string(),
                    upload_url: "https://blob/2".to_string(),
                },
            ],
            profile_version: Some(3),
        };

        assert_eq!(initiated.slot_for("save_002").unwrap().upload_url, "https://blob/2");
        assert!(initiated.slot_for("save_00").is_none());
    }
}
