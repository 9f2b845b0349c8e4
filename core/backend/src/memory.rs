//! In-memory backend for testing and offline runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use pftoolkit_common::{EntityKey, Error, Result};

use crate::provider::{
    FileBackend, FileListing, IdentityBackend, InitiatedUpload, LoginResult, RemoteFile,
    UploadSlot,
};
use crate::transport::BlobTransport;

const UPLOAD_SCHEME: &str = "memory://upload/";
const DOWNLOAD_SCHEME: &str = "memory://download/";
const PLAYER_ENTITY_TYPE: &str = "title_player_account";

/// Remote operations the memory backend counts and can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    LoginWithEmail,
    Register,
    LoginWithCustomId,
    SendRecoveryEmail,
    GetEntityToken,
    InitiateUploads,
    FinalizeUploads,
    GetFiles,
    DeleteFiles,
    Put,
    Get,
}

impl MemoryOp {
    /// API path the operation stands in for, used in error reports.
    pub fn api_path(&self) -> &'static str {
        match self {
            MemoryOp::LoginWithEmail => "/Client/LoginWithEmailAddress",
            MemoryOp::Register => "/Client/RegisterPlayFabUser",
            MemoryOp::LoginWithCustomId => "/Client/LoginWithCustomID",
            MemoryOp::SendRecoveryEmail => "/Client/SendAccountRecoveryEmail",
            MemoryOp::GetEntityToken => "/Authentication/GetEntityToken",
            MemoryOp::InitiateUploads => "/File/InitiateFileUploads",
            MemoryOp::FinalizeUploads => "/File/FinalizeFileUploads",
            MemoryOp::GetFiles => "/File/GetFiles",
            MemoryOp::DeleteFiles => "/File/DeleteFiles",
            MemoryOp::Put => "PUT",
            MemoryOp::Get => "GET",
        }
    }
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    playfab_id: String,
    display_name: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredFile {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct PendingUpload {
    entity_id: String,
    name: String,
    data: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    custom_ids: HashMap<String, String>,
    session: Option<String>,
    files: HashMap<String, BTreeMap<String, StoredFile>>,
    pending: HashMap<String, PendingUpload>,
    calls: HashMap<MemoryOp, usize>,
    failures: HashSet<MemoryOp>,
    recovery_emails: Vec<String>,
    profile_version: i64,
}

impl MemoryState {
    /// Count the call and consume an injected failure, if any.
    fn record(&mut self, op: MemoryOp) -> Result<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        if self.failures.remove(&op) {
            return Err(match op {
                MemoryOp::Put | MemoryOp::Get => {
                    Error::Network(format!("{} failed: injected failure", op.api_path()))
                }
                _ => Error::Remote(format!("{}: Injected failure", op.api_path())),
            });
        }
        Ok(())
    }

    fn entity_for(playfab_id: &str) -> EntityKey {
        EntityKey {
            id: format!("{}-ENTITY", playfab_id),
            entity_type: PLAYER_ENTITY_TYPE.to_string(),
        }
    }
}

/// In-memory backend.
///
/// Stands in for the identity service, the file store and the blob
/// transport at once. Every remote call is counted per [`MemoryOp`] and a
/// single failure can be injected per operation with [`fail_next`].
///
/// [`fail_next`]: MemoryBackend::fail_next
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Create an empty backend with no accounts and no files.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Make the next call of `op` fail.
    pub async fn fail_next(&self, op: MemoryOp) {
        self.state.lock().await.failures.insert(op);
    }

    /// Number of calls made for `op`.
    pub async fn calls(&self, op: MemoryOp) -> usize {
        self.state.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of remote calls made across all operations.
    pub async fn total_calls(&self) -> usize {
        self.state.lock().await.calls.values().sum()
    }

    /// Store a file directly, bypassing the upload protocol.
    pub async fn seed_file(
        &self,
        entity: &EntityKey,
        name: &str,
        data: Vec<u8>,
        last_modified: DateTime<Utc>,
    ) {
        let mut state = self.state.lock().await;
        state
            .files
            .entry(entity.id.clone())
            .or_default()
            .insert(name.to_string(), StoredFile { data, last_modified });
        state.profile_version += 1;
    }

    /// Names of the files stored for `entity`, in name order.
    pub async fn stored_names(&self, entity: &EntityKey) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .files
            .get(&entity.id)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of initiated uploads that were never finalized.
    pub async fn pending_uploads(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Addresses recovery emails were sent to.
    pub async fn recovery_emails(&self) -> Vec<String> {
        self.state.lock().await.recovery_emails.clone()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn download_url(entity_id: &str, name: &str) -> String {
    format!("{}{}/{}", DOWNLOAD_SCHEME, entity_id, name)
}

#[async_trait]
impl IdentityBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn login_with_email(
        &self,
        email: &str,
        password: &str,
        with_profile: bool,
    ) -> Result<LoginResult> {
        let mut state = self.state.lock().await;
        state.record(MemoryOp::LoginWithEmail)?;

        let account = match state.accounts.get(email) {
            Some(account) if account.password == password => account.clone(),
            _ => {
                return Err(Error::Remote(format!(
                    "{}: Invalid email address or password",
                    MemoryOp::LoginWithEmail.api_path()
                )))
            }
        };

        state.session = Some(account.playfab_id.clone());
        Ok(LoginResult {
            playfab_id: account.playfab_id,
            display_name: if with_profile { account.display_name } else { None },
            newly_created: false,
        })
    }

    async fn register_with_email(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<LoginResult> {
        let mut state = self.state.lock().await;
        state.record(MemoryOp::Register)?;

        if state.accounts.contains_key(email) {
            return Err(Error::Remote(format!(
                "{}: Email address not available\nEmail: Email address already exists.",
                MemoryOp::Register.api_path()
            )));
        }

        let playfab_id = new_playfab_id();
        state.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                playfab_id: playfab_id.clone(),
                display_name: Some(display_name.to_string()),
            },
        );
        state.session = Some(playfab_id.clone());

        Ok(LoginResult {
            playfab_id,
            display_name: Some(display_name.to_string()),
            newly_created: true,
        })
    }

    async fn login_with_custom_id(
        &self,
        custom_id: &str,
        create_account: bool,
    ) -> Result<LoginResult> {
        let mut state = self.state.lock().await;
        state.record(MemoryOp::LoginWithCustomId)?;

        let existing = state.custom_ids.get(custom_id).cloned();
        let (playfab_id, newly_created) = match existing {
            Some(id) => (id, false),
            None if create_account => {
                let id = new_playfab_id();
                state.custom_ids.insert(custom_id.to_string(), id.clone());
                (id, true)
            }
            None => {
                return Err(Error::Remote(format!(
                    "{}: User not found",
                    MemoryOp::LoginWithCustomId.api_path()
                )))
            }
        };

        state.session = Some(playfab_id.clone());
        Ok(LoginResult {
            playfab_id,
            display_name: None,
            newly_created,
        })
    }

    async fn send_account_recovery_email(&self, email: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(MemoryOp::SendRecoveryEmail)?;

        if !state.accounts.contains_key(email) {
            return Err(Error::Remote(format!(
                "{}: User not found",
                MemoryOp::SendRecoveryEmail.api_path()
            )));
        }
        state.recovery_emails.push(email.to_string());
        Ok(())
    }

    async fn get_entity_token(&self) -> Result<EntityKey> {
        let mut state = self.state.lock().await;
        state.record(MemoryOp::GetEntityToken)?;

        match &state.session {
            Some(playfab_id) => Ok(MemoryState::entity_for(playfab_id)),
            None => Err(Error::Remote(format!(
                "{}: Must be logged in to call this method",
                MemoryOp::GetEntityToken.api_path()
            ))),
        }
    }

    async fn is_logged_in(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    async fn forget_credentials(&self) {
        self.state.lock().await.session = None;
    }
}

#[async_trait]
impl FileBackend for MemoryBackend {
    async fn initiate_uploads(
        &self,
        entity: &EntityKey,
        names: &[String],
    ) -> Result<InitiatedUpload> {
        let mut state = self.state.lock().await;
        state.record(MemoryOp::InitiateUploads)?;

        let mut slots = Vec::with_capacity(names.len());
        for name in names {
            // A new slot supersedes any unfinished one for the same file.
            state
                .pending
                .retain(|_, p| !(p.entity_id == entity.id && &p.name == name));

            let upload_url = format!("{}{}/{}/{}", UPLOAD_SCHEME, entity.id, name, Uuid::new_v4());
            state.pending.insert(
                upload_url.clone(),
                PendingUpload {
                    entity_id: entity.id.clone(),
                    name: name.clone(),
                    data: None,
                },
            );
            slots.push(UploadSlot {
                file_name: name.clone(),
                upload_url,
            });
        }

        Ok(InitiatedUpload {
            slots,
            profile_version: Some(state.profile_version),
        })
    }

    async fn finalize_uploads(
        &self,
        entity: &EntityKey,
        names: &[String],
        profile_version: Option<i64>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(MemoryOp::FinalizeUploads)?;

        if let Some(expected) = profile_version {
            if expected != state.profile_version {
                return Err(Error::Remote(format!(
                    "{}: The profile version does not match the expected version",
                    MemoryOp::FinalizeUploads.api_path()
                )));
            }
        }

        let mut completed = Vec::with_capacity(names.len());
        for name in names {
            let found = state.pending.iter().find(|(_, p)| {
                p.entity_id == entity.id && &p.name == name && p.data.is_some()
            });
            match found {
                Some((url, _)) => completed.push(url.clone()),
                None => {
                    return Err(Error::Remote(format!(
                        "{}: No uploaded content for file {}",
                        MemoryOp::FinalizeUploads.api_path(),
                        name
                    )))
                }
            }
        }

        let now = Utc::now();
        for url in completed {
            if let Some(PendingUpload { name, data: Some(data), .. }) = state.pending.remove(&url) {
                state
                    .files
                    .entry(entity.id.clone())
                    .or_default()
                    .insert(name, StoredFile { data, last_modified: now });
            }
        }
        state.profile_version += 1;
        Ok(())
    }

    async fn get_files(&self, entity: &EntityKey) -> Result<FileListing> {
        let mut state = self.state.lock().await;
        state.record(MemoryOp::GetFiles)?;

        let files = state
            .files
            .get(&entity.id)
            .map(|files| {
                files
                    .iter()
                    .map(|(name, file)| {
                        (
                            name.clone(),
                            RemoteFile {
                                download_url: download_url(&entity.id, name),
                                size: file.data.len() as u64,
                                last_modified: file.last_modified,
                                checksum: None,
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(FileListing {
            files,
            profile_version: Some(state.profile_version),
        })
    }

    async fn delete_files(&self, entity: &EntityKey, names: &[String]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(MemoryOp::DeleteFiles)?;

        let owned = state.files.entry(entity.id.clone()).or_default();
        if let Some(missing) = names.iter().find(|name| !owned.contains_key(*name)) {
            return Err(Error::Remote(format!(
                "{}: File not found: {}",
                MemoryOp::DeleteFiles.api_path(),
                missing
            )));
        }
        for name in names {
            owned.remove(name);
        }
        state.profile_version += 1;
        Ok(())
    }
}

#[async_trait]
impl BlobTransport for MemoryBackend {
    async fn put(&self, url: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(MemoryOp::Put)?;

        let pending = state
            .pending
            .get_mut(url)
            .ok_or_else(|| Error::Network(format!("Upload failed: 404 - unknown upload URL {}", url)))?;
        pending.data = Some(data);
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let mut state = self.state.lock().await;
        state.record(MemoryOp::Get)?;

        let not_found = || Error::Network(format!("Download failed: 404 - {}", url));
        let (entity_id, name) = url
            .strip_prefix(DOWNLOAD_SCHEME)
            .and_then(|rest| rest.split_once('/'))
            .ok_or_else(not_found)?;

        state
            .files
            .get(entity_id)
            .and_then(|files| files.get(name))
            .map(|file| file.data.clone())
            .ok_or_else(not_found)
    }
}

fn new_playfab_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entity() -> EntityKey {
        EntityKey::new("E1", PLAYER_ENTITY_TYPE).unwrap()
    }

    #[tokio::test]
    async fn test_upload_protocol() {
        let backend = MemoryBackend::new();
        let names = vec!["save_001".to_string()];

        let initiated = backend.initiate_uploads(&entity(), &names).await.unwrap();
        let slot = initiated.slot_for("save_001").unwrap().clone();
        backend
            .put(&slot.upload_url, b"hello".to_vec(), "application/octet-stream")
            .await
            .unwrap();
        backend
            .finalize_uploads(&entity(), &names, initiated.profile_version)
            .await
            .unwrap();

        let listing = backend.get_files(&entity()).await.unwrap();
        let file = &listing.files["save_001"];
        assert_eq!(file.size, 5);
        assert_eq!(backend.get(&file.download_url).await.unwrap(), b"hello");
        assert_eq!(backend.pending_uploads().await, 0);
    }

    #[tokio::test]
    async fn test_finalize_without_put_fails() {
        let backend = MemoryBackend::new();
        let names = vec!["save_001".to_string()];

        backend.initiate_uploads(&entity(), &names).await.unwrap();
        let result = backend.finalize_uploads(&entity(), &names, None).await;

        assert!(matches!(result, Err(Error::Remote(_))));
        assert_eq!(backend.pending_uploads().await, 1);
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let backend = MemoryBackend::new();
        backend.fail_next(MemoryOp::GetFiles).await;

        assert!(backend.get_files(&entity()).await.is_err());
        assert!(backend.get_files(&entity()).await.is_ok());
        assert_eq!(backend.calls(MemoryOp::GetFiles).await, 2);
    }

    #[tokio::test]
    async fn test_delete_is_all_or_nothing() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        backend.seed_file(&entity(), "a", vec![1], now).await;

        let result = backend
            .delete_files(&entity(), &["a".to_string(), "missing".to_string()])
            .await;
        assert!(result.is_err());
        assert_eq!(backend.stored_names(&entity()).await, vec!["a".to_string()]);

        backend.delete_files(&entity(), &["a".to_string()]).await.unwrap();
        assert!(backend.stored_names(&entity()).await.is_empty());
    }

    #[tokio::test]
    async fn test_custom_id_login_creates_once() {
        let backend = MemoryBackend::new();

        let first = backend.login_with_custom_id("abc", true).await.unwrap();
        let second = backend.login_with_custom_id("abc", true).await.unwrap();

        assert!(first.newly_created);
        assert!(!second.newly_created);
        assert_eq!(first.playfab_id, second.playfab_id);
        assert!(backend.login_with_custom_id("other", false).await.is_err());
    }

    #[tokio::test]
    async fn test_entity_token_requires_session() {
        let backend = MemoryBackend::new();
        assert!(backend.get_entity_token().await.is_err());

        let login = backend.login_with_custom_id("abc", true).await.unwrap();
        let entity = backend.get_entity_token().await.unwrap();
        assert_eq!(entity.id, format!("{}-ENTITY", login.playfab_id));

        backend.forget_credentials().await;
        assert!(!backend.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_seeded_timestamps_are_listed() {
        let backend = MemoryBackend::new();
        let old = Utc::now() - Duration::days(3);
        backend.seed_file(&entity(), "save_000", vec![0; 10], old).await;

        let listing = backend.get_files(&entity()).await.unwrap();
        assert_eq!(listing.files["save_000"].last_modified, old);
    }
}
