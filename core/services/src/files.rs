//! File gateway: entity file storage with prefix-based retention.
//!
//! Every operation needs an entity key (see [`FileService::set_entity`]);
//! without one it fails with `MissingEntity` before touching the backend.
//!
//! Uploads follow the store's three-step protocol: initiate (get an upload
//! URL), raw PUT of the bytes, finalize. A failure at step two or three
//! leaves the initiated slot pending on the backend. No cleanup is
//! attempted; the slot is logged and the step's error returned.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use pftoolkit_backend::{BlobTransport, FileBackend, FileListing};
use pftoolkit_common::{EntityKey, Error, FileRecord, Result};

use crate::entity::EntityContext;
use crate::retention::RetentionPolicy;

/// File storage capability exposed to callers.
#[async_trait]
pub trait FileService: Send + Sync {
    /// Set the entity whose files are operated on.
    async fn set_entity(&self, entity: EntityKey);

    /// Forget the entity; subsequent operations fail with `MissingEntity`.
    async fn clear_entity(&self);

    /// Entity currently set, if any.
    async fn entity(&self) -> Option<EntityKey>;

    /// Upload `data` as `name`.
    async fn upload_file(&self, data: Vec<u8>, name: &str, content_type: &str) -> Result<()>;

    /// List every file owned by the entity, ordered by name.
    async fn get_file_list(&self) -> Result<Vec<FileRecord>>;

    /// Delete a single file.
    async fn delete_file(&self, name: &str) -> Result<()>;

    /// Download the bytes of `name`.
    ///
    /// # Errors
    /// - `NotFound` if no file has exactly this name
    async fn download_file(&self, name: &str) -> Result<Vec<u8>>;

    /// Files whose name starts with `prefix`, ordered by name.
    async fn get_files_by_prefix(&self, prefix: &str) -> Result<Vec<FileRecord>>;

    /// Upload, then keep at most `max_files` files under `prefix`.
    ///
    /// Only the upload decides the result; a failed cleanup is logged.
    async fn upload_file_with_management(
        &self,
        data: Vec<u8>,
        name: &str,
        content_type: &str,
        prefix: &str,
        max_files: usize,
    ) -> Result<()>;

    /// Delete the oldest files under `prefix` until `max_files_to_keep` remain.
    ///
    /// Returns how many files were deleted.
    async fn cleanup_files_by_prefix(&self, prefix: &str, max_files_to_keep: usize)
        -> Result<usize>;

    /// Delete every file under `prefix`. Returns how many were deleted.
    async fn delete_files_by_prefix(&self, prefix: &str) -> Result<usize>;

    /// Delete `names` in one batch. An empty list is a no-op.
    async fn delete_files(&self, names: &[String]) -> Result<()>;
}

/// [`FileService`] implementation over a [`FileBackend`] and a [`BlobTransport`].
pub struct FileGateway {
    backend: Arc<dyn FileBackend>,
    transport: Arc<dyn BlobTransport>,
    entity: EntityContext,
}

impl FileGateway {
    /// Create a gateway with no entity set.
    pub fn new(backend: Arc<dyn FileBackend>, transport: Arc<dyn BlobTransport>) -> Self {
        Self {
            backend,
            transport,
            entity: EntityContext::new(),
        }
    }

    /// Create a gateway already bound to `entity`.
    pub fn with_entity(
        backend: Arc<dyn FileBackend>,
        transport: Arc<dyn BlobTransport>,
        entity: EntityKey,
    ) -> Self {
        Self {
            backend,
            transport,
            entity: EntityContext::with_key(entity),
        }
    }

    async fn list(&self, entity: &EntityKey) -> Result<Vec<FileRecord>> {
        let listing = self.backend.get_files(entity).await?;
        Ok(records_from_listing(listing))
    }

    async fn list_by_prefix(&self, entity: &EntityKey, prefix: &str) -> Result<Vec<FileRecord>> {
        let mut files = self.list(entity).await?;
        files.retain(|f| f.has_prefix(prefix));
        Ok(files)
    }

    async fn delete_batch(&self, entity: &EntityKey, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        debug!(count = names.len(), "Deleting files");
        self.backend.delete_files(entity, names).await
    }
}

/// Map the store's name-keyed metadata into records ordered by name.
fn records_from_listing(listing: FileListing) -> Vec<FileRecord> {
    let mut records: Vec<FileRecord> = listing
        .files
        .into_iter()
        .map(|(name, file)| FileRecord {
            name,
            download_url: file.download_url,
            size_bytes: file.size,
            last_modified: file.last_modified,
        })
        .collect();
    records.sort_by(|a, b| a.name.cmp(&b.name));
    records
}

fn require_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("File name cannot be empty".to_string()));
    }
    Ok(())
}

#[async_trait]
impl FileService for FileGateway {
    async fn set_entity(&self, entity: EntityKey) {
        debug!(entity = %entity, "Entity set for file operations");
        self.entity.set(entity).await;
    }

    async fn clear_entity(&self) {
        self.entity.clear().await;
    }

    async fn entity(&self) -> Option<EntityKey> {
        self.entity.get().await
    }

    async fn upload_file(&self, data: Vec<u8>, name: &str, content_type: &str) -> Result<()> {
        let entity = self.entity.require().await?;
        require_name(name)?;

        let names = vec![name.to_string()];
        let size = data.len();

        let initiated = self.backend.initiate_uploads(&entity, &names).await?;
        let slot = initiated
            .slot_for(name)
            .ok_or_else(|| Error::Remote(format!("No upload URL returned for {}", name)))?;
        debug!(file = name, "Upload slot issued");

        if let Err(e) = self.transport.put(&slot.upload_url, data, content_type).await {
            warn!(file = name, error = %e, "Raw upload failed; upload slot left pending");
            return Err(e);
        }

        if let Err(e) = self
            .backend
            .finalize_uploads(&entity, &names, initiated.profile_version)
            .await
        {
            warn!(file = name, error = %e, "Finalize failed; upload slot left pending");
            return Err(e);
        }

        info!(file = name, bytes = size, "File uploaded");
        Ok(())
    }

    async fn get_file_list(&self) -> Result<Vec<FileRecord>> {
        let entity = self.entity.require().await?;
        self.list(&entity).await
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        self.entity.require().await?;
        require_name(name)?;
        self.delete_files(&[name.to_string()]).await
    }

    async fn download_file(&self, name: &str) -> Result<Vec<u8>> {
        let entity = self.entity.require().await?;
        require_name(name)?;

        let files = self.list(&entity).await?;
        let record = files
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", name)))?;

        let data = self.transport.get(&record.download_url).await?;
        debug!(file = name, bytes = data.len(), "File downloaded");
        Ok(data)
    }

    async fn get_files_by_prefix(&self, prefix: &str) -> Result<Vec<FileRecord>> {
        let entity = self.entity.require().await?;
        self.list_by_prefix(&entity, prefix).await
    }

    async fn upload_file_with_management(
        &self,
        data: Vec<u8>,
        name: &str,
        content_type: &str,
        prefix: &str,
        max_files: usize,
    ) -> Result<()> {
        self.upload_file(data, name, content_type).await?;

        match self.cleanup_files_by_prefix(prefix, max_files).await {
            Ok(deleted) => {
                debug!(prefix, deleted, "Retention cleanup after upload");
            }
            Err(e) => {
                warn!(prefix, error = %e, "Cleanup after upload failed");
            }
        }
        Ok(())
    }

    async fn cleanup_files_by_prefix(
        &self,
        prefix: &str,
        max_files_to_keep: usize,
    ) -> Result<usize> {
        let entity = self.entity.require().await?;

        let policy = RetentionPolicy::new(prefix, max_files_to_keep);
        let files = self.list(&entity).await?;
        let evicted: Vec<String> = policy
            .evictions(&files)
            .into_iter()
            .map(|f| f.name)
            .collect();

        if evicted.is_empty() {
            debug!(prefix, max_files_to_keep, "Nothing to clean up");
            return Ok(0);
        }

        self.delete_batch(&entity, &evicted).await?;
        info!(prefix, deleted = evicted.len(), kept = max_files_to_keep, "Old files removed");
        Ok(evicted.len())
    }

    async fn delete_files_by_prefix(&self, prefix: &str) -> Result<usize> {
        let entity = self.entity.require().await?;

        let names: Vec<String> = self
            .list_by_prefix(&entity, prefix)
            .await?
            .into_iter()
            .map(|f| f.name)
            .collect();

        self.delete_batch(&entity, &names).await?;
        info!(prefix, deleted = names.len(), "Files deleted by prefix");
        Ok(names.len())
    }

    async fn delete_files(&self, names: &[String]) -> Result<()> {
        let entity = self.entity.require().await?;
        self.delete_batch(&entity, names).await
    }
}
