//! Service registry: builds and hands out the two gateways.

use std::sync::Arc;
use tracing::{error, info, warn};

use pftoolkit_backend::{
    BlobTransport, FileBackend, HttpTransport, IdentityBackend, MemoryBackend, PlayFabBackend,
};
use pftoolkit_common::Result;

use crate::auth::{AuthGateway, AuthService};
use crate::config::{BackendKind, ToolkitConfig};
use crate::files::{FileGateway, FileService};

/// The remote collaborators both gateways are built over.
pub struct Backends {
    /// Identity service.
    pub identity: Arc<dyn IdentityBackend>,
    /// File store.
    pub files: Arc<dyn FileBackend>,
    /// Raw byte transport for upload/download URLs.
    pub transport: Arc<dyn BlobTransport>,
}

impl Backends {
    /// PlayFab backends for `config`.
    ///
    /// Identity and file calls share one client so the session obtained at
    /// login authorizes the file calls.
    pub fn playfab(config: &ToolkitConfig) -> Result<Self> {
        let backend = Arc::new(PlayFabBackend::new(
            config.title_id()?,
            config.endpoint.as_deref(),
        )?);
        let transport = Arc::new(HttpTransport::with_client(backend.client().http().clone()));
        Ok(Self {
            identity: backend.clone(),
            files: backend,
            transport,
        })
    }

    /// All three roles served by one memory backend.
    pub fn from_memory(backend: Arc<MemoryBackend>) -> Self {
        Self {
            identity: backend.clone(),
            files: backend.clone(),
            transport: backend,
        }
    }
}

/// Factory building backends from configuration.
pub type BackendFactory = Box<dyn Fn(&ToolkitConfig) -> Result<Backends> + Send + Sync>;

/// Factory selecting backends by [`BackendKind`].
pub fn default_factory() -> BackendFactory {
    Box::new(|config| match config.backend {
        BackendKind::PlayFab => Backends::playfab(config),
        BackendKind::Memory => Ok(Backends::from_memory(Arc::new(MemoryBackend::new()))),
    })
}

/// Caller-owned registry for the toolkit services.
///
/// Initialize once at startup, then fetch [`AuthService`] and
/// [`FileService`] from it. The entity key is not wired from one to the
/// other; see [`FileService::set_entity`].
pub struct ServiceRegistry {
    factory: BackendFactory,
    config: Option<ToolkitConfig>,
    auth: Option<Arc<dyn AuthService>>,
    files: Option<Arc<dyn FileService>>,
    initialized: bool,
}

impl ServiceRegistry {
    /// Create an uninitialized registry using the default backend factory.
    pub fn new() -> Self {
        Self::with_factory(default_factory())
    }

    /// Create an uninitialized registry with a custom backend factory.
    pub fn with_factory(factory: BackendFactory) -> Self {
        Self {
            factory,
            config: None,
            auth: None,
            files: None,
            initialized: false,
        }
    }

    /// Initialize with `title_id` against the default endpoint.
    ///
    /// See [`initialize_with`](Self::initialize_with).
    pub fn initialize(&mut self, title_id: &str) -> bool {
        self.initialize_with(ToolkitConfig::new(title_id))
    }

    /// Build both gateways from `config`.
    ///
    /// Problems are logged, not returned: a second call is skipped with a
    /// warning, and an empty title id or a failing backend leaves the
    /// registry untouched. Returns whether this call initialized it.
    pub fn initialize_with(&mut self, config: ToolkitConfig) -> bool {
        if self.initialized {
            warn!("ServiceRegistry is already initialized. Skipping duplicate initialization.");
            return false;
        }

        let title_id = match config.title_id() {
            Ok(title_id) => title_id,
            Err(_) => {
                error!("PlayFab Title ID cannot be null or empty.");
                return false;
            }
        };

        let backends = match (self.factory)(&config) {
            Ok(backends) => backends,
            Err(e) => {
                error!(error = %e, "Failed to initialize PlayFab toolkit");
                return false;
            }
        };

        self.auth = Some(Arc::new(AuthGateway::new(backends.identity)));
        self.files = Some(Arc::new(FileGateway::new(backends.files, backends.transport)));
        self.config = Some(config);
        self.initialized = true;

        info!(title_id = %title_id, "PlayFab toolkit initialized");
        true
    }

    /// Reset, then initialize with `title_id`.
    pub fn reinitialize(&mut self, title_id: &str) -> bool {
        self.reset();
        self.initialize(title_id)
    }

    /// Drop both gateways and return to the uninitialized state.
    pub fn reset(&mut self) {
        self.auth = None;
        self.files = None;
        self.config = None;
        self.initialized = false;
    }

    /// Whether the registry has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Title id of the current initialization.
    pub fn title_id(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.title_id.as_str())
    }

    /// Configuration used by the last successful initialization.
    pub fn config(&self) -> Option<&ToolkitConfig> {
        self.config.as_ref()
    }

    /// Authentication service, once initialized.
    pub fn auth(&self) -> Option<Arc<dyn AuthService>> {
        self.auth.clone()
    }

    /// File service, once initialized.
    pub fn files(&self) -> Option<Arc<dyn FileService>> {
        self.files.clone()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use pftoolkit_backend::MemoryOp;
    use pftoolkit_common::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_registry() -> (Arc<AtomicUsize>, ServiceRegistry) {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let registry = ServiceRegistry::with_factory(Box::new(move |_config| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Backends::from_memory(Arc::new(MemoryBackend::new())))
        }));
        (builds, registry)
    }

    fn assert_empty(registry: &ServiceRegistry) {
        assert!(!registry.is_initialized());
        assert!(registry.auth().is_none());
        assert!(registry.files().is_none());
        assert!(registry.config().is_none());
        assert!(registry.title_id().is_none());
    }

    #[test]
    fn test_initialize_with_valid_title_id() {
        let (_, mut registry) = counting_registry();

        assert!(registry.initialize("TEST123"));
        assert!(registry.is_initialized());
        assert!(registry.auth().is_some());
        assert!(registry.files().is_some());
        assert_eq!(registry.title_id(), Some("TEST123"));
    }

    #[test]
    fn test_initialize_with_empty_title_id() {
        let (builds, mut registry) = counting_registry();

        assert!(!registry.initialize(""));
        assert!(!registry.initialize("   "));
        assert_empty(&registry);
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_initialize_twice_keeps_first_services() {
        let (builds, mut registry) = counting_registry();

        assert!(registry.initialize("TEST123"));
        let auth = registry.auth().unwrap();
        let files = registry.files().unwrap();

        assert!(!registry.initialize("OTHER"));
        assert!(registry.is_initialized());
        assert!(Arc::ptr_eq(&auth, &registry.auth().unwrap()));
        assert!(Arc::ptr_eq(&files, &registry.files().unwrap()));
        assert_eq!(registry.config().unwrap().title_id, "TEST123");
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_factory_failure_leaves_registry_empty() {
        let mut registry = ServiceRegistry::with_factory(Box::new(|_| {
            Err(Error::Config("backend unavailable".to_string()))
        }));

        assert!(!registry.initialize("TEST123"));
        assert_empty(&registry);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (_, mut registry) = counting_registry();

        registry.reset();
        assert_empty(&registry);

        registry.initialize("TEST123");
        registry.reset();
        assert_empty(&registry);
        registry.reset();
        assert_empty(&registry);
    }

    #[test]
    fn test_reinitialize_builds_new_services() {
        let (builds, mut registry) = counting_registry();

        registry.initialize("TEST123");
        let first = registry.auth().unwrap();

        assert!(registry.reinitialize("TEST456"));
        assert!(!Arc::ptr_eq(&first, &registry.auth().unwrap()));
        assert_eq!(registry.config().unwrap().title_id, "TEST456");
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_factory_builds_both_kinds() {
        let mut registry = ServiceRegistry::new();
        let memory = ToolkitConfig::new("TEST123").with_backend(BackendKind::Memory);
        assert!(registry.initialize_with(memory));

        let mut registry = ServiceRegistry::new();
        assert!(registry.initialize("TEST123"));
    }

    #[test]
    fn test_invalid_endpoint_is_logged_not_raised() {
        let mut registry = ServiceRegistry::new();
        let config = ToolkitConfig::new("TEST123").with_endpoint("not a url");

        assert!(!registry.initialize_with(config));
        assert_empty(&registry);
    }

    #[tokio::test]
    async fn test_login_upload_with_retention_end_to_end() {
        const OCTET: &str = "application/octet-stream";

        let memory = Arc::new(MemoryBackend::new());
        let shared = memory.clone();
        let mut registry = ServiceRegistry::with_factory(Box::new(move |_| {
            Ok(Backends::from_memory(shared.clone()))
        }));

        assert!(registry.initialize("T1"));
        let auth = registry.auth().unwrap();
        let files = registry.files().unwrap();

        auth.login_with_custom_id("abc").await.unwrap();
        let entity = auth.get_entity_token().await.unwrap();

        // No implicit hand-off: the file service has no entity yet.
        assert!(matches!(files.get_file_list().await, Err(Error::MissingEntity)));
        assert_eq!(memory.calls(MemoryOp::GetFiles).await, 0);

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for (i, name) in ["save_001", "save_002", "save_003", "save_004"].iter().enumerate() {
            memory
                .seed_file(&entity, name, vec![i as u8], base + Duration::hours(i as i64))
                .await;
        }
        memory.seed_file(&entity, "settings", vec![0], base - Duration::days(30)).await;

        files.set_entity(entity.clone()).await;
        files
            .upload_file_with_management(b"slot seven".to_vec(), "save_007", OCTET, "save_", 3)
            .await
            .unwrap();

        assert_eq!(
            memory.stored_names(&entity).await,
            vec!["save_003", "save_004", "save_007", "settings"]
        );
        assert_eq!(memory.calls(MemoryOp::DeleteFiles).await, 1);
        assert_eq!(files.download_file("save_007").await.unwrap(), b"slot seven");
    }
}
