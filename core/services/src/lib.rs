//! Gameplay-facing services for the PlayFab toolkit.
//!
//! Two capability interfaces are exposed:
//! - [`AuthService`]: login, registration, password recovery, entity token
//! - [`FileService`]: entity file storage with prefix-based retention
//!
//! [`ServiceRegistry`] builds both from a title id. The entity key obtained
//! from [`AuthService::get_entity_token`] must be handed to
//! [`FileService::set_entity`] by the caller; nothing wires it implicitly.

pub mod auth;
pub mod config;
pub mod entity;
pub mod files;
pub mod registry;
pub mod retention;
pub mod validation;

pub use auth::{AuthGateway, AuthOutcome, AuthService};
pub use config::{BackendKind, ToolkitConfig};
pub use entity::EntityContext;
pub use files::{FileGateway, FileService};
pub use registry::{BackendFactory, Backends, ServiceRegistry};
pub use retention::{select_evictions, RetentionPolicy};
