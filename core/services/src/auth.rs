//! Authentication gateway.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use pftoolkit_backend::IdentityBackend;
use pftoolkit_common::{EntityKey, Error, Result};

use crate::validation::{is_valid_credentials, is_valid_email};

/// Result of a successful email login or registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    /// Human readable status, e.g. "Login successful".
    pub message: String,
    /// Display name of the player, when known.
    pub display_name: Option<String>,
}

/// Authentication capability exposed to callers.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Log in with email and password.
    ///
    /// # Errors
    /// - `InvalidInput("Invalid input")` if the email or password is malformed;
    ///   no remote call is made
    /// - `Remote` with the backend's error report
    async fn login_with_email(&self, email: &str, password: &str) -> Result<AuthOutcome>;

    /// Register a new account by email with a display name.
    ///
    /// # Errors
    /// - `InvalidInput("Invalid input")` if any field is malformed
    /// - `Remote` with the backend's error report
    async fn register_with_email(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthOutcome>;

    /// Log in with a custom id, creating the account when needed.
    ///
    /// Returns the PlayFab player id.
    async fn login_with_custom_id(&self, custom_id: &str) -> Result<String>;

    /// Forget local session credentials. Never contacts the backend.
    async fn logout(&self);

    /// Request a password recovery email.
    async fn reset_password(&self, email: &str) -> Result<String>;

    /// Exchange the current session for an entity key.
    ///
    /// The key is what the file service needs; pass it to
    /// [`FileService::set_entity`](crate::FileService::set_entity).
    async fn get_entity_token(&self) -> Result<EntityKey>;

    /// Display name cached by the last successful login or registration.
    async fn display_name(&self) -> Option<String>;
}

/// [`AuthService`] implementation over an [`IdentityBackend`].
pub struct AuthGateway {
    backend: Arc<dyn IdentityBackend>,
    display_name: RwLock<Option<String>>,
}

impl AuthGateway {
    /// Create a gateway over `backend`.
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        Self {
            backend,
            display_name: RwLock::new(None),
        }
    }
}

#[async_trait]
impl AuthService for AuthGateway {
    async fn login_with_email(&self, email: &str, password: &str) -> Result<AuthOutcome> {
        if !is_valid_credentials(email, password, None) {
            return Err(Error::InvalidInput("Invalid input".to_string()));
        }

        debug!(backend = self.backend.name(), "Logging in with email");
        let result = self.backend.login_with_email(email, password, true).await?;

        *self.display_name.write().await = result.display_name.clone();
        info!(playfab_id = %result.playfab_id, "Login successful");

        Ok(AuthOutcome {
            message: "Login successful".to_string(),
            display_name: result.display_name,
        })
    }

    async fn register_with_email(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthOutcome> {
        if !is_valid_credentials(email, password, Some(display_name)) {
            return Err(Error::InvalidInput("Invalid input".to_string()));
        }

        debug!(backend = self.backend.name(), "Registering with email");
        let result = self
            .backend
            .register_with_email(email, password, display_name)
            .await?;

        *self.display_name.write().await = Some(display_name.to_string());
        info!(playfab_id = %result.playfab_id, "Registration successful");

        Ok(AuthOutcome {
            message: "Registration successful".to_string(),
            display_name: Some(display_name.to_string()),
        })
    }

    async fn login_with_custom_id(&self, custom_id: &str) -> Result<String> {
        if custom_id.is_empty() {
            return Err(Error::InvalidInput("Custom ID cannot be empty.".to_string()));
        }

        debug!(backend = self.backend.name(), "Logging in with custom id");
        let result = self.backend.login_with_custom_id(custom_id, true).await?;
        info!(
            playfab_id = %result.playfab_id,
            newly_created = result.newly_created,
            "Custom id login successful"
        );
        Ok(result.playfab_id)
    }

    async fn logout(&self) {
        if self.backend.is_logged_in().await {
            self.backend.forget_credentials().await;
            info!("Logged out");
        }
        *self.display_name.write().await = None;
    }

    async fn reset_password(&self, email: &str) -> Result<String> {
        if !is_valid_email(email) {
            return Err(Error::InvalidInput("Invalid email format".to_string()));
        }

        self.backend.send_account_recovery_email(email).await?;
        info!("Password reset email requested");
        Ok("Password reset email sent!".to_string())
    }

    async fn get_entity_token(&self) -> Result<EntityKey> {
        let entity = self.backend.get_entity_token().await?;
        debug!(entity = %entity, "Entity token obtained");
        Ok(entity)
    }

    async fn display_name(&self) -> Option<String> {
        self.display_name.read().await.clone()
    }
}
