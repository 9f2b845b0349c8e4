//! Session credential tracking for PlayFab.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use pftoolkit_common::{Credential, EntityKey};

/// An entity token together with the entity it was issued for.
#[derive(Debug, Clone)]
pub struct EntityTokenGrant {
    /// Token sent as `X-EntityToken`.
    pub token: Credential,
    /// Entity the token authorizes.
    pub entity: EntityKey,
    /// When the token expires, if reported.
    pub expires_at: Option<DateTime<Utc>>,
}

impl EntityTokenGrant {
    /// Check if the token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 5 minutes remaining
        match self.expires_at {
            Some(expires_at) => expires_at < Utc::now() + Duration::minutes(5),
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    session_ticket: Option<Credential>,
    entity_token: Option<EntityTokenGrant>,
}

/// Holds the credentials issued by the last successful login.
///
/// Shared between the identity and file halves of the PlayFab backend.
#[derive(Debug, Default)]
pub struct SessionStore {
    state: RwLock<SessionState>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh login, replacing any previous session.
    pub async fn begin(
        &self,
        session_ticket: Option<Credential>,
        entity_token: Option<EntityTokenGrant>,
    ) {
        let mut state = self.state.write().await;
        state.session_ticket = session_ticket.filter(|t| !t.is_empty());
        state.entity_token = entity_token;
    }

    /// Replace the entity token after an explicit exchange.
    pub async fn update_entity_token(&self, grant: EntityTokenGrant) {
        self.state.write().await.entity_token = Some(grant);
    }

    /// Current session ticket, if logged in.
    pub async fn session_ticket(&self) -> Option<Credential> {
        self.state.read().await.session_ticket.clone()
    }

    /// Current entity token, unless missing or expired.
    pub async fn entity_token(&self) -> Option<Credential> {
        let state = self.state.read().await;
        state
            .entity_token
            .as_ref()
            .filter(|grant| !grant.is_expired())
            .map(|grant| grant.token.clone())
    }

    /// Whether any session credential is held.
    pub async fn is_active(&self) -> bool {
        let state = self.state.read().await;
        state.session_ticket.is_some() || state.entity_token.is_some()
    }

    /// Drop every credential. Returns whether a session was active.
    pub async fn clear(&self) -> bool {
        let mut state = self.state.write().await;
        let was_active = state.session_ticket.is_some() || state.entity_token.is_some();
        *state = SessionState::default();
        was_active
    }
}
