//! Holder for the entity key that scopes file operations.

use tokio::sync::RwLock;

use pftoolkit_common::{EntityKey, Error, Result};

/// Mutable slot for the caller's entity key.
#[derive(Debug, Default)]
pub struct EntityContext {
    key: RwLock<Option<EntityKey>>,
}

impl EntityContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context that already holds `key`.
    pub fn with_key(key: EntityKey) -> Self {
        Self {
            key: RwLock::new(Some(key)),
        }
    }

    /// Replace the held key.
    pub async fn set(&self, key: EntityKey) {
        *self.key.write().await = Some(key);
    }

    /// Forget the held key.
    pub async fn clear(&self) {
        *self.key.write().await = None;
    }

    /// Current key, if set.
    pub async fn get(&self) -> Option<EntityKey> {
        self.key.read().await.clone()
    }

    /// Current key, or `MissingEntity`.
    pub async fn require(&self) -> Result<EntityKey> {
        self.get().await.ok_or(Error::MissingEntity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_require_before_set() {
        let context = EntityContext::new();
        assert!(matches!(context.require().await, Err(Error::MissingEntity)));
    }

    #[tokio::test]
    async fn test_set_and_clear() {
        let context = EntityContext::new();
        let key = EntityKey::new("E1", "title_player_account").unwrap();

        context.set(key.clone()).await;
        assert_eq!(context.require().await.unwrap(), key);

        context.clear().await;
        assert!(context.get().await.is_none());
    }
}
