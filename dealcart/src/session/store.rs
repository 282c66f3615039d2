//! Anonymous session identity.

use super::storage::KeyValueStorage;
use crate::error::StorageResult;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Outcome of offering a session id to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// The store held no id and now holds this one.
    Adopted(String),
    /// The store already held an id; the offered one was ignored.
    Kept(String),
    /// The offered id was empty.
    Ignored,
}

impl SessionUpdate {
    /// Whether the offered id became the active one.
    #[must_use]
    pub const fn is_adopted(&self) -> bool {
        matches!(self, Self::Adopted(_))
    }
}

/// Owns the anonymous session id and its persisted copy.
///
/// Setting is first-writer-wins: once an id is held, later offers are
/// ignored until [`clear_session_id`](Self::clear_session_id). Offers and
/// clears are serialized by one lock, so two racing responses cannot both
/// install an id.
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    current: RwLock<Option<String>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Open the store, restoring any persisted id.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted entry cannot be read.
    pub async fn open(
        storage: Arc<dyn KeyValueStorage>,
        key: impl Into<String>,
    ) -> StorageResult<Self> {
        let key = key.into();
        let current = storage
            .load(&key)
            .await?
            .filter(|id| !id.trim().is_empty());
        if let Some(id) = &current {
            debug!(session_id = %id, "restored session");
        }
        Ok(Self {
            storage,
            key,
            current: RwLock::new(current),
        })
    }

    /// An empty store that is not backed by any persisted entry yet.
    pub fn empty(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            current: RwLock::new(None),
        }
    }

    /// Storage key of the persisted id.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The active session id, if any.
    pub async fn session_id(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    /// Offer a session id. Ignored if one is already held.
    ///
    /// The in-memory id is installed before persisting, so a storage failure
    /// still leaves the id usable for this process.
    ///
    /// # Errors
    ///
    /// Returns an error if the adopted id could not be persisted.
    pub async fn set_session_id(&self, id: &str) -> StorageResult<SessionUpdate> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(SessionUpdate::Ignored);
        }

        let mut current = self.current.write().await;
        if let Some(existing) = current.as_ref() {
            if existing != id {
                debug!(session_id = %existing, offered = %id, "session already set, keeping");
            }
            return Ok(SessionUpdate::Kept(existing.clone()));
        }

        *current = Some(id.to_string());
        info!(session_id = %id, "session adopted");
        self.storage.save(&self.key, id).await?;
        Ok(SessionUpdate::Adopted(id.to_string()))
    }

    /// Offer an optional server-issued id, logging instead of failing.
    pub async fn adopt(&self, candidate: Option<&str>) -> SessionUpdate {
        let Some(id) = candidate else {
            return SessionUpdate::Ignored;
        };
        match self.set_session_id(id).await {
            Ok(update) => update,
            Err(e) => {
                warn!(error = %e, "failed to persist session id, keeping it in memory");
                SessionUpdate::Adopted(id.trim().to_string())
            }
        }
    }

    /// Forget the session id, in memory and in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted entry could not be removed. The
    /// in-memory id is cleared regardless.
    pub async fn clear_session_id(&self) -> StorageResult<()> {
        let mut current = self.current.write().await;
        if let Some(id) = current.take() {
            info!(session_id = %id, "session cleared");
        }
        self.storage.delete(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::storage::{FileStorage, MemoryStorage};
    use super::*;
    use crate::error::StorageError;
    use async_trait::async_trait;

    fn memory() -> Arc<dyn KeyValueStorage> {
        Arc::new(MemoryStorage::new())
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let store = SessionStore::open(memory(), "dealSessionId").await.unwrap();
        assert_eq!(store.session_id().await, None);

        let first = store.set_session_id("s1").await.unwrap();
        assert_eq!(first, SessionUpdate::Adopted("s1".into()));

        let second = store.set_session_id("s2").await.unwrap();
        assert_eq!(second, SessionUpdate::Kept("s1".into()));
        assert_eq!(store.session_id().await.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn test_clear_then_set() {
        let store = SessionStore::open(memory(), "dealSessionId").await.unwrap();
        store.set_session_id("s1").await.unwrap();
        store.clear_session_id().await.unwrap();
        assert_eq!(store.session_id().await, None);

        assert!(store.set_session_id("s2").await.unwrap().is_adopted());
        assert_eq!(store.session_id().await.as_deref(), Some("s2"));
    }

    #[tokio::test]
    async fn test_empty_offer_ignored() {
        let store = SessionStore::open(memory(), "dealSessionId").await.unwrap();
        assert_eq!(
            store.set_session_id("   ").await.unwrap(),
            SessionUpdate::Ignored
        );
        assert_eq!(store.adopt(None).await, SessionUpdate::Ignored);
        assert_eq!(store.session_id().await, None);
    }

    #[tokio::test]
    async fn test_concurrent_offers_settle_on_one() {
        let store = SessionStore::open(memory(), "dealSessionId").await.unwrap();
        let (a, b) = tokio::join!(store.adopt(Some("a")), store.adopt(Some("b")));
        let adopted = [a, b].into_iter().filter(SessionUpdate::is_adopted).count();
        assert_eq!(adopted, 1);
        let held = store.session_id().await.unwrap();
        assert!(held == "a" || held == "b");
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(dir.path()));

        let store = SessionStore::open(Arc::clone(&storage), "dealSessionId")
            .await
            .unwrap();
        store.set_session_id("persisted").await.unwrap();
        drop(store);

        let reopened = SessionStore::open(storage, "dealSessionId").await.unwrap();
        assert_eq!(reopened.session_id().await.as_deref(), Some("persisted"));

        reopened.clear_session_id().await.unwrap();
        let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(dir.path()));
        let again = SessionStore::open(storage, "dealSessionId").await.unwrap();
        assert_eq!(again.session_id().await, None);
    }

    struct BrokenStorage;

    #[async_trait]
    impl KeyValueStorage for BrokenStorage {
        async fn load(&self, _key: &str) -> StorageResult<Option<String>> {
            Ok(None)
        }

        async fn save(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }

        async fn delete(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_id_in_memory() {
        let store = SessionStore::empty(Arc::new(BrokenStorage), "dealSessionId");
        assert!(store.set_session_id("s1").await.is_err());
        assert_eq!(store.session_id().await.as_deref(), Some("s1"));

        // A later offer still cannot overwrite it.
        assert_eq!(
            store.adopt(Some("s2")).await,
            SessionUpdate::Kept("s1".into())
        );
    }
}
