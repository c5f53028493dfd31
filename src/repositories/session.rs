use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::SessionError;
use crate::models::session::{Entry, SessionId};

/// Persistence for session entries.
///
/// Implementations must make every operation atomic per key, and must never
/// let `recollect_garbage` race with a concurrent `save` of the same key.
pub trait SessionStore: Send + Sync {
    /// Upserts the entry keyed by its id.
    fn save(&self, entry: Entry) -> BoxFuture<'_, Result<(), SessionError>>;

    /// Returns the entry for `id`, without checking its expiry.
    fn get<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, Result<Entry, SessionError>>;

    /// Removes the entry for `id`. Removing a missing entry is not an error.
    fn delete<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, Result<(), SessionError>>;

    /// Removes every entry belonging to `user_id`.
    fn invalidate(&self, user_id: i64) -> BoxFuture<'_, Result<(), SessionError>>;

    /// Removes every entry of the entry's principal and saves `entry`, as one
    /// atomic step: concurrent calls for one principal leave exactly one entry.
    fn replace_for_user(&self, entry: Entry) -> BoxFuture<'_, Result<(), SessionError>>;

    /// Removes every expired entry.
    fn recollect_garbage(&self) -> BoxFuture<'_, Result<(), SessionError>>;
}

/// In-memory [`SessionStore`]: one map behind one lock.
#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<SessionId, Entry>>>,
}

impl MemoryStore {
    /// Creates a new, empty `MemoryStore`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.values.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.lock().await.is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, entry: Entry) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            self.values.lock().await.insert(entry.id.clone(), entry);
            Ok(())
        })
    }

    fn get<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, Result<Entry, SessionError>> {
        Box::pin(async move {
            self.values
                .lock()
                .await
                .get(id)
                .cloned()
                .ok_or_else(|| SessionError::EntryNotFound(id.to_string()))
        })
    }

    fn delete<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            self.values.lock().await.remove(id);
            Ok(())
        })
    }

    fn invalidate(&self, user_id: i64) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            let mut values = self.values.lock().await;
            let before = values.len();
            values.retain(|_, entry| entry.user.id != user_id);
            tracing::debug!(
                "Invalidated {} session(s) for user {}",
                before - values.len(),
                user_id
            );
            Ok(())
        })
    }

    fn replace_for_user(&self, entry: Entry) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            let mut values = self.values.lock().await;
            let user_id = entry.user.id;
            values.retain(|_, existing| existing.user.id != user_id);
            values.insert(entry.id.clone(), entry);
            Ok(())
        })
    }

    fn recollect_garbage(&self) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            let now = Utc::now();
            let mut values = self.values.lock().await;
            let before = values.len();
            values.retain(|_, entry| entry.is_valid_at(now));
            let collected = before - values.len();
            if collected > 0 {
                tracing::debug!("Collected {} expired session(s)", collected);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{Role, User};
    use chrono::Duration;

    fn entry(id: &str, user_id: i64, ttl_secs: i64) -> Entry {
        Entry {
            id: SessionId::new(id),
            user: User {
                id: user_id,
                name: format!("user-{user_id}"),
                roles: vec![Role::User],
                avatar: String::new(),
            },
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    #[tokio::test]
    async fn save_then_get_returns_the_entry() {
        let store = MemoryStore::new();
        store.save(entry("a", 1, 60)).await.unwrap();

        let found = store.get(&SessionId::new("a")).await.unwrap();
        assert_eq!(found.user.id, 1);
    }

    #[tokio::test]
    async fn save_overwrites_the_same_id() {
        let store = MemoryStore::new();
        store.save(entry("a", 1, 60)).await.unwrap();
        store.save(entry("a", 2, 60)).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&SessionId::new("a")).await.unwrap().user.id, 2);
    }

    #[tokio::test]
    async fn missing_entries_are_reported() {
        let store = MemoryStore::new();
        let err = store.get(&SessionId::new("nope")).await.unwrap_err();
        assert!(matches!(err, SessionError::EntryNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn get_does_not_filter_expired_entries() {
        let store = MemoryStore::new();
        store.save(entry("old", 1, -5)).await.unwrap();
        assert!(store.get(&SessionId::new("old")).await.is_ok());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        let id = SessionId::new("a");
        store.save(entry("a", 1, 60)).await.unwrap();

        store.delete(&id).await.unwrap();
        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.is_err());
    }

    #[tokio::test]
    async fn invalidate_removes_only_that_principal() {
        let store = MemoryStore::new();
        store.save(entry("a1", 1, 60)).await.unwrap();
        store.save(entry("a2", 1, 60)).await.unwrap();
        store.save(entry("b1", 2, 60)).await.unwrap();

        store.invalidate(1).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert!(store.get(&SessionId::new("b1")).await.is_ok());
    }

    #[tokio::test]
    async fn replace_for_user_keeps_only_the_new_entry() {
        let store = MemoryStore::new();
        store.save(entry("a1", 1, 60)).await.unwrap();
        store.save(entry("a2", 1, 60)).await.unwrap();
        store.save(entry("b1", 2, 60)).await.unwrap();

        store.replace_for_user(entry("a3", 1, 60)).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.get(&SessionId::new("a1")).await.is_err());
        assert!(store.get(&SessionId::new("a2")).await.is_err());
        assert!(store.get(&SessionId::new("a3")).await.is_ok());
        assert!(store.get(&SessionId::new("b1")).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_replaces_leave_one_entry_per_user() {
        let store = MemoryStore::new();
        let mut tasks = Vec::new();
        for i in 0..64 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .replace_for_user(entry(&format!("s{i}"), 1, 60))
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn garbage_collection_drops_expired_entries() {
        let store = MemoryStore::new();
        store.save(entry("live", 1, 60)).await.unwrap();
        store.save(entry("dead", 2, -1)).await.unwrap();

        store.recollect_garbage().await.unwrap();

        assert!(store.get(&SessionId::new("live")).await.is_ok());
        assert!(store.get(&SessionId::new("dead")).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_saves_are_all_visible() {
        let store = MemoryStore::new();
        let mut tasks = Vec::new();
        for i in 0..64 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.save(entry(&format!("s{i}"), i, 60)).await.unwrap();
                store.recollect_garbage().await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(store.len().await, 64);
    }
}
