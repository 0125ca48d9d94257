//! Bounded map of conversation key to history.
//!
//! Eviction is strict FIFO by first insertion. Touching a session does not
//! move it to the back of the queue.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::history::{HistoryBuffer, HistoryStats, DEFAULT_CAPACITY};
use crate::error::BotResult;

/// Sessions kept alive unless configured otherwise.
pub const DEFAULT_MAX_SESSIONS: usize = 100;

/// Shared handle to one conversation. Holding its lock serializes that key.
pub type SessionHandle = Arc<Mutex<HistoryBuffer>>;

/// Stats for one live session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub key: String,
    pub capacity: usize,
    #[serde(flatten)]
    pub history: HistoryStats,
}

/// Stats across the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryStats {
    pub count: usize,
    pub max_sessions: usize,
    pub sessions: Vec<SessionStats>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, SessionHandle>,
    order: VecDeque<String>,
}

impl Inner {
    fn evict_for_insert(&mut self, max_sessions: usize) {
        while self.sessions.len() >= max_sessions {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.sessions.remove(&oldest).is_some() {
                tracing::info!(key = %oldest, "Evicted oldest session");
            }
        }
    }

    fn insert(&mut self, key: String, handle: SessionHandle, max_sessions: usize) {
        self.evict_for_insert(max_sessions);
        self.order.push_back(key.clone());
        self.sessions.insert(key, handle);
    }

    fn handles(&self) -> Vec<SessionHandle> {
        self.order
            .iter()
            .filter_map(|key| self.sessions.get(key).cloned())
            .collect()
    }
}

/// Registry of live conversation sessions.
pub struct SessionRegistry {
    inner: Mutex<Inner>,
    max_sessions: usize,
    history_capacity: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize, history_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_sessions: max_sessions.max(1),
            history_capacity,
        }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Existing session for `key`, or a fresh one inserted after evicting
    /// the oldest session when full.
    pub async fn get_or_create(&self, key: &str) -> SessionHandle {
        let mut inner = self.inner.lock().await;
        if let Some(handle) = inner.sessions.get(key) {
            return Arc::clone(handle);
        }

        let handle = Arc::new(Mutex::new(HistoryBuffer::new(key, self.history_capacity)));
        inner.insert(key.to_string(), Arc::clone(&handle), self.max_sessions);
        tracing::debug!(key = %key, sessions = inner.sessions.len(), "Created session");
        handle
    }

    /// Existing session for `key` without creating one.
    pub async fn get(&self, key: &str) -> Option<SessionHandle> {
        self.inner.lock().await.sessions.get(key).cloned()
    }

    /// Delete the session. Returns whether one existed.
    pub async fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let removed = inner.sessions.remove(key).is_some();
        if removed {
            inner.order.retain(|k| k != key);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.lock().await.sessions.contains_key(key)
    }

    /// Stats for one session, `None` when it does not exist.
    pub async fn stats_for(&self, key: &str) -> Option<SessionStats> {
        let handle = self.get(key).await?;
        let buffer = handle.lock().await;
        Some(session_stats(&buffer))
    }

    /// Stats for every session, oldest first.
    pub async fn stats_all(&self) -> RegistryStats {
        // Snapshot handles so per-session locks are not taken under the map lock.
        let handles = self.inner.lock().await.handles();

        let mut sessions = Vec::with_capacity(handles.len());
        for handle in handles {
            sessions.push(session_stats(&*handle.lock().await));
        }

        RegistryStats {
            count: sessions.len(),
            max_sessions: self.max_sessions,
            sessions,
        }
    }

    /// Portable snapshot of one session.
    pub async fn export(&self, key: &str) -> BotResult<Option<String>> {
        let Some(handle) = self.get(key).await else {
            return Ok(None);
        };
        let buffer = handle.lock().await;
        buffer.to_portable().map(Some)
    }

    /// Restore a snapshot under its own key. An existing session with that
    /// key is overwritten in place; a new key follows the eviction rule.
    pub async fn import(&self, portable: &str) -> BotResult<String> {
        let buffer = HistoryBuffer::from_portable(portable)?;
        let key = buffer.key().to_string();

        let existing = {
            let mut inner = self.inner.lock().await;
            match inner.sessions.get(&key) {
                Some(handle) => Some(Arc::clone(handle)),
                None => {
                    inner.insert(key.clone(), Arc::new(Mutex::new(buffer.clone())), self.max_sessions);
                    None
                }
            }
        };

        if let Some(handle) = existing {
            *handle.lock().await = buffer;
        }

        tracing::info!(key = %key, "Imported session");
        Ok(key)
    }

    /// Drop every session.
    pub async fn clear_all(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let count = inner.sessions.len();
        inner.sessions.clear();
        inner.order.clear();
        count
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS, DEFAULT_CAPACITY)
    }
}

fn session_stats(buffer: &HistoryBuffer) -> SessionStats {
    SessionStats {
        key: buffer.key().to_string(),
        capacity: buffer.capacity(),
        history: buffer.stats(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[tokio::test]
    async fn test_get_or_create_returns_same_handle() {
        let registry = SessionRegistry::default();
        let a = registry.get_or_create("C1").await;
        a.lock().await.append(Role::User, "hi");

        let b = registry.get_or_create("C1").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.lock().await.len(), 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_overflow_evicts_first_inserted() {
        let registry = SessionRegistry::new(100, DEFAULT_CAPACITY);
        for i in 0..101 {
            registry.get_or_create(&format!("C{i}")).await;
        }
        assert_eq!(registry.len().await, 100);
        assert!(!registry.contains("C0").await);
        assert!(registry.contains("C1").await);
        assert!(registry.contains("C100").await);
    }

    #[tokio::test]
    async fn test_eviction_is_fifo_not_lru() {
        let registry = SessionRegistry::new(2, DEFAULT_CAPACITY);
        registry.get_or_create("A").await;
        registry.get_or_create("B").await;
        // Touching A does not protect it.
        registry.get_or_create("A").await;
        registry.get_or_create("C").await;

        assert!(!registry.contains("A").await);
        assert!(registry.contains("B").await);
        assert!(registry.contains("C").await);
    }

    #[tokio::test]
    async fn test_remove_is_noop_for_missing_key() {
        let registry = SessionRegistry::default();
        registry.get_or_create("A").await;
        assert!(registry.remove("A").await);
        assert!(!registry.remove("A").await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_removed_key_does_not_count_toward_eviction() {
        let registry = SessionRegistry::new(2, DEFAULT_CAPACITY);
        registry.get_or_create("A").await;
        registry.get_or_create("B").await;
        registry.remove("A").await;
        registry.get_or_create("C").await;
        assert!(registry.contains("B").await);
        assert!(registry.contains("C").await);
    }

    #[tokio::test]
    async fn test_stats_report_missing_and_present() {
        let registry = SessionRegistry::new(5, 10);
        assert!(registry.stats_for("nope").await.is_none());

        let handle = registry.get_or_create("C1").await;
        handle.lock().await.append(Role::User, "hello");
        registry.get_or_create("C2").await;

        let one = registry.stats_for("C1").await.unwrap();
        assert_eq!(one.history.total, 1);
        assert_eq!(one.capacity, 10);

        let all = registry.stats_all().await;
        assert_eq!(all.count, 2);
        assert_eq!(all.max_sessions, 5);
        assert_eq!(all.sessions[0].key, "C1");
        assert_eq!(all.sessions[1].key, "C2");
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let source = SessionRegistry::default();
        let handle = source.get_or_create("C1").await;
        handle.lock().await.append(Role::User, "hi");
        handle.lock().await.append(Role::Model, "hello");

        let snapshot = source.export("C1").await.unwrap().unwrap();
        assert!(source.export("missing").await.unwrap().is_none());

        let target = SessionRegistry::new(1, DEFAULT_CAPACITY);
        target.get_or_create("other").await;
        let key = target.import(&snapshot).await.unwrap();

        assert_eq!(key, "C1");
        assert!(!target.contains("other").await);
        let restored = target.get("C1").await.unwrap();
        assert_eq!(*restored.lock().await, *handle.lock().await);
    }

    #[tokio::test]
    async fn test_import_overwrites_existing_session_in_place() {
        let registry = SessionRegistry::default();
        let handle = registry.get_or_create("C1").await;
        handle.lock().await.append(Role::User, "old");

        let mut replacement = HistoryBuffer::new("C1", 5);
        replacement.append(Role::User, "new");
        registry
            .import(&replacement.to_portable().unwrap())
            .await
            .unwrap();

        assert_eq!(handle.lock().await.turns().next().unwrap().text, "new");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear_all_empties_registry() {
        let registry = SessionRegistry::default();
        registry.get_or_create("A").await;
        registry.get_or_create("B").await;
        assert_eq!(registry.clear_all().await, 2);
        assert!(registry.is_empty().await);
    }
}
