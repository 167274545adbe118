//! Process-wide registry of live connection managers.
//!
//! Entries are inserted when a manager boots and removed exactly once when
//! its connection disconnects. Lookups come from the pipeline side, keyed by
//! the identity carried in the connection tag header.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::manager::connection::ConnectionManager;
use crate::manager::identity::ConnectionId;
use crate::observability::metrics;

/// A thread-safe map from connection identity to its manager.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<DashMap<ConnectionId, ConnectionManager>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manager under its identity.
    ///
    /// Returns `false` and leaves the registry untouched if the identity is
    /// already taken.
    pub fn insert(&self, manager: ConnectionManager) -> bool {
        let inserted = match self.inner.entry(manager.id().clone()) {
            Entry::Occupied(entry) => {
                tracing::error!(connection_id = %entry.key(), "Connection identity already registered");
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(manager);
                true
            }
        };
        // Shard locks are released here; len() takes them again.
        if inserted {
            metrics::record_registry_size(self.inner.len());
        }
        inserted
    }

    /// Remove a manager; returns it if it was present.
    pub fn remove(&self, id: &ConnectionId) -> Option<ConnectionManager> {
        let removed = self.inner.remove(id).map(|(_, manager)| manager);
        metrics::record_registry_size(self.inner.len());
        removed
    }

    /// Look up a manager by the raw identity string.
    pub fn get(&self, id: &str) -> Option<ConnectionManager> {
        self.inner.get(id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    /// Count live connections.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("connections", &self.inner.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeSettings;
    use crate::pipeline::pipeline_fn;
    use crate::protocol::Response;
    use crate::transport::testing::RecordingConnection;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(
            Arc::new(pipeline_fn(|_| async { Response::new(204, "") })),
            Arc::new(RecordingConnection::default()),
            Arc::new(BridgeSettings::default()),
        )
    }

    #[test]
    fn test_registry_operations() {
        let registry = Registry::new();
        let m = manager();
        let id = m.id().clone();

        assert!(registry.get(id.as_str()).is_none());
        assert!(registry.insert(m.clone()));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(id.as_str()));
        assert_eq!(registry.get(id.as_str()).map(|m| m.id().clone()), Some(id.clone()));

        // Same identity twice is refused.
        assert!(!registry.insert(m));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_distinct_managers_get_distinct_entries() {
        let registry = Registry::new();
        assert!(registry.insert(manager()));
        assert!(registry.insert(manager()));
        assert_eq!(registry.len(), 2);
    }
}
