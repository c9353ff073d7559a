use std::sync::Arc;

use crate::{
    InMemoryExtensions, InMemoryResourceService, InMemorySchema, InMemoryStore, RecordingCache,
};

/// Every in-memory collaborator, wired to share one object store.
///
/// Handles are `Arc`s so callers can keep a typed reference for inspection
/// while handing trait objects to the reconciler.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    pub store: Arc<InMemoryStore>,
    pub schema: Arc<InMemorySchema>,
    pub resources: Arc<InMemoryResourceService>,
    pub extensions: Arc<InMemoryExtensions>,
    pub cache: Arc<RecordingCache>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            resources: Arc::new(InMemoryResourceService::new(store.clone())),
            store,
            schema: Arc::new(InMemorySchema::new()),
            extensions: Arc::new(InMemoryExtensions::new()),
            cache: Arc::new(RecordingCache::new()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates a fresh in-memory backend.
pub fn create_backend() -> InMemoryBackend {
    InMemoryBackend::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgsync_storage::{EntityKind, ResourceService};
    use serde_json::{Map, Value};

    #[tokio::test]
    async fn test_resource_service_shares_store() {
        let backend = create_backend();
        let mut payload = Map::new();
        payload.insert("pagetitle".into(), Value::from("Home"));
        backend.resources.create_resource(&payload).await.unwrap();
        assert_eq!(backend.store.count(EntityKind::Resource), 1);
    }
}
