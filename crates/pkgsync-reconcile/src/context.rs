use std::sync::Arc;

use pkgsync_storage::{
    CacheInvalidator, ExtensionRegistry, ModelRegistry, ObjectStore, ResourceService,
    SchemaIntrospector, SchemaManager,
};

/// Type alias for a shareable object store.
pub type DynObjectStore = Arc<dyn ObjectStore>;

/// Every collaborator a reconciliation run talks to.
///
/// Reconcilers receive the pieces they need by reference; nothing is looked
/// up from global state.
#[derive(Clone)]
pub struct Collaborators {
    pub store: DynObjectStore,
    pub introspector: Arc<dyn SchemaIntrospector>,
    pub schema: Arc<dyn SchemaManager>,
    pub models: Arc<dyn ModelRegistry>,
    pub extensions: Arc<dyn ExtensionRegistry>,
    pub resources: Arc<dyn ResourceService>,
    pub cache: Arc<dyn CacheInvalidator>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("store", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}
