use std::collections::BTreeMap;

use async_trait::async_trait;
use pkgsync_storage::{ExtensionRegistry, StorageError};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// A registered extension package.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionEntry {
    pub model_path: String,
    pub options: Map<String, Value>,
}

/// Extension package registry kept in memory, keyed by namespace.
#[derive(Debug, Default)]
pub struct InMemoryExtensions {
    entries: RwLock<BTreeMap<String, ExtensionEntry>>,
}

impl InMemoryExtensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, namespace: &str) -> Option<ExtensionEntry> {
        self.entries.read().await.get(namespace).cloned()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ExtensionRegistry for InMemoryExtensions {
    async fn add_extension_package(
        &self,
        namespace: &str,
        model_path: &str,
        options: &Map<String, Value>,
    ) -> Result<(), StorageError> {
        self.entries.write().await.insert(
            namespace.to_string(),
            ExtensionEntry {
                model_path: model_path.to_string(),
                options: options.clone(),
            },
        );
        Ok(())
    }

    async fn remove_extension_package(&self, namespace: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(namespace);
        Ok(())
    }
}
