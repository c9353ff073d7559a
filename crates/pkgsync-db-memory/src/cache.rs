use async_trait::async_trait;
use pkgsync_storage::{CachePartition, CacheInvalidator, StorageError};
use tokio::sync::RwLock;

/// Cache invalidator that records every refresh request.
#[derive(Debug, Default)]
pub struct RecordingCache {
    calls: RwLock<Vec<Vec<CachePartition>>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partitions passed to each `invalidate` call, oldest first.
    pub async fn calls(&self) -> Vec<Vec<CachePartition>> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl CacheInvalidator for RecordingCache {
    async fn invalidate(&self, partitions: &[CachePartition]) -> Result<(), StorageError> {
        self.calls.write().await.push(partitions.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls() {
        let cache = RecordingCache::new();
        cache
            .invalidate(&[CachePartition::Menu, CachePartition::Settings])
            .await
            .unwrap();
        assert_eq!(
            cache.calls().await,
            vec![vec![CachePartition::Menu, CachePartition::Settings]]
        );
    }
}
