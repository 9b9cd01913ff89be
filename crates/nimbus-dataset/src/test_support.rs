//! Shared in-memory fakes for unit tests.

use crate::error::{DatasetError, DatasetResult};
use crate::source::ObjectStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory object store.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Number of stored objects.
    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> DatasetResult<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| DatasetError::InvalidArgument(format!("object {bucket}/{key} not found")))
    }

    async fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> DatasetResult<()> {
        self.objects.lock().await.insert((bucket.to_string(), key.to_string()), data.to_vec());
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> DatasetResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .await
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
