//! Raw object-store data source.

use crate::error::{DatasetError, DatasetResult};
use crate::format::FormatType;
use crate::source::{
    BlobLocation, DataSource, ObjectStore, RawContent, SourceKind, TrainingSource,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// A source bound to a bucket/key in object storage. A key ending in `/`
/// is treated as a prefix and fetches every object under it.
#[derive(Clone)]
pub struct BlobDataSource {
    store: Arc<dyn ObjectStore>,
    location: BlobLocation,
    format: FormatType,
}

impl BlobDataSource {
    /// Creates a blob source. The format is inferred from the key suffix
    /// when possible, defaulting to JSON Lines for prefixes.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, location: BlobLocation) -> Self {
        let format = FormatType::from_path(std::path::Path::new(&location.key))
            .unwrap_or(FormatType::Jsonl);
        Self { store, location, format }
    }

    /// Overrides the inferred format.
    #[must_use]
    pub fn with_format(mut self, format: FormatType) -> Self {
        self.format = format;
        self
    }

    /// The bound location.
    pub fn location(&self) -> &BlobLocation {
        &self.location
    }

    fn decode(bytes: Vec<u8>) -> DatasetResult<String> {
        String::from_utf8(bytes)
            .map_err(|e| DatasetError::Format(format!("blob content is not UTF-8: {e}")))
    }
}

#[async_trait]
impl DataSource for BlobDataSource {
    async fn fetch(&self) -> DatasetResult<RawContent> {
        let BlobLocation { bucket, key, .. } = &self.location;
        if key.ends_with('/') {
            let keys = self.store.list_objects(bucket, key).await?;
            let mut parts = Vec::with_capacity(keys.len());
            for object_key in keys {
                let bytes = self.store.get_object(bucket, &object_key).await?;
                parts.push(Self::decode(bytes)?);
            }
            debug!(location = %self.location, objects = parts.len(), "fetched blob prefix");
            Ok(RawContent::Many(parts))
        } else {
            let bytes = self.store.get_object(bucket, key).await?;
            Ok(RawContent::Single(Self::decode(bytes)?))
        }
    }

    async fn save(&self, content: &str) -> DatasetResult<bool> {
        if self.location.key.ends_with('/') {
            return Err(DatasetError::InvalidArgument(format!(
                "cannot save to blob prefix {}: an object key is required",
                self.location
            )));
        }
        self.store
            .put_object(&self.location.bucket, &self.location.key, content.as_bytes())
            .await?;
        debug!(location = %self.location, bytes = content.len(), "saved blob source");
        Ok(true)
    }

    fn format_type(&self) -> FormatType {
        self.format
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Blob
    }

    fn supports_random_access(&self) -> bool {
        false
    }

    fn blob_location(&self) -> Option<&BlobLocation> {
        Some(&self.location)
    }

    async fn training_descriptor(&self) -> DatasetResult<Option<TrainingSource>> {
        Ok(Some(TrainingSource {
            kind: SourceKind::Blob,
            reference: self.location.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryObjectStore;

    #[tokio::test]
    async fn test_blob_round_trip() {
        let store = Arc::new(MemoryObjectStore::default());
        let source = BlobDataSource::new(store, BlobLocation::new("bucket", "sets/train.jsonl"));
        assert_eq!(source.format_type(), FormatType::Jsonl);
        assert!(source.save("{\"a\": 1}").await.unwrap());
        assert_eq!(
            source.fetch().await.unwrap(),
            RawContent::Single("{\"a\": 1}".to_string())
        );
    }

    #[tokio::test]
    async fn test_blob_prefix_fetches_many() {
        let store = Arc::new(MemoryObjectStore::default());
        store.put_object("bucket", "sets/a.jsonl", b"{\"a\": 1}").await.unwrap();
        store.put_object("bucket", "sets/b.jsonl", b"{\"a\": 2}").await.unwrap();
        let source = BlobDataSource::new(store, BlobLocation::new("bucket", "sets/"));
        match source.fetch().await.unwrap() {
            RawContent::Many(parts) => assert_eq!(parts.len(), 2),
            RawContent::Single(_) => panic!("expected one payload per object"),
        }
    }

    #[tokio::test]
    async fn test_blob_save_to_prefix_is_programmer_error() {
        let store = Arc::new(MemoryObjectStore::default());
        let source = BlobDataSource::new(store, BlobLocation::new("bucket", "sets/"));
        assert!(source.save("x").await.is_err());
    }

    #[test]
    fn test_blob_random_access_capability() {
        let store = Arc::new(MemoryObjectStore::default());
        let source = BlobDataSource::new(store, BlobLocation::new("bucket", "k.jsonl"));
        assert!(!source.supports_random_access());
    }
}
