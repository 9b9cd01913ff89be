//! Data source abstraction.
//!
//! A [`DataSource`] is where dataset bytes live: a local file or directory,
//! a managed dataset owned by the remote platform, or a raw object-store
//! location. Sources declare their capabilities explicitly — the dataset
//! layer checks [`DataSource::supports_random_access`] before any mutating
//! table operation instead of guessing from the concrete type.

mod blob;
mod file;
mod managed;

pub use blob::BlobDataSource;
pub use file::FileDataSource;
pub use managed::{
    CacheInfo, DatasetBackend, ExportRecord, ExportStatus, ImportStatus, ManagedDataSource,
    ManagedDatasetId, ManagedSourceConfig, ReleaseStatus, RemoteDatasetInfo, SetKind,
    TemplateType,
};

use crate::error::{DatasetError, DatasetResult};
use crate::format::FormatType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminates the backing store family of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Local file or directory.
    File,
    /// Managed dataset with a remote lifecycle (release/export/import).
    Managed,
    /// Raw object-store location, no managed lifecycle.
    Blob,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Managed => f.write_str("managed"),
            Self::Blob => f.write_str("blob"),
        }
    }
}

/// Raw content fetched from a source: one payload, or one per matched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawContent {
    /// A single payload.
    Single(String),
    /// One payload per matched file or object.
    Many(Vec<String>),
}

impl RawContent {
    /// Flattens into a list of payloads.
    #[must_use]
    pub fn into_parts(self) -> Vec<String> {
        match self {
            Self::Single(content) => vec![content],
            Self::Many(parts) => parts,
        }
    }
}

/// An object-store location (bucket plus object key or key prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobLocation {
    pub bucket: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl BlobLocation {
    /// Creates a location from a bucket and key.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), key: key.into(), region: None }
    }
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Default input/reference columns implied by a source's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInference {
    pub input_columns: Vec<String>,
    pub reference_column: Option<String>,
}

/// Platform-facing descriptor of a source a training job can read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSource {
    pub kind: SourceKind,
    /// Managed dataset version identity or blob path, per `kind`.
    pub reference: String,
}

/// Object-store client collaborator (byte upload/download/listing).
///
/// Implementations wrap the actual blob service; tests use an in-memory
/// store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Downloads an object.
    async fn get_object(&self, bucket: &str, key: &str) -> DatasetResult<Vec<u8>>;

    /// Uploads an object, replacing any existing one.
    async fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> DatasetResult<()>;

    /// Lists object keys under a prefix.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> DatasetResult<Vec<String>>;
}

/// A polymorphic dataset storage backend.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetches the raw content of the source.
    async fn fetch(&self) -> DatasetResult<RawContent>;

    /// Persists serialized content to the source.
    ///
    /// Expected failure modes (e.g. a remote import ending in a failed
    /// status) return `Ok(false)`; programmer errors (missing required
    /// arguments) are `Err`.
    async fn save(&self, content: &str) -> DatasetResult<bool>;

    /// The file format this source stores.
    fn format_type(&self) -> FormatType;

    /// The backing store family.
    fn kind(&self) -> SourceKind;

    /// Whether the content is locally materialized, making random-access
    /// table operations legal on a dataset backed by this source.
    fn supports_random_access(&self) -> bool;

    /// Imports content already sitting at a blob location, skipping the
    /// content upload. Only managed sources support this.
    async fn import_from_blob(&self, location: &BlobLocation) -> DatasetResult<bool> {
        Err(DatasetError::InvalidArgument(format!(
            "a {} source cannot import from blob location {location}",
            self.kind()
        )))
    }

    /// Default I/O columns implied by the source's metadata, when known.
    fn inferred_columns(&self) -> Option<ColumnInference> {
        None
    }

    /// The object-store location backing this source, for sources that
    /// have one.
    fn blob_location(&self) -> Option<&BlobLocation> {
        None
    }

    /// Readies the source for consumption by a remote training job and
    /// returns the platform descriptor for it. Sources a training job
    /// cannot read return `Ok(None)`.
    async fn training_descriptor(&self) -> DatasetResult<Option<TrainingSource>> {
        Ok(None)
    }
}
