//! Dataset engine for Nimbus.
//!
//! Layers a columnar [`Table`] with row/column edits and conversation
//! pack/unpack under a source-aware [`Dataset`], backed by polymorphic
//! [`source::DataSource`] implementations for local files, managed remote
//! datasets, and raw object storage.

pub mod dataset;
pub mod error;
pub mod format;
pub mod poll;
pub mod schema;
pub mod source;
pub mod table;

#[cfg(test)]
pub(crate) mod test_support;

pub use dataset::{Dataset, LoadOptions, SaveOptions};
pub use error::{DatasetError, DatasetResult};
pub use format::{FormatType, ParsedContent};
pub use poll::{PollError, Poller};
pub use schema::{ColumnSchema, Schema};
pub use source::{
    BlobDataSource, BlobLocation, ColumnInference, DataSource, DatasetBackend, FileDataSource,
    ManagedDataSource, ManagedDatasetId, ManagedSourceConfig, ObjectStore, RawContent, SourceKind,
    TemplateType, TrainingSource,
};
pub use table::{BatchDispatcher, BatchTask, Column, Row, Table, GROUP_COLUMN, PACK_COLUMN};
