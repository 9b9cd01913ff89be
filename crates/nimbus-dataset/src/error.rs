use crate::poll::PollError;
use crate::source::SourceKind;
use std::time::Duration;
use thiserror::Error;

pub type DatasetResult<T> = std::result::Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("column length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("operation '{op}' requires a locally materialized source")]
    UnsupportedOperation { op: String },

    #[error("saving from a {from} source to a {to} source is not supported")]
    UnsupportedSave { from: SourceKind, to: SourceKind },

    #[error("save failed: {0}")]
    Save(String),

    #[error("remote {task} task ended in status '{status}'")]
    RemoteTask { task: String, status: String },

    #[error("polling timed out after {0:?}")]
    PollTimeout(Duration),

    #[error("polling was cancelled")]
    PollCancelled,

    #[error("archive would extract to {size} bytes, over the {limit} byte limit")]
    ArchiveTooLarge { size: u64, limit: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<PollError<DatasetError>> for DatasetError {
    fn from(err: PollError<DatasetError>) -> Self {
        match err {
            PollError::Timeout(elapsed) => Self::PollTimeout(elapsed),
            PollError::Cancelled => Self::PollCancelled,
            PollError::Task(inner) => inner,
        }
    }
}
