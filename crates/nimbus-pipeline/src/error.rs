use crate::state::ActionState;
use nimbus_abstraction::ModelError;
use nimbus_dataset::poll::PollError;
use nimbus_dataset::DatasetError;
use std::time::Duration;
use thiserror::Error;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid train config: {0}")]
    InvalidTrainConfig(String),

    #[error("remote {task} task ended in status '{status}'")]
    RemoteTask { task: String, status: String },

    #[error("unrecognized {task} status '{status}'")]
    UnknownStatus { task: String, status: String },

    #[error("action '{action}' cannot proceed from state {state}")]
    InvalidState { action: String, state: ActionState },

    #[error("polling timed out after {0:?}")]
    PollTimeout(Duration),

    #[error("polling was cancelled")]
    PollCancelled,

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<PollError<PipelineError>> for PipelineError {
    fn from(err: PollError<PipelineError>) -> Self {
        match err {
            PollError::Timeout(elapsed) => Self::PollTimeout(elapsed),
            PollError::Cancelled => Self::PollCancelled,
            PollError::Task(inner) => inner,
        }
    }
}
