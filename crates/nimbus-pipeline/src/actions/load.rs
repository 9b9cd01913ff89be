//! Load stage: normalize a dataset reference for remote training.

use crate::actions::{transition, Action};
use crate::error::{PipelineError, PipelineResult};
use crate::state::ActionState;
use async_trait::async_trait;
use nimbus_dataset::{Dataset, SourceKind, TrainingSource};
use tracing::info;

/// Input accepted by [`LoadDataAction`]: a dataset backed by a remote
/// source, or a raw blob path string.
#[derive(Clone)]
pub enum LoadInput {
    Dataset(Dataset),
    BlobPath(String),
}

/// Emits the normalized `{source kind, reference}` descriptor the train
/// stage consumes. A managed dataset is released (and the release polled
/// to completion) before its descriptor is handed on.
#[derive(Default)]
pub struct LoadDataAction {
    state: ActionState,
    result: Option<TrainingSource>,
    last_input: Option<LoadInput>,
}

impl LoadDataAction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn run(&self, input: &LoadInput) -> PipelineResult<TrainingSource> {
        match input {
            LoadInput::Dataset(dataset) => {
                let source = dataset.source().ok_or_else(|| {
                    PipelineError::InvalidArgument(
                        "dataset has no source attached".to_string(),
                    )
                })?;
                let descriptor = source.training_descriptor().await?.ok_or_else(|| {
                    PipelineError::InvalidArgument(format!(
                        "training cannot read a {} source; use a managed or blob-backed dataset",
                        source.kind()
                    ))
                })?;
                info!(kind = %descriptor.kind, reference = %descriptor.reference, "dataset ready for training");
                Ok(descriptor)
            }
            LoadInput::BlobPath(path) => Ok(TrainingSource {
                kind: SourceKind::Blob,
                reference: path.clone(),
            }),
        }
    }
}

#[async_trait]
impl Action for LoadDataAction {
    type Input = LoadInput;
    type Output = TrainingSource;

    fn name(&self) -> &'static str {
        "load_data"
    }

    fn state(&self) -> ActionState {
        self.state
    }

    async fn exec(&mut self, input: LoadInput) -> PipelineResult<TrainingSource> {
        transition(self.name(), &mut self.state, ActionState::Running)?;
        self.last_input = Some(input.clone());
        match self.run(&input).await {
            Ok(output) => {
                self.result = Some(output.clone());
                transition(self.name(), &mut self.state, ActionState::Done)?;
                Ok(output)
            }
            Err(e) => {
                let _ = transition(self.name(), &mut self.state, ActionState::Error);
                Err(e)
            }
        }
    }

    async fn resume(&mut self) -> PipelineResult<TrainingSource> {
        if let Some(result) = &self.result {
            return Ok(result.clone());
        }
        let Some(input) = self.last_input.clone() else {
            return Err(PipelineError::InvalidState {
                action: self.name().to_string(),
                state: self.state,
            });
        };
        self.exec(input).await
    }

    async fn stop(&mut self) -> PipelineResult<()> {
        transition(self.name(), &mut self.state, ActionState::Stopped)
    }
}
