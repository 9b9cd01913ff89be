//! Publish stage: turn a finished training task into a named model.

use crate::actions::train::TrainOutput;
use crate::actions::{transition, Action};
use crate::error::{PipelineError, PipelineResult};
use crate::platform::{PlatformApi, PublishRequest, PublishedModel};
use crate::state::ActionState;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Wraps a trained task's job/task ids into a publish call and memoizes
/// the resulting model id and version id.
pub struct PublishAction {
    api: Arc<dyn PlatformApi>,
    model_name: String,
    state: ActionState,
    last_input: Option<TrainOutput>,
    result: Option<PublishedModel>,
}

impl PublishAction {
    #[must_use]
    pub fn new(api: Arc<dyn PlatformApi>, model_name: impl Into<String>) -> Self {
        Self {
            api,
            model_name: model_name.into(),
            state: ActionState::Preceding,
            last_input: None,
            result: None,
        }
    }
}

#[async_trait]
impl Action for PublishAction {
    type Input = TrainOutput;
    type Output = PublishedModel;

    fn name(&self) -> &'static str {
        "publish"
    }

    fn state(&self) -> ActionState {
        self.state
    }

    async fn exec(&mut self, input: TrainOutput) -> PipelineResult<PublishedModel> {
        transition(self.name(), &mut self.state, ActionState::Running)?;
        self.last_input = Some(input.clone());
        let request = PublishRequest {
            job_id: input.job_id,
            task_id: input.task_id,
            model_name: self.model_name.clone(),
        };
        match self.api.publish_model(&request).await {
            Ok(published) => {
                info!(model = %published.model_id, version = %published.version_id, "model published");
                self.result = Some(published.clone());
                transition(self.name(), &mut self.state, ActionState::Done)?;
                Ok(published)
            }
            Err(e) => {
                let _ = transition(self.name(), &mut self.state, ActionState::Error);
                Err(e)
            }
        }
    }

    async fn resume(&mut self) -> PipelineResult<PublishedModel> {
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
