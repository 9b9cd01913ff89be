//! Resumable pipeline actions.
//!
//! Each stage of the train-publish-deploy-evaluate workflow is an
//! [`Action`]: a stateful unit that drives one remote operation to a
//! terminal state, memoizes its result, and can `resume()` after an
//! interruption using retained remote ids. Failures surface as errors
//! that abort the pipeline; resumability exists so a caller can re-invoke
//! a persisted pipeline after a crash, not for automatic retry.

mod deploy;
mod evaluate;
mod load;
mod pipeline;
mod publish;
mod train;

pub use deploy::{DeployAction, DeployConfig, DeployOutput};
pub use evaluate::{EvaluateAction, EvaluationReport, RemoteEvaluation};
pub use load::{LoadDataAction, LoadInput};
pub use pipeline::{Pipeline, PipelineSnapshot};
pub use publish::PublishAction;
pub use train::{TrainAction, TrainOutput};

use crate::error::{PipelineError, PipelineResult};
use crate::state::ActionState;
use async_trait::async_trait;
use tracing::debug;

/// A resumable pipeline stage.
#[async_trait]
pub trait Action: Send {
    /// Input threaded from the previous stage.
    type Input: Send + 'static;
    /// Output threaded into the next stage.
    type Output: Clone + Send + Sync + 'static;

    /// Stable name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Current state.
    fn state(&self) -> ActionState;

    /// Runs the stage to a terminal state.
    async fn exec(&mut self, input: Self::Input) -> PipelineResult<Self::Output>;

    /// Returns the memoized result if the stage already completed,
    /// otherwise re-enters the remote wait using retained ids, otherwise
    /// re-runs from the last known input.
    async fn resume(&mut self) -> PipelineResult<Self::Output>;

    /// Requests cancellation of the stage's remote work.
    async fn stop(&mut self) -> PipelineResult<()>;
}

/// Applies a validated state transition.
pub(crate) fn transition(
    action: &str,
    state: &mut ActionState,
    to: ActionState,
) -> PipelineResult<()> {
    if !state.can_transition_to(to) {
        return Err(PipelineError::InvalidState { action: action.to_string(), state: *state });
    }
    debug!(action, from = %state, to = %to, "action state transition");
    *state = to;
    Ok(())
}
