//! Evaluate stage: batch inference plus local and remote scoring.

use crate::actions::{transition, Action};
use crate::error::{PipelineError, PipelineResult};
use crate::evaluate::{score_dataset, Evaluator, EvaluatorScore};
use crate::inference::{BatchInferenceConfig, BatchInferenceRunner};
use crate::platform::{EvaluationRequest, PlatformApi};
use crate::state::ActionState;
use async_trait::async_trait;
use nimbus_abstraction::Model;
use nimbus_dataset::{Dataset, Poller, TrainingSource};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Server-side evaluation to submit alongside the local pass.
#[derive(Clone)]
pub struct RemoteEvaluation {
    pub api: Arc<dyn PlatformApi>,
    pub model_ids: Vec<String>,
    pub dataset: TrainingSource,
    pub metrics: Vec<String>,
}

/// Result of an evaluate stage.
#[derive(Clone)]
pub struct EvaluationReport {
    /// The inference result dataset (input/output/reference columns).
    pub dataset: Dataset,
    /// Local evaluator aggregates.
    pub scores: Vec<EvaluatorScore>,
    /// Raw result of the server-side evaluation, when one was submitted.
    pub remote_result: Option<Value>,
}

/// Runs batch inference against a model or deployed service client, scores
/// the output with local evaluators, and optionally submits a server-side
/// evaluation job, polling it to a terminal status.
pub struct EvaluateAction {
    model: Arc<dyn Model>,
    evaluators: Vec<Arc<dyn Evaluator>>,
    inference: BatchInferenceConfig,
    remote: Option<RemoteEvaluation>,
    poller: Poller,
    state: ActionState,
    last_input: Option<Dataset>,
    result: Option<EvaluationReport>,
}

impl EvaluateAction {
    #[must_use]
    pub fn new(model: Arc<dyn Model>, evaluators: Vec<Arc<dyn Evaluator>>) -> Self {
        Self {
            model,
            evaluators,
            inference: BatchInferenceConfig::default(),
            remote: None,
            poller: Poller::new(Duration::from_secs(5)).with_deadline(Duration::from_secs(1800)),
            state: ActionState::Preceding,
            last_input: None,
            result: None,
        }
    }

    /// Overrides the batch inference configuration.
    #[must_use]
    pub fn with_inference_config(mut self, config: BatchInferenceConfig) -> Self {
        self.inference = config;
        self
    }

    /// Additionally submits a server-side evaluation job.
    #[must_use]
    pub fn with_remote(mut self, remote: RemoteEvaluation) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Overrides the remote status poller.
    #[must_use]
    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    async fn run(&self, input: &Dataset) -> PipelineResult<EvaluationReport> {
        let runner = BatchInferenceRunner::new(Arc::clone(&self.model), self.inference.clone());
        let result_dataset = runner.run(input).await?;
        let scores = score_dataset(&result_dataset, &self.evaluators)?;
        for score in &scores {
            info!(evaluator = %score.evaluator, mean = score.mean_score, "local evaluation complete");
        }

        let remote_result = match &self.remote {
            Some(remote) => Some(self.run_remote(remote).await?),
            None => None,
        };

        Ok(EvaluationReport { dataset: result_dataset, scores, remote_result })
    }

    async fn run_remote(&self, remote: &RemoteEvaluation) -> PipelineResult<Value> {
        let request = EvaluationRequest {
            model_ids: remote.model_ids.clone(),
            dataset: remote.dataset.clone(),
            metrics: remote.metrics.clone(),
        };
        let evaluation_id = remote.api.create_evaluation(&request).await?;
        info!(evaluation = %evaluation_id, "submitted server-side evaluation");
        let api = Arc::clone(&remote.api);
        let result = self
            .poller
            .run(|| {
                let api = Arc::clone(&api);
                let evaluation_id = evaluation_id.clone();
                async move {
                    let report = api.evaluation_status(&evaluation_id).await?;
                    match report.status.as_str() {
                        "Pending" | "Running" => Ok(None),
                        "Finish" => Ok(Some(report.result.unwrap_or(Value::Null))),
                        "Fail" | "Stop" => Err(PipelineError::RemoteTask {
                            task: "evaluation".to_string(),
                            status: report.status,
                        }),
                        other => Err(PipelineError::UnknownStatus {
                            task: "evaluation".to_string(),
                            status: other.to_string(),
                        }),
                    }
                }
            })
            .await?;
        Ok(result)
    }
}

#[async_trait]
impl Action for EvaluateAction {
    type Input = Dataset;
    type Output = EvaluationReport;

    fn name(&self) -> &'static str {
        "evaluate"
    }

    fn state(&self) -> ActionState {
        self.state
    }

    async fn exec(&mut self, input: Dataset) -> PipelineResult<EvaluationReport> {
        transition(self.name(), &mut self.state, ActionState::Running)?;
        self.last_input = Some(input.clone());
        match self.run(&input).await {
            Ok(report) => {
                self.result = Some(report.clone());
                transition(self.name(), &mut self.state, ActionState::Done)?;
                Ok(report)
            }
            Err(e) => {
                let _ = transition(self.name(), &mut self.state, ActionState::Error);
                Err(e)
            }
        }
    }

    async fn resume(&mut self) -> PipelineResult<EvaluationReport> {
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
