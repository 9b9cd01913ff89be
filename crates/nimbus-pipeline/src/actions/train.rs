//! Train stage: drive a remote fine-tune task to a terminal status.

use crate::actions::{transition, Action};
use crate::error::{PipelineError, PipelineResult};
use crate::platform::{PlatformApi, TrainTaskRequest};
use crate::state::ActionState;
use crate::train::{ModelInfoRegistry, TrainConfig};
use async_trait::async_trait;
use nimbus_dataset::{Poller, TrainingSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of a completed training task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOutput {
    pub job_id: String,
    pub task_id: String,
    /// Final metrics as reported by the platform, when available.
    pub metrics: Option<Value>,
}

/// Creates a fine-tune job and task, validates the hyperparameter config
/// against the base model's declared limits, and polls the task until a
/// terminal status. `Finish` memoizes metrics; `Fail` and `Stop` raise;
/// any unrecognized status raises as well, so protocol drift cannot be
/// misread as progress.
pub struct TrainAction {
    api: Arc<dyn PlatformApi>,
    poller: Poller,
    job_name: String,
    base_model: Option<String>,
    incremental_task_id: Option<String>,
    config: TrainConfig,
    registry: ModelInfoRegistry,
    strict: bool,
    state: ActionState,
    job_id: Option<String>,
    task_id: Option<String>,
    last_input: Option<TrainingSource>,
    result: Option<TrainOutput>,
}

impl TrainAction {
    /// Creates a fresh training run from a named base model type.
    #[must_use]
    pub fn new(api: Arc<dyn PlatformApi>, base_model: impl Into<String>, config: TrainConfig) -> Self {
        Self {
            api,
            poller: Poller::new(Duration::from_secs(5)).with_deadline(Duration::from_secs(6 * 3600)),
            job_name: "nimbus-train".to_string(),
            base_model: Some(base_model.into()),
            incremental_task_id: None,
            config,
            registry: ModelInfoRegistry::default(),
            strict: true,
            state: ActionState::Preceding,
            job_id: None,
            task_id: None,
            last_input: None,
            result: None,
        }
    }

    /// Continues an existing remote task (incremental training).
    #[must_use]
    pub fn incremental(
        api: Arc<dyn PlatformApi>,
        task_id: impl Into<String>,
        config: TrainConfig,
    ) -> Self {
        let mut action = Self::new(api, "", config);
        action.base_model = None;
        action.incremental_task_id = Some(task_id.into());
        action
    }

    /// Overrides the job name shown in the console.
    #[must_use]
    pub fn with_job_name(mut self, name: impl Into<String>) -> Self {
        self.job_name = name.into();
        self
    }

    /// Lenient mode logs limit violations instead of failing.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Overrides the model limit registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ModelInfoRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Overrides the status poller.
    #[must_use]
    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    fn validate_config(&self) -> PipelineResult<()> {
        let Some(base_model) = &self.base_model else {
            return Ok(());
        };
        match self.registry.get(base_model) {
            Some(info) => {
                if self.incremental_task_id.is_some() && !info.supports_incremental {
                    let message =
                        format!("base model '{base_model}' does not support incremental training");
                    if self.strict {
                        return Err(PipelineError::InvalidTrainConfig(message));
                    }
                    warn!(%message, "continuing in lenient mode");
                }
                self.config.validate(&info.limit, self.strict)
            }
            None => {
                warn!(model = %base_model, "no declared limits for base model; skipping validation");
                Ok(())
            }
        }
    }

    async fn run(&mut self, dataset: &TrainingSource) -> PipelineResult<TrainOutput> {
        self.validate_config()?;

        let job_id = match &self.job_id {
            Some(id) => id.clone(),
            None => {
                let base = self.base_model.clone().unwrap_or_else(|| "incremental".to_string());
                let id = self.api.create_train_job(&self.job_name, &base).await?;
                info!(job = %id, "created train job");
                self.job_id = Some(id.clone());
                id
            }
        };

        let task_id = match &self.task_id {
            Some(id) => id.clone(),
            None => {
                let request = TrainTaskRequest {
                    job_id: job_id.clone(),
                    base_model: self.base_model.clone(),
                    incremental_task_id: self.incremental_task_id.clone(),
                    dataset: dataset.clone(),
                    hyperparameters: self.config.as_fields(),
                    train_split_percent: self.config.train_split_percent,
                };
                let id = self.api.create_train_task(&request).await?;
                info!(task = %id, "created train task");
                self.task_id = Some(id.clone());
                id
            }
        };

        let metrics = self.poll_task(&task_id).await?;
        Ok(TrainOutput { job_id, task_id, metrics })
    }

    async fn poll_task(&self, task_id: &str) -> PipelineResult<Option<Value>> {
        let api = Arc::clone(&self.api);
        let metrics = self
            .poller
            .run(|| {
                let api = Arc::clone(&api);
                let task_id = task_id.to_string();
                async move {
                    let report = api.train_task_status(&task_id).await?;
                    match report.status.as_str() {
                        "Queued" | "Running" => {
                            info!(
                                task = %task_id,
                                progress = report.progress_percent.unwrap_or(0),
                                "training in progress"
                            );
                            Ok(None)
                        }
                        "Finish" => Ok(Some(report.metrics)),
                        "Fail" | "Stop" => Err(PipelineError::RemoteTask {
                            task: "train".to_string(),
                            status: report.status,
                        }),
                        other => Err(PipelineError::UnknownStatus {
                            task: "train".to_string(),
                            status: other.to_string(),
                        }),
                    }
                }
            })
            .await?;
        Ok(metrics)
    }

    fn finish(&mut self, result: PipelineResult<TrainOutput>) -> PipelineResult<TrainOutput> {
        match result {
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
}

#[async_trait]
impl Action for TrainAction {
    type Input = TrainingSource;
    type Output = TrainOutput;

    fn name(&self) -> &'static str {
        "train"
    }

    fn state(&self) -> ActionState {
        self.state
    }

    async fn exec(&mut self, input: TrainingSource) -> PipelineResult<TrainOutput> {
        transition(self.name(), &mut self.state, ActionState::Running)?;
        self.last_input = Some(input.clone());
        let result = self.run(&input).await;
        self.finish(result)
    }

    async fn resume(&mut self) -> PipelineResult<TrainOutput> {
        if let Some(result) = &self.result {
            return Ok(result.clone());
        }
        if let Some(task_id) = self.task_id.clone() {
            // The remote task is already created; re-enter the wait.
            transition(self.name(), &mut self.state, ActionState::Running)?;
            let job_id = self.job_id.clone().unwrap_or_default();
            let result = self
                .poll_task(&task_id)
                .await
                .map(|metrics| TrainOutput { job_id, task_id, metrics });
            return self.finish(result);
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
        if let Some(task_id) = &self.task_id {
            self.api.stop_train_task(task_id).await?;
            info!(task = %task_id, "requested remote train cancel");
        }
        transition(self.name(), &mut self.state, ActionState::Stopped)
    }
}
