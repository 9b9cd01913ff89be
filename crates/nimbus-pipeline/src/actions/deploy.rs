//! Deploy stage: stand up a service for a published model.

use crate::actions::{transition, Action};
use crate::error::{PipelineError, PipelineResult};
use crate::platform::{DeployRequest, PlatformApi, PublishedModel};
use crate::state::ActionState;
use async_trait::async_trait;
use nimbus_dataset::Poller;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Deployment parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Endpoint path suffix for the service.
    pub endpoint_suffix: String,
    pub replicas: u32,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self { endpoint_suffix: "svc".to_string(), replicas: 1 }
    }
}

/// A deployed service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployOutput {
    pub service_id: String,
    pub endpoint: String,
    pub model: PublishedModel,
}

/// Auto-completes missing model metadata, requests a deployment, and
/// polls the service until it is running.
pub struct DeployAction {
    api: Arc<dyn PlatformApi>,
    config: DeployConfig,
    poller: Poller,
    state: ActionState,
    service_id: Option<String>,
    last_input: Option<PublishedModel>,
    result: Option<DeployOutput>,
}

impl DeployAction {
    #[must_use]
    pub fn new(api: Arc<dyn PlatformApi>, config: DeployConfig) -> Self {
        Self {
            api,
            config,
            poller: Poller::new(Duration::from_secs(5)).with_deadline(Duration::from_secs(1800)),
            state: ActionState::Preceding,
            service_id: None,
            last_input: None,
            result: None,
        }
    }

    /// Overrides the status poller.
    #[must_use]
    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    async fn run(&mut self, model: &PublishedModel) -> PipelineResult<DeployOutput> {
        // Fill in missing version metadata from the platform before
        // deploying.
        let mut model = model.clone();
        if model.version_id.is_empty() {
            let detail = self.api.model_detail(&model.model_id).await?;
            model.version_id = detail.version_id.ok_or_else(|| {
                PipelineError::InvalidArgument(format!(
                    "model '{}' has no published version to deploy",
                    model.model_id
                ))
            })?;
        }

        let service_id = match &self.service_id {
            Some(id) => id.clone(),
            None => {
                let request = DeployRequest {
                    model_id: model.model_id.clone(),
                    version_id: model.version_id.clone(),
                    endpoint_suffix: self.config.endpoint_suffix.clone(),
                    replicas: self.config.replicas,
                };
                let id = self.api.deploy_service(&request).await?;
                info!(service = %id, model = %model.model_id, "deployment requested");
                self.service_id = Some(id.clone());
                id
            }
        };

        let endpoint = self.poll_service(&service_id).await?;
        Ok(DeployOutput { service_id, endpoint, model })
    }

    async fn poll_service(&self, service_id: &str) -> PipelineResult<String> {
        let api = Arc::clone(&self.api);
        let endpoint = self
            .poller
            .run(|| {
                let api = Arc::clone(&api);
                let service_id = service_id.to_string();
                async move {
                    let report = api.service_status(&service_id).await?;
                    match report.status.as_str() {
                        "New" | "Deploying" => Ok(None),
                        "Running" => {
                            let endpoint = report.endpoint.ok_or_else(|| {
                                PipelineError::InvalidArgument(format!(
                                    "service '{service_id}' is running but reports no endpoint"
                                ))
                            })?;
                            Ok(Some(endpoint))
                        }
                        "Fail" => Err(PipelineError::RemoteTask {
                            task: "deploy".to_string(),
                            status: report.status,
                        }),
                        other => Err(PipelineError::UnknownStatus {
                            task: "deploy".to_string(),
                            status: other.to_string(),
                        }),
                    }
                }
            })
            .await?;
        Ok(endpoint)
    }
}

#[async_trait]
impl Action for DeployAction {
    type Input = PublishedModel;
    type Output = DeployOutput;

    fn name(&self) -> &'static str {
        "deploy"
    }

    fn state(&self) -> ActionState {
        self.state
    }

    async fn exec(&mut self, input: PublishedModel) -> PipelineResult<DeployOutput> {
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

    async fn resume(&mut self) -> PipelineResult<DeployOutput> {
        if let Some(result) = &self.result {
            return Ok(result.clone());
        }
        if let (Some(service_id), Some(model)) = (self.service_id.clone(), self.last_input.clone())
        {
            transition(self.name(), &mut self.state, ActionState::Running)?;
            match self.poll_service(&service_id).await {
                Ok(endpoint) => {
                    let output = DeployOutput { service_id, endpoint, model };
                    self.result = Some(output.clone());
                    transition(self.name(), &mut self.state, ActionState::Done)?;
                    return Ok(output);
                }
                Err(e) => {
                    let _ = transition(self.name(), &mut self.state, ActionState::Error);
                    return Err(e);
                }
            }
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
