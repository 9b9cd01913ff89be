//! Remote console collaborator.
//!
//! The pipeline drives the platform's fine-tune, publish, deploy, and
//! evaluation endpoints through this trait. Endpoint bodies live in the
//! HTTP layer outside this crate; tests script the trait. Status fields
//! are carried as the server's raw strings — each action parses them
//! fail-closed, so protocol drift surfaces as a typed error instead of a
//! silent misread.

use crate::error::PipelineResult;
use async_trait::async_trait;
use nimbus_dataset::TrainingSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Request to create one training task under a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainTaskRequest {
    pub job_id: String,
    /// Base model type for a fresh run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_model: Option<String>,
    /// Existing task to continue from, for incremental training.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incremental_task_id: Option<String>,
    pub dataset: TrainingSource,
    pub hyperparameters: BTreeMap<String, Value>,
    /// Percentage of the dataset used for training (rest is validation).
    pub train_split_percent: u32,
}

/// Raw status report for a training task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainTaskStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
}

/// Request to publish a trained task as a named model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub job_id: String,
    pub task_id: String,
    pub model_name: String,
}

/// A published model's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedModel {
    pub model_id: String,
    pub version_id: String,
}

/// Full model metadata, used to auto-complete partial references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDetail {
    pub model_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Request to deploy a model version as a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub model_id: String,
    pub version_id: String,
    /// Endpoint path suffix for the deployed service.
    pub endpoint_suffix: String,
    pub replicas: u32,
}

/// Raw status report for a deployed service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Request to run a server-side evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub model_ids: Vec<String>,
    pub dataset: TrainingSource,
    pub metrics: Vec<String>,
}

/// Raw status report for a server-side evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// The platform's training/publish/deploy/evaluation API surface.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Creates a fine-tune job, returning its id.
    async fn create_train_job(&self, name: &str, base_model: &str) -> PipelineResult<String>;

    /// Creates a training task under a job, returning the task id.
    async fn create_train_task(&self, request: &TrainTaskRequest) -> PipelineResult<String>;

    /// Reads a training task's status.
    async fn train_task_status(&self, task_id: &str) -> PipelineResult<TrainTaskStatus>;

    /// Issues a remote cancel for a training task.
    async fn stop_train_task(&self, task_id: &str) -> PipelineResult<()>;

    /// Publishes a trained task as a model.
    async fn publish_model(&self, request: &PublishRequest) -> PipelineResult<PublishedModel>;

    /// Reads a model's full metadata.
    async fn model_detail(&self, model_id: &str) -> PipelineResult<ModelDetail>;

    /// Deploys a model version, returning the service id.
    async fn deploy_service(&self, request: &DeployRequest) -> PipelineResult<String>;

    /// Reads a deployed service's status.
    async fn service_status(&self, service_id: &str) -> PipelineResult<ServiceStatus>;

    /// Submits a server-side evaluation, returning its id.
    async fn create_evaluation(&self, request: &EvaluationRequest) -> PipelineResult<String>;

    /// Reads a server-side evaluation's status.
    async fn evaluation_status(&self, evaluation_id: &str) -> PipelineResult<EvaluationStatus>;
}
