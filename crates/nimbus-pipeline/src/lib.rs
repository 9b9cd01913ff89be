//! Training and deployment orchestration for Nimbus.
//!
//! Drives the platform's asynchronous load → train → publish → deploy →
//! evaluate workflow through resumable [`actions`], validates
//! hyperparameters against per-model [`train`] limits, and runs batched
//! LLM [`inference`] over datasets with order preservation and per-item
//! failure isolation.

pub mod actions;
pub mod error;
pub mod evaluate;
pub mod inference;
pub mod platform;
pub mod state;
pub mod train;

pub use actions::{
    Action, DeployAction, DeployConfig, DeployOutput, EvaluateAction, EvaluationReport,
    LoadDataAction, LoadInput, Pipeline, PipelineSnapshot, PublishAction, RemoteEvaluation,
    TrainAction, TrainOutput,
};
pub use error::{PipelineError, PipelineResult};
pub use evaluate::{
    score_dataset, ContainsEvaluator, EvaluatorScore, Evaluator, ExactMatchEvaluator,
};
pub use inference::{BatchInferenceConfig, BatchInferenceRunner};
pub use platform::{
    DeployRequest, EvaluationRequest, EvaluationStatus, ModelDetail, PlatformApi, PublishRequest,
    PublishedModel, ServiceStatus, TrainTaskRequest, TrainTaskStatus,
};
pub use state::ActionState;
pub use train::{FieldLimit, ModelInfo, ModelInfoRegistry, TrainConfig, TrainLimit};
