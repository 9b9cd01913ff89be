//! Sequential pipeline runner with persisted stage snapshots.

use crate::actions::deploy::{DeployAction, DeployOutput};
use crate::actions::load::{LoadDataAction, LoadInput};
use crate::actions::publish::PublishAction;
use crate::actions::train::{TrainAction, TrainOutput};
use crate::actions::Action;
use crate::error::PipelineResult;
use crate::platform::PublishedModel;
use nimbus_dataset::TrainingSource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Completed stage outputs, written to disk after every stage so a
/// crashed run can pick up where it left off.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub dataset: Option<TrainingSource>,
    pub train: Option<TrainOutput>,
    pub published: Option<PublishedModel>,
    pub deployed: Option<DeployOutput>,
}

/// Chains load → train → publish (→ deploy), threading each stage's
/// output into the next. Re-running after an interruption skips every
/// stage whose output is already in the snapshot; evaluation runs
/// separately via [`crate::actions::EvaluateAction`] since it needs a
/// client bound to the deployed endpoint.
pub struct Pipeline {
    load: LoadDataAction,
    train: TrainAction,
    publish: PublishAction,
    deploy: Option<DeployAction>,
    snapshot: PipelineSnapshot,
    snapshot_path: Option<PathBuf>,
}

impl Pipeline {
    #[must_use]
    pub fn new(train: TrainAction, publish: PublishAction) -> Self {
        Self {
            load: LoadDataAction::new(),
            train,
            publish,
            deploy: None,
            snapshot: PipelineSnapshot::default(),
            snapshot_path: None,
        }
    }

    /// Adds a deploy stage after publish.
    #[must_use]
    pub fn with_deploy(mut self, deploy: DeployAction) -> Self {
        self.deploy = Some(deploy);
        self
    }

    /// Persists stage outputs to `path`, loading any snapshot already
    /// there so a fresh process resumes a crashed run.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> PipelineResult<Self> {
        let path = path.into();
        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            self.snapshot = serde_json::from_str(&raw)?;
            info!(path = %path.display(), "resuming pipeline from snapshot");
        }
        self.snapshot_path = Some(path);
        Ok(self)
    }

    /// Completed stage outputs so far.
    pub fn snapshot(&self) -> &PipelineSnapshot {
        &self.snapshot
    }

    fn persist(&self) -> PipelineResult<()> {
        if let Some(path) = &self.snapshot_path {
            std::fs::write(path, serde_json::to_string_pretty(&self.snapshot)?)?;
            debug!(path = %path.display(), "pipeline snapshot persisted");
        }
        Ok(())
    }

    /// Runs the pipeline to completion, skipping stages whose outputs are
    /// already snapshotted.
    pub async fn run(&mut self, input: LoadInput) -> PipelineResult<PipelineSnapshot> {
        let descriptor = match &self.snapshot.dataset {
            Some(descriptor) => descriptor.clone(),
            None => {
                let descriptor = self.load.exec(input).await?;
                self.snapshot.dataset = Some(descriptor.clone());
                self.persist()?;
                descriptor
            }
        };

        let trained = match &self.snapshot.train {
            Some(trained) => trained.clone(),
            None => {
                let trained = self.train.exec(descriptor).await?;
                self.snapshot.train = Some(trained.clone());
                self.persist()?;
                trained
            }
        };

        let published = match &self.snapshot.published {
            Some(published) => published.clone(),
            None => {
                let published = self.publish.exec(trained).await?;
                self.snapshot.published = Some(published.clone());
                self.persist()?;
                published
            }
        };

        if let Some(deploy) = &mut self.deploy {
            if self.snapshot.deployed.is_none() {
                let deployed = deploy.exec(published).await?;
                self.snapshot.deployed = Some(deployed);
                self.persist()?;
            }
        }

        Ok(self.snapshot.clone())
    }

    /// Requests cancellation of whichever stage is currently running.
    pub async fn stop(&mut self) -> PipelineResult<()> {
        self.train.stop().await
    }
}
