//! The model registry workflow: track, register, load, predict, promote.
//!
//! [`RegistryWorkflow`] is a fixed linear sequence of client calls. It
//! owns no connection of its own; the caller constructs a client and
//! lends it for the duration of the workflow. Any failure halts the
//! sequence and is returned unchanged.

use crate::artifact::ModelArtifact;
use crate::client::{self, RegistryClient};
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::estimator::RandomForestRegressor;
use crate::model::{ModelStage, ModelVersion};
use crate::tracking::{ParamValue, RunId, RunStatus};
use crate::uri::ArtifactUri;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Tag recording which estimator flavor a run logged.
pub const FLAVOR_TAG: &str = "regflow.flavor";

/// One step of the workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Train, start a run, log parameters and the model.
    TrackRun,
    /// Register the logged model as a new version.
    Register,
    /// Predict with the model loaded by its `runs:/` URI.
    PredictFromRun,
    /// Predict with the model loaded by its `models:/` URI.
    PredictFromRegistry,
    /// Move the version to the configured stage.
    Transition,
}

impl Step {
    /// All steps in execution order.
    pub const ALL: [Step; 5] = [
        Step::TrackRun,
        Step::Register,
        Step::PredictFromRun,
        Step::PredictFromRegistry,
        Step::Transition,
    ];

    /// Console marker printed before the step runs.
    #[must_use]
    pub fn marker(&self) -> &'static str {
        match self {
            Self::TrackRun => "> register model in registry 1.0",
            Self::Register => "> register model in registry 2.0",
            Self::PredictFromRun => "> Load logged model for prediction",
            Self::PredictFromRegistry => "> Use model for prediction",
            Self::Transition => "> Transition model to another stage",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// Outcome of a complete workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowReport {
    /// Run the model was logged in.
    pub run_id: RunId,
    /// `runs:/` URI of the logged model.
    pub run_uri: ArtifactUri,
    /// `models:/<name>/<version>` URI of the registered version.
    pub model_uri: ArtifactUri,
    /// Version as registered (stage `None`).
    pub registered: ModelVersion,
    /// Predictions from the model loaded by run URI.
    pub run_predictions: Vec<f64>,
    /// Predictions from the model loaded by registry URI.
    pub registry_predictions: Vec<f64>,
    /// Version after the stage transition.
    pub transitioned: ModelVersion,
}

impl WorkflowReport {
    /// Stage the version ended in.
    #[must_use]
    pub fn final_stage(&self) -> ModelStage {
        self.transitioned.current_stage
    }

    /// Whether both load paths agreed.
    #[must_use]
    pub fn predictions_agree(&self) -> bool {
        self.run_predictions == self.registry_predictions
    }
}

/// Drives the registry workflow against a borrowed client.
pub struct RegistryWorkflow<'a, C: RegistryClient + ?Sized> {
    client: &'a C,
    config: WorkflowConfig,
}

impl<'a, C: RegistryClient + ?Sized> RegistryWorkflow<'a, C> {
    /// Create a workflow talking to `client`.
    pub fn new(client: &'a C, config: WorkflowConfig) -> Self {
        Self { client, config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Fit the estimator described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad parameters or training data.
    pub fn train(&self) -> Result<(BTreeMap<String, ParamValue>, ModelArtifact)> {
        let forest_params = self.config.forest_params()?;
        let forest = RandomForestRegressor::new(forest_params)
            .fit(&self.config.training.x, &self.config.training.y)?;
        debug!(
            n_estimators = forest.params().n_estimators,
            n_features = forest.n_features(),
            "fitted model"
        );
        Ok((self.config.params.clone(), ModelArtifact::from_forest(&forest)?))
    }

    /// Start a run, log `params` and the model, and finish the run.
    ///
    /// If anything fails after the run exists, it is ended as `Failed`
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// Propagates client errors.
    pub fn log_and_start_run(
        &self,
        params: &BTreeMap<String, ParamValue>,
        model_artifact: &ModelArtifact,
    ) -> Result<RunId> {
        let run = self
            .client
            .create_run(&self.config.experiment_name, Some(self.config.run_name.as_str()))?;
        let run_id = run.run_id;

        if let Err(e) = self.log_run_contents(&run_id, params, model_artifact) {
            warn!(%run_id, error = %e, "logging failed, marking run as failed");
            if let Err(end_err) = self.client.end_run(&run_id, RunStatus::Failed) {
                warn!(%run_id, error = %end_err, "could not mark run as failed");
            }
            return Err(e);
        }

        self.client.end_run(&run_id, RunStatus::Finished)?;
        info!(%run_id, params = params.len(), "logged model run");
        Ok(run_id)
    }

    fn log_run_contents(
        &self,
        run_id: &RunId,
        params: &BTreeMap<String, ParamValue>,
        model_artifact: &ModelArtifact,
    ) -> Result<()> {
        self.client.log_params(run_id, params)?;
        self.client.set_tag(run_id, FLAVOR_TAG, &model_artifact.flavor)?;
        let bytes = model_artifact.to_bytes()?;
        self.client
            .log_artifact(run_id, &self.config.artifact_path, &bytes)?;
        Ok(())
    }

    /// Register the model at `model_uri` under `model_name`.
    ///
    /// # Errors
    ///
    /// Propagates client errors.
    pub fn register(&self, model_uri: &ArtifactUri, model_name: &str) -> Result<ModelVersion> {
        let version = client::register_model(self.client, model_uri, model_name)?;
        info!(
            name = %version.name,
            version = version.version,
            source = %version.source,
            "registered model version"
        );
        Ok(version)
    }

    /// Load the model behind `model_uri` and predict `input_rows`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the URI does not resolve and `ShapeMismatch`
    /// if a row has the wrong width.
    pub fn load_and_predict(&self, model_uri: &ArtifactUri, input_rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let model = client::load_model(self.client, model_uri)?;
        let predictions = model.predict(input_rows)?;
        debug!(uri = %model_uri, rows = input_rows.len(), "predicted");
        Ok(predictions)
    }

    /// Move `model_name` version `version` to `target_stage`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the version does not exist.
    pub fn transition_stage(
        &self,
        model_name: &str,
        version: u32,
        target_stage: ModelStage,
    ) -> Result<ModelVersion> {
        let updated = self.client.transition_model_version_stage(
            model_name,
            version,
            target_stage,
            self.config.archive_existing_versions,
        )?;
        info!(
            name = model_name,
            version,
            stage = %updated.current_stage,
            "transitioned model version"
        );
        Ok(updated)
    }

    /// Execute every step in order, calling `observer` before each.
    ///
    /// # Errors
    ///
    /// Returns the first error; later steps do not run.
    pub fn run<F: FnMut(Step)>(&self, mut observer: F) -> Result<WorkflowReport> {
        self.config.validate()?;
        let model_name = self.config.model_name();

        observer(Step::TrackRun);
        let (params, artifact) = self.train()?;
        let run_id = self.log_and_start_run(&params, &artifact)?;
        let run_uri = ArtifactUri::run(run_id, &self.config.artifact_path);

        observer(Step::Register);
        let registered = self.register(&run_uri, &model_name)?;
        let model_uri = registered.model_uri();

        observer(Step::PredictFromRun);
        let run_predictions = self.load_and_predict(&run_uri, &self.config.input_rows)?;

        observer(Step::PredictFromRegistry);
        let registry_predictions = self.load_and_predict(&model_uri, &self.config.input_rows)?;

        observer(Step::Transition);
        let transitioned =
            self.transition_stage(&model_name, registered.version, self.config.target_stage)?;

        Ok(WorkflowReport {
            run_id,
            run_uri,
            model_uri,
            registered,
            run_predictions,
            registry_predictions,
            transitioned,
        })
    }
}
