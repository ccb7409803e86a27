//! Client interface to a tracking and model registry service.
//!
//! The workflow never reaches for a process-wide connection: every
//! operation takes the client it should talk to.

use crate::artifact::LoadedModel;
use crate::error::{RegflowError, Result};
use crate::model::{ModelStage, ModelVersion, RegisteredModel};
use crate::storage::ContentAddress;
use crate::tracking::{ParamValue, Run, RunId, RunStatus};
use crate::uri::{ArtifactUri, ModelSelector};
use std::collections::BTreeMap;
use tracing::debug;

/// Operations offered by a tracking/registry service.
pub trait RegistryClient {
    // ==================== Tracking ====================

    /// Start a new run in `experiment_name`.
    fn create_run(&self, experiment_name: &str, run_name: Option<&str>) -> Result<Run>;

    /// Fetch a run.
    fn get_run(&self, run_id: &RunId) -> Result<Run>;

    /// Log one parameter on an active run.
    fn log_param(&self, run_id: &RunId, key: &str, value: ParamValue) -> Result<()>;

    /// Log several parameters, stopping at the first failure.
    fn log_params(&self, run_id: &RunId, params: &BTreeMap<String, ParamValue>) -> Result<()> {
        for (key, value) in params {
            self.log_param(run_id, key, value.clone())?;
        }
        Ok(())
    }

    /// Log a metric value at a step.
    fn log_metric(&self, run_id: &RunId, key: &str, value: f64, step: u64) -> Result<()>;

    /// Set a run tag.
    fn set_tag(&self, run_id: &RunId, key: &str, value: &str) -> Result<()>;

    /// Store artifact bytes under `path` in the run's artifact root.
    fn log_artifact(&self, run_id: &RunId, path: &str, bytes: &[u8]) -> Result<ContentAddress>;

    /// Terminate a run.
    fn end_run(&self, run_id: &RunId, status: RunStatus) -> Result<Run>;

    /// Read back an artifact logged by a run.
    fn download_artifact(&self, run_id: &RunId, path: &str) -> Result<Vec<u8>>;

    // ==================== Registry ====================

    /// Create an empty registered model.
    fn create_registered_model(&self, name: &str, description: &str) -> Result<RegisteredModel>;

    /// Fetch a registered model.
    fn get_registered_model(&self, name: &str) -> Result<RegisteredModel>;

    /// List all registered models.
    fn list_registered_models(&self) -> Result<Vec<RegisteredModel>>;

    /// Append a version to `name` pointing at a `runs:/` artifact.
    fn create_model_version(&self, name: &str, source: &ArtifactUri) -> Result<ModelVersion>;

    /// Fetch one version.
    fn get_model_version(&self, name: &str, version: u32) -> Result<ModelVersion>;

    /// All versions of a model, ascending.
    fn list_model_versions(&self, name: &str) -> Result<Vec<ModelVersion>>;

    /// Highest version per stage; all stages when `stages` is empty.
    fn get_latest_versions(&self, name: &str, stages: &[ModelStage]) -> Result<Vec<ModelVersion>> {
        let versions = self.list_model_versions(name)?;
        let wanted: &[ModelStage] = if stages.is_empty() {
            ModelStage::all()
        } else {
            stages
        };

        Ok(wanted
            .iter()
            .filter_map(|stage| {
                versions
                    .iter()
                    .filter(|v| v.current_stage == *stage)
                    .max_by_key(|v| v.version)
                    .cloned()
            })
            .collect())
    }

    /// Move a version to `stage`. With `archive_existing_versions` and a
    /// `Staging` or `Production` target, other versions already in that
    /// stage are moved to `Archived`.
    fn transition_model_version_stage(
        &self,
        name: &str,
        version: u32,
        stage: ModelStage,
        archive_existing_versions: bool,
    ) -> Result<ModelVersion>;
}

/// Resolve a `models:/` selector to a concrete version.
///
/// # Errors
///
/// Returns `NotFound` if the model has no matching version.
pub fn resolve_version<C: RegistryClient + ?Sized>(
    client: &C,
    name: &str,
    selector: ModelSelector,
) -> Result<ModelVersion> {
    let found = match selector {
        ModelSelector::Version(version) => return client.get_model_version(name, version),
        ModelSelector::Latest => client.list_model_versions(name)?.into_iter().last(),
        ModelSelector::Stage(stage) => client.get_latest_versions(name, &[stage])?.into_iter().next(),
    };

    found.ok_or_else(|| RegflowError::NotFound {
        kind: "model version".to_string(),
        name: name.to_string(),
        version: selector.to_string(),
    })
}

/// Resolve any artifact URI to the `runs:/` URI that holds its bytes.
///
/// # Errors
///
/// Returns `NotFound` if a `models:/` URI does not resolve.
pub fn resolve_source<C: RegistryClient + ?Sized>(client: &C, uri: &ArtifactUri) -> Result<ArtifactUri> {
    match uri {
        ArtifactUri::Run { .. } => Ok(uri.clone()),
        ArtifactUri::Model { name, selector } => Ok(resolve_version(client, name, *selector)?.source),
    }
}

/// Register the artifact at `model_uri` under `model_name`.
///
/// Creates the registered model on first use, then appends a new version.
///
/// # Errors
///
/// Propagates any client failure; a model created here is not rolled
/// back if version creation then fails.
pub fn register_model<C: RegistryClient + ?Sized>(
    client: &C,
    model_uri: &ArtifactUri,
    model_name: &str,
) -> Result<ModelVersion> {
    match client.get_registered_model(model_name) {
        Ok(_) => {}
        Err(RegflowError::NotFound { .. }) => {
            client.create_registered_model(model_name, "")?;
        }
        Err(e) => return Err(e),
    }

    let source = resolve_source(client, model_uri)?;
    client.create_model_version(model_name, &source)
}

/// Fetch the raw artifact bytes behind any URI.
///
/// # Errors
///
/// Returns `NotFound` for unknown runs, artifacts, models or versions.
pub fn download<C: RegistryClient + ?Sized>(client: &C, uri: &ArtifactUri) -> Result<Vec<u8>> {
    match resolve_source(client, uri)? {
        ArtifactUri::Run { run_id, path } => client.download_artifact(&run_id, &path),
        ArtifactUri::Model { .. } => Err(RegflowError::Validation(format!(
            "{uri} did not resolve to a run artifact"
        ))),
    }
}

/// Load a model for prediction from a `runs:/` or `models:/` URI.
///
/// # Errors
///
/// Returns an error if the URI does not resolve or the artifact is not a
/// supported model.
pub fn load_model<C: RegistryClient + ?Sized>(client: &C, uri: &ArtifactUri) -> Result<LoadedModel> {
    let bytes = download(client, uri)?;
    debug!(%uri, size = bytes.len(), "loaded model artifact");
    LoadedModel::from_bytes(uri.clone(), &bytes)
}
