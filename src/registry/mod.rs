//! Local tracking and model registry service backed by `SQLite`.

mod database;

pub use database::RegistryDb;

use crate::client::RegistryClient;
use crate::error::{RegflowError, Result};
use crate::model::{ModelStage, ModelVersion, RegisteredModel};
use crate::storage::{ContentAddress, ObjectStore};
use crate::tracking::{ParamValue, Run, RunId, RunStatus};
use crate::uri::ArtifactUri;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Location of a local registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Base path for the registry.
    pub base_path: PathBuf,
}

impl RegistryConfig {
    /// Create a new config with the given base path.
    #[must_use]
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.base_path.join("registry.db")
    }

    /// Get the objects path.
    #[must_use]
    pub fn objects_path(&self) -> PathBuf {
        self.base_path.join("objects")
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let home = std::env::var("HOME").map_or_else(|_| PathBuf::from("."), PathBuf::from);
        Self::new(home.join(".regflow"))
    }
}

/// Registry storage statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of tracked runs.
    pub run_count: usize,
    /// Number of registered models.
    pub model_count: usize,
    /// Number of model versions across all models.
    pub version_count: usize,
    /// Number of stored artifact blobs.
    pub object_count: usize,
    /// Total size of stored blobs in bytes.
    pub total_size_bytes: u64,
}

/// The local registry: run tracking, artifact storage and model versions.
pub struct Registry {
    config: RegistryConfig,
    db: RegistryDb,
    objects: ObjectStore,
}

impl Registry {
    /// Create or open a registry at the default location (~/.regflow).
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    pub fn open_default() -> Result<Self> {
        Self::open(RegistryConfig::default())
    }

    /// Create or open a registry with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory, database or object store cannot be created.
    pub fn open(config: RegistryConfig) -> Result<Self> {
        fs::create_dir_all(&config.base_path)?;
        let db = RegistryDb::open(config.db_path())?;
        let objects = ObjectStore::new(config.objects_path())?;
        debug!(path = %config.base_path.display(), "opened registry");

        Ok(Self {
            config,
            db,
            objects,
        })
    }

    /// Open an existing registry without creating anything.
    ///
    /// # Errors
    ///
    /// Returns [`RegflowError::NotInitialized`] if the registry was never created.
    pub fn open_existing(config: RegistryConfig) -> Result<Self> {
        if !config.db_path().is_file() {
            return Err(RegflowError::NotInitialized(config.base_path));
        }
        let objects = ObjectStore::open(config.objects_path())?;
        let db = RegistryDb::open(config.db_path())?;
        Ok(Self {
            config,
            db,
            objects,
        })
    }

    /// Get the registry configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// List runs of an experiment, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_runs(&self, experiment: &str) -> Result<Vec<Run>> {
        self.db.list_runs(experiment)
    }

    /// Get storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if querying fails.
    pub fn storage_stats(&self) -> Result<StorageStats> {
        let (object_count, total_size_bytes) = self.objects.usage()?;
        Ok(StorageStats {
            run_count: self.db.count_runs()?,
            model_count: self.db.count_registered_models()?,
            version_count: self.db.count_model_versions()?,
            object_count,
            total_size_bytes,
        })
    }

    fn update_run<F>(&self, run_id: &RunId, f: F) -> Result<Run>
    where
        F: FnOnce(&mut Run) -> Result<()>,
    {
        let mut run = self.db.get_run(run_id)?;
        f(&mut run)?;
        self.db.update_run(&run)?;
        Ok(run)
    }
}

fn normalize_artifact_path(path: &str) -> Result<&str> {
    let path = path.trim_matches('/');
    if path.is_empty() {
        return Err(RegflowError::Validation("artifact path is empty".to_string()));
    }
    if path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(RegflowError::Validation(format!(
            "invalid artifact path: {path}"
        )));
    }
    Ok(path)
}

impl RegistryClient for Registry {
    fn create_run(&self, experiment_name: &str, run_name: Option<&str>) -> Result<Run> {
        let run = Run::new(experiment_name, run_name.map(String::from));
        self.db.insert_run(&run)?;
        info!(run_id = %run.run_id, experiment = experiment_name, "started run");
        Ok(run)
    }

    fn get_run(&self, run_id: &RunId) -> Result<Run> {
        self.db.get_run(run_id)
    }

    fn log_param(&self, run_id: &RunId, key: &str, value: ParamValue) -> Result<()> {
        debug!(%run_id, key, %value, "log param");
        self.update_run(run_id, |run| run.log_param(key, value))?;
        Ok(())
    }

    fn log_metric(&self, run_id: &RunId, key: &str, value: f64, step: u64) -> Result<()> {
        debug!(%run_id, key, value, step, "log metric");
        self.update_run(run_id, |run| run.log_metric(key, value, step))?;
        Ok(())
    }

    fn set_tag(&self, run_id: &RunId, key: &str, value: &str) -> Result<()> {
        self.update_run(run_id, |run| run.set_tag(key, value))?;
        Ok(())
    }

    fn log_artifact(&self, run_id: &RunId, path: &str, bytes: &[u8]) -> Result<ContentAddress> {
        let path = normalize_artifact_path(path)?;
        let address = ContentAddress::from_bytes(bytes);

        // Record on the run first so an ended run never gains orphan blobs
        let mut run = self.db.get_run(run_id)?;
        run.add_artifact(path, address.clone())?;
        self.objects.put(bytes)?;
        self.db.update_run(&run)?;

        info!(%run_id, path, hash = %address.hash_hex(), size = address.size(), "logged artifact");
        Ok(address)
    }

    fn end_run(&self, run_id: &RunId, status: RunStatus) -> Result<Run> {
        let run = self.update_run(run_id, |run| run.finish(status))?;
        info!(%run_id, %status, "ended run");
        Ok(run)
    }

    fn download_artifact(&self, run_id: &RunId, path: &str) -> Result<Vec<u8>> {
        let path = normalize_artifact_path(path)?;
        let run = self.db.get_run(run_id)?;
        let address = run.artifacts.get(path).ok_or_else(|| RegflowError::NotFound {
            kind: "artifact".to_string(),
            name: format!("{run_id}/{path}"),
            version: "n/a".to_string(),
        })?;
        self.objects.get(address)
    }

    fn create_registered_model(&self, name: &str, description: &str) -> Result<RegisteredModel> {
        if name.trim().is_empty() || name.contains('/') {
            return Err(RegflowError::Validation(format!(
                "invalid registered model name: '{name}'"
            )));
        }
        let now = Utc::now();
        let model = RegisteredModel {
            name: name.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.db.insert_registered_model(&model)?;
        info!(name, "created registered model");
        Ok(model)
    }

    fn get_registered_model(&self, name: &str) -> Result<RegisteredModel> {
        self.db.get_registered_model(name)
    }

    fn list_registered_models(&self) -> Result<Vec<RegisteredModel>> {
        self.db
            .list_registered_model_names()?
            .iter()
            .map(|name| self.db.get_registered_model(name))
            .collect()
    }

    fn create_model_version(&self, name: &str, source: &ArtifactUri) -> Result<ModelVersion> {
        let ArtifactUri::Run { run_id, path } = source else {
            return Err(RegflowError::Validation(format!(
                "model versions must be created from a runs:/ URI, got {source}"
            )));
        };

        self.db.get_registered_model(name)?;
        let run = self.db.get_run(run_id)?;
        let path = normalize_artifact_path(path)?;
        let content_address = run
            .artifacts
            .get(path)
            .cloned()
            .ok_or_else(|| RegflowError::NotFound {
                kind: "artifact".to_string(),
                name: format!("{run_id}/{path}"),
                version: "n/a".to_string(),
            })?;

        let now = Utc::now();
        let version = self.db.insert_next_version(&ModelVersion {
            name: name.to_string(),
            version: 0,
            current_stage: ModelStage::None,
            source: source.clone(),
            run_id: *run_id,
            content_address,
            created_at: now,
            updated_at: now,
        })?;

        info!(name, version = version.version, %source, "created model version");
        Ok(version)
    }

    fn get_model_version(&self, name: &str, version: u32) -> Result<ModelVersion> {
        self.db.get_model_version(name, version)
    }

    fn list_model_versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        self.db.get_registered_model(name)?;
        self.db.list_model_versions(name)
    }

    fn transition_model_version_stage(
        &self,
        name: &str,
        version: u32,
        stage: ModelStage,
        archive_existing_versions: bool,
    ) -> Result<ModelVersion> {
        let archived = self
            .db
            .update_stage(name, version, stage, archive_existing_versions)?;
        info!(name, version, %stage, archived, "transitioned model version stage");
        self.db.get_model_version(name, version)
    }
}
