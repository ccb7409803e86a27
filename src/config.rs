//! Workflow configuration.
//!
//! Every field has a default, so an empty TOML file (or none at all)
//! reproduces the stock tutorial. The binary layers `REGFLOW_NAMESPACE`
//! and command-line flags on top of whatever the file provides.

use crate::error::{RegflowError, Result};
use crate::estimator::ForestParams;
use crate::model::ModelStage;
use crate::tracking::ParamValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Suffix appended to the namespace to form the registered model name.
pub const MODEL_NAME_SUFFIX: &str = "RandomForestRegressionModel";

/// Environment variable overriding [`WorkflowConfig::namespace`].
pub const NAMESPACE_ENV: &str = "REGFLOW_NAMESPACE";

/// Training set for the demo model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingData {
    /// Feature rows.
    pub x: Vec<Vec<f64>>,
    /// Target per row.
    pub y: Vec<f64>,
}

impl Default for TrainingData {
    fn default() -> Self {
        Self {
            x: vec![vec![0.0, 1.0, 0.0]],
            y: vec![1.0],
        }
    }
}

/// Parameters of one workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Prefix of the registered model name.
    pub namespace: String,
    /// Experiment the run is filed under.
    pub experiment_name: String,
    /// Display name of the run.
    pub run_name: String,
    /// Artifact path the model is logged at inside the run.
    pub artifact_path: String,
    /// Estimator parameters, logged verbatim on the run.
    pub params: BTreeMap<String, ParamValue>,
    /// Data the model is fitted on.
    pub training: TrainingData,
    /// Rows fed to the loaded model.
    pub input_rows: Vec<Vec<f64>>,
    /// Stage the registered version ends up in.
    pub target_stage: ModelStage,
    /// Archive other versions already in `target_stage`.
    pub archive_existing_versions: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let mut params = BTreeMap::new();
        params.insert("n_estimators".to_string(), ParamValue::Int(4));
        params.insert("random_state".to_string(), ParamValue::Int(42));

        Self {
            namespace: "demo".to_string(),
            experiment_name: "Default".to_string(),
            run_name: "logging model example".to_string(),
            artifact_path: "model".to_string(),
            params,
            training: TrainingData::default(),
            input_rows: vec![vec![0.0, 1.0, 0.0]],
            target_stage: ModelStage::Staging,
            archive_existing_versions: false,
        }
    }
}

impl WorkflowConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `TomlDeserialize` on syntax errors, unknown keys or an
    /// invalid stage, and `Validation` if the result is unusable.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as
    /// [`WorkflowConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Apply `REGFLOW_NAMESPACE` if it is set and non-empty.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(namespace) = std::env::var(NAMESPACE_ENV) {
            if !namespace.trim().is_empty() {
                self.namespace = namespace.trim().to_string();
            }
        }
        self
    }

    /// Name the model is registered under.
    #[must_use]
    pub fn model_name(&self) -> String {
        format!("{}-{MODEL_NAME_SUFFIX}", self.namespace)
    }

    /// Estimator parameters decoded from [`WorkflowConfig::params`].
    ///
    /// # Errors
    ///
    /// Returns `Validation` for unknown keys or mistyped values.
    pub fn forest_params(&self) -> Result<ForestParams> {
        ForestParams::from_params(&self.params)
    }

    /// Check the configuration can drive a workflow.
    ///
    /// # Errors
    ///
    /// Returns `Validation` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let namespace = self.namespace.trim();
        if namespace.is_empty() || namespace.contains('/') {
            return Err(RegflowError::Validation(format!(
                "invalid namespace '{}'",
                self.namespace
            )));
        }
        if self.artifact_path.trim_matches('/').is_empty() {
            return Err(RegflowError::Validation(
                "artifact path must not be empty".to_string(),
            ));
        }
        if self.input_rows.is_empty() {
            return Err(RegflowError::Validation(
                "at least one input row is required".to_string(),
            ));
        }
        self.forest_params()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_tutorial() {
        let config = WorkflowConfig::default();
        assert_eq!(config.model_name(), "demo-RandomForestRegressionModel");
        assert_eq!(config.run_name, "logging model example");
        assert_eq!(config.artifact_path, "model");
        assert_eq!(config.target_stage, ModelStage::Staging);
        assert!(!config.archive_existing_versions);

        let params = config.forest_params().unwrap();
        assert_eq!(params.n_estimators, 4);
        assert_eq!(params.random_state, Some(42));
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(
            WorkflowConfig::from_toml_str("").unwrap(),
            WorkflowConfig::default()
        );
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = WorkflowConfig::from_toml_str(
            r#"
namespace = "team-a"
target_stage = "production"
archive_existing_versions = true

[params]
n_estimators = 8
random_state = 7

[training]
x = [[0, 1, 0], [1, 0, 1]]
y = [1, 2]
"#,
        )
        .unwrap();

        assert_eq!(config.model_name(), "team-a-RandomForestRegressionModel");
        assert_eq!(config.target_stage, ModelStage::Production);
        assert!(config.archive_existing_versions);
        assert_eq!(config.params["n_estimators"], ParamValue::Int(8));
        assert_eq!(config.training.y, vec![1.0, 2.0]);
        assert_eq!(config.run_name, "logging model example");
    }

    #[test]
    fn test_invalid_stage_rejected() {
        let result = WorkflowConfig::from_toml_str(r#"target_stage = "Canary""#);
        assert!(matches!(result, Err(RegflowError::TomlDeserialize(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(WorkflowConfig::from_toml_str("namespce = \"x\"").is_err());
    }

    #[test]
    fn test_unknown_param_rejected() {
        let result = WorkflowConfig::from_toml_str("[params]\nlearning_rate = 0.1");
        assert!(matches!(result, Err(RegflowError::Validation(_))));
    }

    #[test]
    fn test_bad_namespace_rejected() {
        for ns in ["", "  ", "a/b"] {
            let config = WorkflowConfig {
                namespace: ns.to_string(),
                ..WorkflowConfig::default()
            };
            assert!(config.validate().is_err(), "namespace {ns:?}");
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "namespace = \"from-file\"").unwrap();

        let config = WorkflowConfig::from_file(file.path()).unwrap();
        assert_eq!(config.namespace, "from-file");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = WorkflowConfig::from_file("/nonexistent/regflow.toml");
        assert!(matches!(result, Err(RegflowError::Io(_))));
    }
}
