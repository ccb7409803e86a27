//! Experiment tracking: runs, parameters, metrics and logged artifacts.

mod params;

pub use params::ParamValue;

use crate::error::{RegflowError, Result};
use crate::storage::ContentAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for a run.
///
/// Displayed as 32 lowercase hex digits; both that form and the hyphenated
/// UUID form parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Run is accepting params, metrics and artifacts.
    Running,
    /// Run ended successfully.
    Finished,
    /// Run ended with an error.
    Failed,
    /// Run was stopped externally.
    Killed,
}

impl RunStatus {
    /// Whether the run has ended.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        };
        f.pad(s)
    }
}

/// A metric value recorded at a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Metric name.
    pub name: String,
    /// Metric value.
    pub value: f64,
    /// Training step.
    pub step: u64,
    /// Timestamp.
    pub timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a new metric record stamped now.
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64, step: u64) -> Self {
        Self {
            name: name.into(),
            value,
            step,
            timestamp: Utc::now(),
        }
    }
}

/// One tracked training/logging session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique run identifier.
    pub run_id: RunId,
    /// Human-readable name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_name: Option<String>,
    /// Experiment the run belongs to.
    pub experiment_name: String,
    /// Current status.
    pub status: RunStatus,
    /// Logged parameters. Keys are write-once.
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    /// Metrics in logging order.
    #[serde(default)]
    pub metrics: Vec<MetricRecord>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Logged artifacts by path.
    #[serde(default)]
    pub artifacts: BTreeMap<String, ContentAddress>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Start a new run.
    #[must_use]
    pub fn new(experiment_name: impl Into<String>, run_name: Option<String>) -> Self {
        Self {
            run_id: RunId::new(),
            run_name,
            experiment_name: experiment_name.into(),
            status: RunStatus::Running,
            params: BTreeMap::new(),
            metrics: Vec::new(),
            tags: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Whether params and artifacts may still be logged.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(RegflowError::RunNotActive(self.run_id.to_string()))
        }
    }

    /// Log a parameter.
    ///
    /// Re-logging the same value is a no-op; a different value is rejected.
    ///
    /// # Errors
    ///
    /// Returns `RunNotActive` after the run ended, or `Validation` on a
    /// conflicting value, empty key or non-finite float.
    pub fn log_param(&mut self, key: impl Into<String>, value: ParamValue) -> Result<()> {
        self.ensure_active()?;
        let key = key.into();
        if key.trim().is_empty() {
            return Err(RegflowError::Validation("param key is empty".to_string()));
        }
        if let ParamValue::Float(v) = value {
            ensure_finite("param", &key, v)?;
        }
        match self.params.get(&key) {
            Some(existing) if *existing == value => Ok(()),
            Some(existing) => Err(RegflowError::Validation(format!(
                "param '{key}' already logged as {existing}, refusing to change it to {value}"
            ))),
            None => {
                self.params.insert(key, value);
                Ok(())
            }
        }
    }

    /// Log a metric.
    ///
    /// # Errors
    ///
    /// Returns `RunNotActive` after the run ended, or `Validation` for a
    /// NaN or infinite value.
    pub fn log_metric(&mut self, name: impl Into<String>, value: f64, step: u64) -> Result<()> {
        self.ensure_active()?;
        let name = name.into();
        ensure_finite("metric", &name, value)?;
        self.metrics.push(MetricRecord::new(name, value, step));
        Ok(())
    }

    /// Set (or overwrite) a tag.
    ///
    /// # Errors
    ///
    /// Returns `RunNotActive` after the run ended.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.ensure_active()?;
        self.tags.insert(key.into(), value.into());
        Ok(())
    }

    /// Record an artifact stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns `RunNotActive` after the run ended.
    pub fn add_artifact(&mut self, path: impl Into<String>, address: ContentAddress) -> Result<()> {
        self.ensure_active()?;
        self.artifacts.insert(path.into(), address);
        Ok(())
    }

    /// End the run with a terminal status.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for `Running`, `RunNotActive` if already ended.
    pub fn finish(&mut self, status: RunStatus) -> Result<()> {
        if !status.is_terminal() {
            return Err(RegflowError::Validation(
                "cannot end a run with status RUNNING".to_string(),
            ));
        }
        self.ensure_active()?;
        self.status = status;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Latest value for a metric (highest step, last logged wins ties).
    #[must_use]
    pub fn get_metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .filter(|m| m.name == name)
            .max_by_key(|m| m.step)
            .map(|m| m.value)
    }

    /// Duration in seconds, once ended.
    #[must_use]
    pub fn duration_secs(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_seconds())
    }
}

// JSON has no NaN or infinity; such a value would make the stored run unreadable.
fn ensure_finite(kind: &str, key: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RegflowError::Validation(format!(
            "{kind} '{key}' must be finite, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_display_is_simple_hex() {
        let id = RunId::new();
        let s = id.to_string();
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(s.parse::<RunId>().unwrap(), id);
    }

    #[test]
    fn test_run_lifecycle() {
        let mut run = Run::new("Default", Some("logging model example".to_string()));
        assert_eq!(run.status, RunStatus::Running);

        run.log_param("n_estimators", ParamValue::Int(4)).unwrap();
        run.log_metric("mse", 0.5, 0).unwrap();
        run.log_metric("mse", 0.25, 1).unwrap();
        run.add_artifact("model", ContentAddress::from_bytes(b"m"))
            .unwrap();

        assert_eq!(run.get_metric("mse"), Some(0.25));
        assert_eq!(run.get_metric("missing"), None);

        run.finish(RunStatus::Finished).unwrap();
        assert!(!run.is_active());
        assert!(run.duration_secs().is_some());
    }

    #[test]
    fn test_param_write_once() {
        let mut run = Run::new("Default", None);
        run.log_param("random_state", ParamValue::Int(42)).unwrap();
        run.log_param("random_state", ParamValue::Int(42)).unwrap();

        let result = run.log_param("random_state", ParamValue::Int(7));
        assert!(matches!(result, Err(RegflowError::Validation(_))));
        assert_eq!(run.params["random_state"], ParamValue::Int(42));
    }

    #[test]
    fn test_ended_run_rejects_logging() {
        let mut run = Run::new("Default", None);
        run.finish(RunStatus::Failed).unwrap();

        assert!(matches!(
            run.log_param("a", ParamValue::Bool(true)),
            Err(RegflowError::RunNotActive(_))
        ));
        assert!(matches!(
            run.add_artifact("model", ContentAddress::from_bytes(b"x")),
            Err(RegflowError::RunNotActive(_))
        ));
        assert!(matches!(
            run.log_metric("loss", 0.1, 0),
            Err(RegflowError::RunNotActive(_))
        ));
        assert!(matches!(
            run.set_tag("late", "x"),
            Err(RegflowError::RunNotActive(_))
        ));
        assert!(run.tags.is_empty());
        assert!(matches!(
            run.finish(RunStatus::Finished),
            Err(RegflowError::RunNotActive(_))
        ));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let mut run = Run::new("Default", None);

        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                run.log_metric("loss", value, 0),
                Err(RegflowError::Validation(_))
            ));
            assert!(matches!(
                run.log_param("lr", ParamValue::Float(value)),
                Err(RegflowError::Validation(_))
            ));
        }
        assert!(run.metrics.is_empty());
        assert!(run.params.is_empty());

        run.log_param("lr", ParamValue::Float(0.01)).unwrap();
        run.log_metric("loss", -0.5, 0).unwrap();
        let json = serde_json::to_string(&run).unwrap();
        let back: Run = serde_json::from_str(&json).unwrap();
        assert_eq!(back.params["lr"], ParamValue::Float(0.01));
    }

    #[test]
    fn test_finish_with_running_rejected() {
        let mut run = Run::new("Default", None);
        assert!(run.finish(RunStatus::Running).is_err());
    }

    #[test]
    fn test_run_serialization() {
        let mut run = Run::new("Default", None);
        run.log_param("n_estimators", ParamValue::Int(4)).unwrap();
        run.set_tag("source", "regflow").unwrap();

        let json = serde_json::to_string(&run).unwrap();
        assert!(json.contains("\"RUNNING\""));
        let back: Run = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, run.run_id);
        assert_eq!(back.params, run.params);
        assert_eq!(back.tags["source"], "regflow");
    }
}
