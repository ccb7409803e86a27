//! Error types for registry workflow operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for regflow operations.
pub type Result<T> = std::result::Result<T, RegflowError>;

/// Errors that can occur while tracking, registering or serving a model.
#[derive(Error, Debug)]
pub enum RegflowError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration could not be parsed.
    #[error("TOML error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// Run, model, version or artifact not found.
    #[error("{kind} not found: '{name}' version {version}")]
    NotFound {
        /// Kind of entity (run, registered model, model version, artifact).
        kind: String,
        /// Name or identifier of the entity.
        name: String,
        /// Version requested, or `n/a`.
        version: String,
    },

    /// Registered model already exists.
    #[error("registered model already exists: '{0}'")]
    AlreadyExists(String),

    /// The model library rejected the training data.
    #[error("estimator error: {0}")]
    Estimator(#[from] aprender::AprenderError),

    /// Artifact URI could not be parsed.
    #[error("invalid artifact URI: {0}")]
    InvalidUri(String),

    /// Stage name is not one of None, Staging, Production, Archived.
    #[error("invalid stage '{0}': expected one of None, Staging, Production, Archived")]
    InvalidStage(String),

    /// Prediction input does not match the fitted feature count.
    #[error("input shape mismatch: expected {expected} features, got {actual}")]
    ShapeMismatch {
        /// Number of features the model was fitted on.
        expected: usize,
        /// Number of features in the offending row.
        actual: usize,
    },

    /// Run is no longer accepting params or artifacts.
    #[error("run {0} is not active")]
    RunNotActive(String),

    /// Artifact was written by an unknown model flavor.
    #[error("unsupported model flavor: {0}")]
    UnsupportedFlavor(String),

    /// Content hash mismatch.
    #[error("content hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Expected hash.
        expected: String,
        /// Actual hash computed.
        actual: String,
    },

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// Registry not initialized.
    #[error("registry not initialized at {0}")]
    NotInitialized(PathBuf),
}

impl RegflowError {
    /// Shorthand for a [`RegflowError::NotFound`] without a version.
    pub(crate) fn not_found(kind: &str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            name: name.into(),
            version: "n/a".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = RegflowError::NotFound {
            kind: "model version".to_string(),
            name: "demo-RandomForestRegressionModel".to_string(),
            version: "3".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "model version not found: 'demo-RandomForestRegressionModel' version 3"
        );
    }

    #[test]
    fn test_error_display_shape_mismatch() {
        let err = RegflowError::ShapeMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "input shape mismatch: expected 3 features, got 2"
        );
    }

    #[test]
    fn test_error_display_invalid_stage() {
        let err = RegflowError::InvalidStage("Canary".to_string());
        assert!(err.to_string().starts_with("invalid stage 'Canary'"));
    }

    #[test]
    fn test_not_found_helper() {
        let err = RegflowError::not_found("run", "abc");
        assert!(matches!(err, RegflowError::NotFound { ref version, .. } if version == "n/a"));
    }
}
