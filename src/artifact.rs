//! Serialized model artifacts and loaded prediction handles.
//!
//! A logged model is a JSON envelope naming its flavor, so a loader can
//! refuse artifacts it does not understand instead of misreading them.

use crate::error::{RegflowError, Result};
use crate::estimator::RandomForestRegressor;
use crate::uri::ArtifactUri;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flavor tag for [`RandomForestRegressor`] artifacts.
pub const RANDOM_FOREST_FLAVOR: &str = "random_forest_regressor";

/// Current envelope format version.
pub const FORMAT_VERSION: u32 = 1;

/// On-disk model envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Which estimator produced `model`.
    pub flavor: String,
    /// Envelope format version.
    pub format_version: u32,
    /// Width of input rows.
    pub n_features: usize,
    /// When the artifact was written.
    pub created_at: DateTime<Utc>,
    /// Flavor-specific payload.
    pub model: serde_json::Value,
}

impl ModelArtifact {
    /// Wrap a fitted forest.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the forest is not fitted.
    pub fn from_forest(forest: &RandomForestRegressor) -> Result<Self> {
        if !forest.is_fitted() {
            return Err(RegflowError::Validation(
                "cannot log an unfitted model".to_string(),
            ));
        }
        Ok(Self {
            flavor: RANDOM_FOREST_FLAVOR.to_string(),
            format_version: FORMAT_VERSION,
            n_features: forest.n_features(),
            created_at: Utc::now(),
            model: serde_json::to_value(forest)?,
        })
    }

    /// Serialize to bytes for the artifact store.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse an envelope from artifact bytes.
    ///
    /// # Errors
    ///
    /// Returns `Json` for malformed bytes and `UnsupportedFlavor` for
    /// unknown flavors or newer format versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Self = serde_json::from_slice(bytes)?;
        if artifact.flavor != RANDOM_FOREST_FLAVOR {
            return Err(RegflowError::UnsupportedFlavor(artifact.flavor));
        }
        if artifact.format_version > FORMAT_VERSION {
            return Err(RegflowError::UnsupportedFlavor(format!(
                "{} format version {}",
                artifact.flavor, artifact.format_version
            )));
        }
        Ok(artifact)
    }
}

/// Transient predictor created by loading an artifact URI.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    source: ArtifactUri,
    forest: RandomForestRegressor,
}

impl LoadedModel {
    /// Decode artifact bytes loaded from `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a supported artifact.
    pub fn from_bytes(source: ArtifactUri, bytes: &[u8]) -> Result<Self> {
        let artifact = ModelArtifact::from_bytes(bytes)?;
        let forest: RandomForestRegressor = serde_json::from_value(artifact.model)?;
        if forest.n_features() != artifact.n_features {
            return Err(RegflowError::Validation(format!(
                "artifact declares {} features but model was fitted on {}",
                artifact.n_features,
                forest.n_features()
            )));
        }
        Ok(Self { source, forest })
    }

    /// URI this model was loaded from.
    #[must_use]
    pub fn source(&self) -> &ArtifactUri {
        &self.source
    }

    /// Expected input row width.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.forest.n_features()
    }

    /// Predict one value per input row.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if a row has the wrong width.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.forest.predict(rows)
    }
}
