//! Random forest regressor trained and served by the workflow.
//!
//! A thin adapter over [`aprender::tree::RandomForestRegressor`]: rows
//! arrive as `Vec<Vec<f64>>`, are checked here, and are handed to
//! aprender as an `f32` matrix. Fitting is deterministic for a given
//! `random_state`.

use crate::error::{RegflowError, Result};
use crate::tracking::ParamValue;
use aprender::primitives::{Matrix, Vector};
use aprender::tree::RandomForestRegressor as Forest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Largest accepted seed; it must round-trip through an `Int` param.
pub const MAX_RANDOM_STATE: u64 = i64::MAX as u64;

/// Hyperparameters of [`RandomForestRegressor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees.
    pub n_estimators: usize,
    /// Seed for bootstrap sampling.
    pub random_state: Option<u64>,
    /// Maximum tree depth; unlimited when `None`.
    pub max_depth: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            random_state: None,
            max_depth: None,
        }
    }
}

impl ForestParams {
    /// Build parameters from a logged parameter map.
    ///
    /// Keys not present keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown keys, wrong value types,
    /// negative counts, or `n_estimators == 0`.
    pub fn from_params(params: &BTreeMap<String, ParamValue>) -> Result<Self> {
        let mut out = Self::default();
        for (key, value) in params {
            match key.as_str() {
                "n_estimators" => out.n_estimators = count(key, value)?,
                "random_state" => out.random_state = Some(count(key, value)? as u64),
                "max_depth" => out.max_depth = Some(count(key, value)?),
                other => {
                    return Err(RegflowError::Validation(format!(
                        "unknown random forest parameter: {other}"
                    )))
                }
            }
        }
        out.validate()?;
        Ok(out)
    }

    /// The parameters in loggable form, omitting unset options.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a value does not fit in an `Int` param.
    pub fn to_params(&self) -> Result<BTreeMap<String, ParamValue>> {
        let mut params = BTreeMap::new();
        params.insert("n_estimators".to_string(), int("n_estimators", self.n_estimators)?);
        if let Some(seed) = self.random_state {
            let seed = i64::try_from(seed).map_err(|_| seed_error(seed))?;
            params.insert("random_state".to_string(), ParamValue::Int(seed));
        }
        if let Some(depth) = self.max_depth {
            params.insert("max_depth".to_string(), int("max_depth", depth)?);
        }
        Ok(params)
    }

    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(RegflowError::Validation(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        match self.random_state {
            Some(seed) if seed > MAX_RANDOM_STATE => Err(seed_error(seed)),
            _ => Ok(()),
        }
    }
}

fn count(key: &str, value: &ParamValue) -> Result<usize> {
    let n = value.as_int().ok_or_else(|| type_error(key, "int", value))?;
    usize::try_from(n)
        .map_err(|_| RegflowError::Validation(format!("{key} must be non-negative, got {n}")))
}

fn int(key: &str, n: usize) -> Result<ParamValue> {
    i64::try_from(n)
        .map(ParamValue::Int)
        .map_err(|_| RegflowError::Validation(format!("{key} is too large: {n}")))
}

fn seed_error(seed: u64) -> RegflowError {
    RegflowError::Validation(format!(
        "random_state must be at most {MAX_RANDOM_STATE}, got {seed}"
    ))
}

fn type_error(key: &str, expected: &str, value: &ParamValue) -> RegflowError {
    RegflowError::Validation(format!(
        "{key} must be {expected}, got {} ({value})",
        value.type_name()
    ))
}

/// Random forest regressor with checked inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    n_features: usize,
    forest: Forest,
}

impl RandomForestRegressor {
    /// Create an unfitted forest.
    #[must_use]
    pub fn new(params: ForestParams) -> Self {
        let mut forest = Forest::new(params.n_estimators);
        if let Some(depth) = params.max_depth {
            forest = forest.with_max_depth(depth);
        }
        if let Some(seed) = params.random_state {
            forest = forest.with_random_state(seed);
        }
        Self {
            params,
            n_features: 0,
            forest,
        }
    }

    /// Hyperparameters.
    #[must_use]
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Number of features seen during fit (0 before fitting).
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Whether [`fit`](Self::fit) has completed.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.n_features > 0 && self.forest.feature_importances().is_some()
    }

    /// Fit the forest on rows `x` with targets `y`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for empty data, mismatched lengths or non-finite
    /// values, `ShapeMismatch` for ragged rows, and `Estimator` if the
    /// model library rejects the data.
    pub fn fit(mut self, x: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        self.params.validate()?;
        if x.is_empty() {
            return Err(RegflowError::Validation(
                "cannot fit on an empty dataset".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(RegflowError::Validation(format!(
                "x has {} rows but y has {} targets",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 {
            return Err(RegflowError::Validation(
                "rows must have at least one feature".to_string(),
            ));
        }

        let matrix = to_matrix(x, n_features)?;
        let targets: Vec<f32> = y.iter().map(|&v| v as f32).collect();
        if targets.iter().any(|v| !v.is_finite()) {
            return Err(RegflowError::Validation(
                "training targets contain NaN or values outside f32 range".to_string(),
            ));
        }

        self.forest.fit(&matrix, &Vector::from_vec(targets))?;
        self.n_features = n_features;

        debug!(
            n_estimators = self.params.n_estimators,
            n_rows = x.len(),
            n_features,
            "fitted random forest"
        );
        Ok(self)
    }

    /// Predict one value per row: the mean over all trees.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if unfitted or a value is not finite, and
    /// `ShapeMismatch` if a row's width differs from the training width.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(RegflowError::Validation(
                "model must be fitted before predicting".to_string(),
            ));
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let matrix = to_matrix(rows, self.n_features)?;
        let predictions = self.forest.predict(&matrix);
        Ok(predictions.as_slice().iter().map(|&v| f64::from(v)).collect())
    }
}

/// Row-major `f32` matrix of `rows`, each exactly `width` wide.
fn to_matrix(rows: &[Vec<f64>], width: usize) -> Result<Matrix<f32>> {
    let mut data = Vec::with_capacity(rows.len() * width);
    for row in rows {
        if row.len() != width {
            return Err(RegflowError::ShapeMismatch {
                expected: width,
                actual: row.len(),
            });
        }
        for &value in row {
            let value = value as f32;
            if !value.is_finite() {
                return Err(RegflowError::Validation(
                    "features contain NaN or values outside f32 range".to_string(),
                ));
            }
            data.push(value);
        }
    }
    Matrix::from_vec(rows.len(), width, data)
        .map_err(|e| RegflowError::Validation(format!("cannot build feature matrix: {e}")))
}
