//! Artifact URIs
//!
//! Two schemes address a loadable model:
//!
//! - `runs:/<run_id>/<artifact_path>` - an artifact logged by a run
//! - `models:/<name>/<version>` - a registered model version
//! - `models:/<name>/<stage>` - latest version currently in a stage
//! - `models:/<name>/latest` - highest version of the model
//!
//! # Example
//!
//! ```
//! use regflow::uri::{ArtifactUri, ModelSelector};
//!
//! let uri: ArtifactUri = "models:/demo-RandomForestRegressionModel/1".parse().unwrap();
//! assert_eq!(
//!     uri,
//!     ArtifactUri::Model {
//!         name: "demo-RandomForestRegressionModel".to_string(),
//!         selector: ModelSelector::Version(1),
//!     }
//! );
//! ```

use crate::error::{RegflowError, Result};
use crate::model::ModelStage;
use crate::tracking::RunId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const RUNS_PREFIX: &str = "runs:/";
const MODELS_PREFIX: &str = "models:/";

/// Which version of a registered model a `models:/` URI points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelSelector {
    /// Explicit version number.
    Version(u32),
    /// Latest version currently in the given stage.
    Stage(ModelStage),
    /// Highest version number.
    Latest,
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(v) => write!(f, "{v}"),
            Self::Stage(stage) => write!(f, "{stage}"),
            Self::Latest => f.write_str("latest"),
        }
    }
}

impl FromStr for ModelSelector {
    type Err = RegflowError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        if let Ok(version) = s.parse::<u32>() {
            if version == 0 {
                return Err(RegflowError::InvalidUri(
                    "model versions start at 1".to_string(),
                ));
            }
            return Ok(Self::Version(version));
        }
        s.parse::<ModelStage>()
            .map(Self::Stage)
            .map_err(|_| RegflowError::InvalidUri(format!("unknown version or stage: {s}")))
    }
}

/// Parsed artifact URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ArtifactUri {
    /// Artifact logged by a run.
    Run {
        /// Producing run.
        run_id: RunId,
        /// Artifact path relative to the run's artifact root.
        path: String,
    },
    /// Registered model version.
    Model {
        /// Registered model name.
        name: String,
        /// Version, stage or latest.
        selector: ModelSelector,
    },
}

impl ArtifactUri {
    /// Build a `runs:/` URI.
    #[must_use]
    pub fn run(run_id: RunId, path: impl Into<String>) -> Self {
        Self::Run {
            run_id,
            path: path.into(),
        }
    }

    /// Build a `models:/<name>/<version>` URI.
    #[must_use]
    pub fn model_version(name: impl Into<String>, version: u32) -> Self {
        Self::Model {
            name: name.into(),
            selector: ModelSelector::Version(version),
        }
    }

    /// Parse a URI string.
    ///
    /// # Errors
    ///
    /// Returns [`RegflowError::InvalidUri`] for unknown schemes, bad run ids,
    /// empty paths or names, and unknown version selectors.
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();

        if let Some(rest) = uri.strip_prefix(RUNS_PREFIX) {
            Self::parse_run(rest)
        } else if let Some(rest) = uri.strip_prefix(MODELS_PREFIX) {
            Self::parse_model(rest)
        } else {
            Err(RegflowError::InvalidUri(format!(
                "expected runs:/ or models:/ scheme: {uri}"
            )))
        }
    }

    fn parse_run(rest: &str) -> Result<Self> {
        let (id, path) = rest
            .split_once('/')
            .ok_or_else(|| RegflowError::InvalidUri(format!("missing artifact path: runs:/{rest}")))?;

        let run_id: RunId = id
            .parse()
            .map_err(|_| RegflowError::InvalidUri(format!("invalid run id: {id}")))?;

        let path = path.trim_matches('/');
        if path.is_empty() {
            return Err(RegflowError::InvalidUri("empty artifact path".to_string()));
        }

        Ok(Self::run(run_id, path))
    }

    fn parse_model(rest: &str) -> Result<Self> {
        let (name, selector) = rest.split_once('/').ok_or_else(|| {
            RegflowError::InvalidUri(format!("missing version or stage: models:/{rest}"))
        })?;

        if name.is_empty() {
            return Err(RegflowError::InvalidUri("empty model name".to_string()));
        }
        if selector.contains('/') {
            return Err(RegflowError::InvalidUri(format!(
                "unexpected path segment: models:/{rest}"
            )));
        }

        Ok(Self::Model {
            name: name.to_string(),
            selector: selector.parse()?,
        })
    }
}

impl fmt::Display for ArtifactUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run { run_id, path } => write!(f, "{RUNS_PREFIX}{run_id}/{path}"),
            Self::Model { name, selector } => write!(f, "{MODELS_PREFIX}{name}/{selector}"),
        }
    }
}

impl FromStr for ArtifactUri {
    type Err = RegflowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ArtifactUri {
    type Error = RegflowError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ArtifactUri> for String {
    fn from(uri: ArtifactUri) -> Self {
        uri.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_run_uri() {
        let run_id = RunId::new();
        let uri = ArtifactUri::parse(&format!("runs:/{run_id}/model")).unwrap();
        assert_eq!(uri, ArtifactUri::run(run_id, "model"));
    }

    #[test]
    fn test_parse_run_uri_nested_path() {
        let run_id = RunId::new();
        let uri = ArtifactUri::parse(&format!("runs:/{run_id}/models/forest/")).unwrap();
        match uri {
            ArtifactUri::Run { path, .. } => assert_eq!(path, "models/forest"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_run_uri_accepts_hyphenated_id() {
        let run_id = RunId::new();
        let hyphenated = run_id.as_uuid().hyphenated().to_string();
        let uri = ArtifactUri::parse(&format!("runs:/{hyphenated}/model")).unwrap();
        assert_eq!(uri, ArtifactUri::run(run_id, "model"));
    }

    #[test]
    fn test_parse_model_version() {
        let uri = ArtifactUri::parse("models:/fraud/3").unwrap();
        assert_eq!(uri, ArtifactUri::model_version("fraud", 3));
    }

    #[test]
    fn test_parse_model_stage_and_latest() {
        assert_eq!(
            ArtifactUri::parse("models:/fraud/production").unwrap(),
            ArtifactUri::Model {
                name: "fraud".to_string(),
                selector: ModelSelector::Stage(ModelStage::Production),
            }
        );
        assert_eq!(
            ArtifactUri::parse("models:/fraud/Latest").unwrap(),
            ArtifactUri::Model {
                name: "fraud".to_string(),
                selector: ModelSelector::Latest,
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        let run_id = RunId::new();
        let bad = [
            "s3://bucket/model".to_string(),
            "runs:/not-a-uuid/model".to_string(),
            format!("runs:/{run_id}"),
            format!("runs:/{run_id}/"),
            "models:/fraud".to_string(),
            "models://1".to_string(),
            "models:/fraud/0".to_string(),
            "models:/fraud/canary".to_string(),
            "models:/fraud/1/extra".to_string(),
        ];
        for uri in &bad {
            assert!(
                matches!(ArtifactUri::parse(uri), Err(RegflowError::InvalidUri(_))),
                "{uri} should be rejected"
            );
        }
    }

    #[test]
    fn test_display() {
        let uri = ArtifactUri::Model {
            name: "m".to_string(),
            selector: ModelSelector::Stage(ModelStage::Staging),
        };
        assert_eq!(uri.to_string(), "models:/m/Staging");
    }

    #[test]
    fn test_serde_as_string() {
        let uri = ArtifactUri::model_version("m", 7);
        let json = serde_json::to_string(&uri).unwrap();
        assert_eq!(json, "\"models:/m/7\"");
        let back: ArtifactUri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uri);
    }

    proptest! {
        #[test]
        fn prop_model_uri_roundtrip(name in "[a-zA-Z][a-zA-Z0-9_-]{0,30}", version in 1u32..10_000) {
            let uri = ArtifactUri::model_version(name, version);
            let parsed = ArtifactUri::parse(&uri.to_string()).unwrap();
            prop_assert_eq!(parsed, uri);
        }

        #[test]
        fn prop_run_uri_roundtrip(path in "[a-z][a-z0-9_-]{0,12}(/[a-z0-9_-]{1,8}){0,2}") {
            let uri = ArtifactUri::run(RunId::new(), path);
            let parsed = ArtifactUri::parse(&uri.to_string()).unwrap();
            prop_assert_eq!(parsed, uri);
        }
    }
}
