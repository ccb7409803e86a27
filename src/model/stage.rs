//! Model version lifecycle stages.

use crate::error::{RegflowError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle stage of a model version.
///
/// Any stage may be reached from any other; the registry only checks
/// membership in this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum ModelStage {
    /// Freshly registered, not yet assigned a stage.
    #[default]
    None,
    /// Under validation before release.
    Staging,
    /// Serving production traffic.
    Production,
    /// Retired.
    Archived,
}

impl ModelStage {
    /// Get all valid stages.
    #[must_use]
    pub fn all() -> &'static [ModelStage] {
        &[
            ModelStage::None,
            ModelStage::Staging,
            ModelStage::Production,
            ModelStage::Archived,
        ]
    }

    /// Canonical name as shown to users.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Staging => "Staging",
            Self::Production => "Production",
            Self::Archived => "Archived",
        }
    }

    /// Whether moving a version into this stage may archive its siblings.
    #[must_use]
    pub fn is_deployment(&self) -> bool {
        matches!(self, Self::Staging | Self::Production)
    }

    /// Check if this stage is active (not archived).
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Archived)
    }
}

impl fmt::Display for ModelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ModelStage {
    type Err = RegflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            "archived" => Ok(Self::Archived),
            _ => Err(RegflowError::InvalidStage(s.to_string())),
        }
    }
}

impl TryFrom<String> for ModelStage {
    type Error = RegflowError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ModelStage> for String {
    fn from(stage: ModelStage) -> Self {
        stage.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(ModelStage::None.to_string(), "None");
        assert_eq!(ModelStage::Staging.to_string(), "Staging");
        assert_eq!(ModelStage::Production.to_string(), "Production");
        assert_eq!(ModelStage::Archived.to_string(), "Archived");
    }

    #[test]
    fn test_stage_parse_case_insensitive() {
        assert_eq!("None".parse::<ModelStage>().unwrap(), ModelStage::None);
        assert_eq!("staging".parse::<ModelStage>().unwrap(), ModelStage::Staging);
        assert_eq!(
            "PRODUCTION".parse::<ModelStage>().unwrap(),
            ModelStage::Production
        );
        assert_eq!(
            " Archived ".parse::<ModelStage>().unwrap(),
            ModelStage::Archived
        );
    }

    #[test]
    fn test_stage_parse_rejects_unknown() {
        for bad in ["", "dev", "prod", "Canary", "Stagingg"] {
            assert!(matches!(
                bad.parse::<ModelStage>(),
                Err(RegflowError::InvalidStage(_))
            ));
        }
    }

    #[test]
    fn test_default_is_none() {
        assert_eq!(ModelStage::default(), ModelStage::None);
    }

    #[test]
    fn test_deployment_stages() {
        assert!(ModelStage::Staging.is_deployment());
        assert!(ModelStage::Production.is_deployment());
        assert!(!ModelStage::None.is_deployment());
        assert!(!ModelStage::Archived.is_deployment());
        assert!(!ModelStage::Archived.is_active());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&ModelStage::Staging).unwrap();
        assert_eq!(json, "\"Staging\"");

        let back: ModelStage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ModelStage::Staging);

        let lower: ModelStage = serde_json::from_str("\"production\"").unwrap();
        assert_eq!(lower, ModelStage::Production);
        assert!(serde_json::from_str::<ModelStage>("\"Canary\"").is_err());
    }

    #[test]
    fn test_every_stage_roundtrips_through_display() {
        for stage in ModelStage::all() {
            assert_eq!(stage.to_string().parse::<ModelStage>().unwrap(), *stage);
        }
    }
}
