//! Registered models and their versions.

mod stage;

pub use stage::ModelStage;

use crate::storage::ContentAddress;
use crate::tracking::RunId;
use crate::uri::ArtifactUri;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, mutable container of model versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredModel {
    /// Unique model name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last time a version was added or changed stage.
    pub updated_at: DateTime<Utc>,
}

/// An immutable, numbered snapshot of a run artifact.
///
/// Only `stage` and `updated_at` ever change after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Parent registered model name.
    pub name: String,
    /// Version number, starting at 1 and strictly increasing per name.
    pub version: u32,
    /// Current lifecycle stage.
    pub current_stage: ModelStage,
    /// URI the version was registered from (`runs:/...`).
    pub source: ArtifactUri,
    /// Run that produced the artifact.
    pub run_id: RunId,
    /// Address of the artifact blob.
    pub content_address: ContentAddress,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Last stage change.
    pub updated_at: DateTime<Utc>,
}

impl ModelVersion {
    /// The `models:/<name>/<version>` URI addressing exactly this version.
    #[must_use]
    pub fn model_uri(&self) -> ArtifactUri {
        ArtifactUri::model_version(&self.name, self.version)
    }
}
