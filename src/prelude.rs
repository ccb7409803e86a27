//! Convenient re-exports for common usage.
//!
//! ```
//! use regflow::prelude::*;
//! ```

// Core types
pub use crate::error::{RegflowError, Result};
pub use crate::registry::{Registry, RegistryConfig, StorageStats};

// Client and workflow
pub use crate::client::{load_model, register_model, RegistryClient};
pub use crate::config::{TrainingData, WorkflowConfig};
pub use crate::workflow::{RegistryWorkflow, Step, WorkflowReport};

// Model types
pub use crate::artifact::{LoadedModel, ModelArtifact};
pub use crate::estimator::{ForestParams, RandomForestRegressor};
pub use crate::model::{ModelStage, ModelVersion, RegisteredModel};
pub use crate::uri::{ArtifactUri, ModelSelector};

// Tracking types
pub use crate::tracking::{MetricRecord, ParamValue, Run, RunId, RunStatus};

// Storage types
pub use crate::storage::ContentAddress;
