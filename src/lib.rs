// Clippy configuration for regflow crate
// Allow precision loss in size and count conversions
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_lossless)]
// Allow similar names in split search
#![allow(clippy::similar_names)]
// Allow map().unwrap_or() pattern
#![allow(clippy::map_unwrap_or)]
// Allow redundant closures for clarity
#![allow(clippy::redundant_closure_for_method_calls)]
// Allow format string style choices
#![allow(clippy::uninlined_format_args)]
// Doc backticks optional
#![allow(clippy::doc_markdown)]
// Allow missing docs for internal items
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// Allow unwrap in verified contexts
#![allow(clippy::unwrap_used)]
// Allow manual Default implementations
#![allow(clippy::derivable_impls)]
// Allow identical match arms for clarity
#![allow(clippy::match_same_arms)]
// Allow map_or patterns
#![allow(clippy::option_if_let_else)]
// Allow pass-by-value for small types
#![allow(clippy::needless_pass_by_value)]
// Allow module names repeated in type names
#![allow(clippy::module_name_repetitions)]

//! Regflow: model tracking and registry workflow
//!
//! Regflow trains a small random-forest regressor, logs it in a tracked
//! run, registers it under a name, loads it back by URI, predicts, and
//! moves the registered version through lifecycle stages.
//!
//! # Quick Start
//!
//! ```no_run
//! use regflow::prelude::*;
//!
//! // The client is constructed explicitly and lent to the workflow
//! let registry = Registry::open_default()?;
//! let workflow = RegistryWorkflow::new(&registry, WorkflowConfig::default());
//!
//! let report = workflow.run(|step| println!("{step}"))?;
//! println!("Name: {}", report.registered.name);
//! println!("Version: {}", report.registered.version);
//! println!("model_pred: {:?}", report.registry_predictions);
//! # Ok::<(), regflow::error::RegflowError>(())
//! ```
//!
//! # Architecture
//!
//! - **Workflow** - [`workflow::RegistryWorkflow`] runs the fixed sequence
//!   of steps against any [`client::RegistryClient`]
//! - **Registry** - [`registry::Registry`] is the local tracking and model
//!   registry service
//! - **Estimator** - [`estimator::RandomForestRegressor`] is the model
//!   being tracked
//!
//! # Storage
//!
//! Artifacts live in content-addressed storage keyed by BLAKE3 hash.
//! Run and registry metadata is stored in `SQLite` at
//! `~/.regflow/registry.db`.
//!
//! # URIs
//!
//! - `runs:/<run_id>/<path>` names an artifact logged by a run
//! - `models:/<name>/<version>` names a registered version; the last
//!   segment may also be a stage name or `latest`

pub mod artifact;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod estimator;
pub mod model;
pub mod prelude;
pub mod registry;
pub mod storage;
pub mod tracking;
pub mod uri;
pub mod workflow;

pub use error::{RegflowError, Result};
pub use registry::{Registry, RegistryConfig, StorageStats};
