//! Artifact storage.
//!
//! Logged artifacts are stored as BLAKE3 content-addressed blobs; the
//! registry database maps `(run_id, artifact_path)` to an address.

mod content_address;
mod object_store;

pub use content_address::ContentAddress;
pub use object_store::ObjectStore;
