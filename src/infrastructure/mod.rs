pub mod artifact_store;
pub mod blob_store;
pub mod dataset_loader;

pub use artifact_store::ArtifactStore;
pub use blob_store::{FsBlobStore, InMemoryBlobStore};
