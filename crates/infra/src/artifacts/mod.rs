//! Versioned forecast artifacts.
//!
//! ## Design
//!
//! - A run publishes one immutable [`ArtifactSnapshot`] (forecast points plus
//!   registry) under a strictly increasing version.
//! - "Latest" is a single pointer swapped in one step; readers clone an `Arc`
//!   and never observe a half-published snapshot.
//! - The current and at least the previous snapshot stay readable.
//!
//! ## Components
//!
//! - `ArtifactStore`: the storage seam used by the orchestrator and the API
//! - `InMemoryArtifactStore`: tests and ephemeral deployments
//! - `FsArtifactStore`: durable directory-per-version layout with an atomic
//!   `LATEST` pointer file

pub mod fs;
pub mod store;

pub use fs::FsArtifactStore;
pub use store::{ArtifactSnapshot, ArtifactStore, InMemoryArtifactStore, StoreError, Versioned};
