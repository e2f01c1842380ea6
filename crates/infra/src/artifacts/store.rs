//! Artifact store abstraction and in-memory implementation.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use kitchencast_core::ForecastPoint;
use kitchencast_forecast::ModelDescriptor;

/// The complete output of one successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSnapshot {
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    pub forecasts: Vec<ForecastPoint>,
    pub registry: Vec<ModelDescriptor>,
}

impl ArtifactSnapshot {
    pub fn new(
        version: u64,
        generated_at: DateTime<Utc>,
        forecasts: Vec<ForecastPoint>,
        registry: Vec<ModelDescriptor>,
    ) -> Self {
        Self {
            version,
            generated_at,
            forecasts,
            registry,
        }
    }
}

/// Items tagged with the snapshot version they were read from. Also the
/// on-disk envelope of each persisted resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Versioned<T> {
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    pub items: T,
}

/// Artifact store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Nothing has ever been published.
    #[error("no artifacts have been published yet")]
    NotFound,
    #[error("artifact version {0} is not available")]
    UnknownVersion(u64),
    #[error("stale version {attempted}: latest is {latest}")]
    StaleVersion { attempted: u64, latest: u64 },
    #[error("artifact io error: {0}")]
    Io(String),
    #[error("artifact serialization error: {0}")]
    Serialization(String),
    #[error("artifact store is corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn io(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        Self::Io(format!("{context}: {err}"))
    }
}

/// Artifact store abstraction.
///
/// Implementations must make `publish` atomic with respect to every read
/// method: a reader sees either the whole previous snapshot or the whole new
/// one.
pub trait ArtifactStore: Send + Sync {
    /// Publish a snapshot. Its version must be greater than the latest.
    fn publish(&self, snapshot: ArtifactSnapshot) -> Result<Arc<ArtifactSnapshot>, StoreError>;

    /// The latest snapshot, as one consistent unit.
    fn read_latest(&self) -> Result<Arc<ArtifactSnapshot>, StoreError>;

    /// A specific retained version.
    fn read_version(&self, version: u64) -> Result<Arc<ArtifactSnapshot>, StoreError>;

    fn read_latest_forecasts(&self) -> Result<Versioned<Vec<ForecastPoint>>, StoreError> {
        let snapshot = self.read_latest()?;
        Ok(Versioned {
            version: snapshot.version,
            generated_at: snapshot.generated_at,
            items: snapshot.forecasts.clone(),
        })
    }

    fn read_latest_registry(&self) -> Result<Versioned<Vec<ModelDescriptor>>, StoreError> {
        let snapshot = self.read_latest()?;
        Ok(Versioned {
            version: snapshot.version,
            generated_at: snapshot.generated_at,
            items: snapshot.registry.clone(),
        })
    }

    /// `None` until the first publish.
    fn latest_version(&self) -> Option<u64> {
        self.read_latest().ok().map(|s| s.version)
    }
}

/// Latest snapshot plus the retained predecessors, newest first.
#[derive(Debug, Default)]
pub(crate) struct Versions {
    pub(crate) latest: Option<Arc<ArtifactSnapshot>>,
    pub(crate) previous: VecDeque<Arc<ArtifactSnapshot>>,
}

impl Versions {
    pub(crate) fn check_newer(&self, version: u64) -> Result<(), StoreError> {
        match &self.latest {
            Some(latest) if version <= latest.version => Err(StoreError::StaleVersion {
                attempted: version,
                latest: latest.version,
            }),
            _ => Ok(()),
        }
    }

    /// Swap in `next` as latest; `retain` counts the latest too.
    pub(crate) fn swap(&mut self, next: Arc<ArtifactSnapshot>, retain: usize) {
        if let Some(old) = self.latest.replace(next) {
            self.previous.push_front(old);
        }
        self.previous.truncate(retain.saturating_sub(1));
    }

    pub(crate) fn find(&self, version: u64) -> Option<Arc<ArtifactSnapshot>> {
        self.latest
            .iter()
            .chain(self.previous.iter())
            .find(|s| s.version == version)
            .cloned()
    }
}

/// In-memory artifact store for tests/dev.
#[derive(Debug)]
pub struct InMemoryArtifactStore {
    versions: RwLock<Versions>,
    retain: usize,
}

impl InMemoryArtifactStore {
    pub const MIN_RETAIN: usize = 2;

    pub fn new() -> Self {
        Self::with_retention(Self::MIN_RETAIN)
    }

    /// Keep the newest `retain` snapshots (never fewer than two).
    pub fn with_retention(retain: usize) -> Self {
        Self {
            versions: RwLock::new(Versions::default()),
            retain: retain.max(Self::MIN_RETAIN),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn publish(&self, snapshot: ArtifactSnapshot) -> Result<Arc<ArtifactSnapshot>, StoreError> {
        let next = Arc::new(snapshot);
        let mut versions = self.versions.write().unwrap_or_else(PoisonError::into_inner);
        versions.check_newer(next.version)?;
        versions.swap(next.clone(), self.retain);
        drop(versions);

        info!(
            version = next.version,
            points = next.forecasts.len(),
            categories = next.registry.len(),
            "artifact snapshot published"
        );
        Ok(next)
    }

    fn read_latest(&self) -> Result<Arc<ArtifactSnapshot>, StoreError> {
        self.versions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
            .clone()
            .ok_or(StoreError::NotFound)
    }

    fn read_version(&self, version: u64) -> Result<Arc<ArtifactSnapshot>, StoreError> {
        let versions = self.versions.read().unwrap_or_else(PoisonError::into_inner);
        if versions.latest.is_none() {
            return Err(StoreError::NotFound);
        }
        versions.find(version).ok_or(StoreError::UnknownVersion(version))
    }
}
