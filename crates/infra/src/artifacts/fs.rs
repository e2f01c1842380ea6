//! Durable artifact store on the local file system.
//!
//! Layout under the root directory:
//!
//! ```text
//! LATEST                          decimal version of the current snapshot
//! snapshots/v0000000007/forecasts.json
//! snapshots/v0000000007/registry.json
//! ```
//!
//! A snapshot directory is written under a temporary name, fsynced, and
//! renamed into place; `LATEST` is then replaced by renaming a temp file over
//! it. A crash at any point leaves the previous `LATEST` intact.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use kitchencast_core::ForecastPoint;
use kitchencast_forecast::ModelDescriptor;

use super::store::{ArtifactSnapshot, ArtifactStore, StoreError, Versioned, Versions};

const LATEST_FILE: &str = "LATEST";
const SNAPSHOTS_DIR: &str = "snapshots";
const FORECASTS_FILE: &str = "forecasts.json";
const REGISTRY_FILE: &str = "registry.json";
const TMP_PREFIX: &str = ".tmp-";

#[derive(Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
    retain: usize,
    versions: RwLock<Versions>,
    publish_lock: Mutex<()>,
}

impl FsArtifactStore {
    pub const MIN_RETAIN: usize = 2;

    /// Open (or initialise) a store rooted at `root`, recovering the latest
    /// snapshot from the `LATEST` pointer.
    pub fn open(root: impl Into<PathBuf>, retain: usize) -> Result<Self, StoreError> {
        let root = root.into();
        let snapshots = root.join(SNAPSHOTS_DIR);
        fs::create_dir_all(&snapshots)
            .map_err(|e| StoreError::io(format!("create {}", snapshots.display()), e))?;
        remove_stale_temp_dirs(&snapshots);

        let mut versions = Versions::default();
        if let Some(version) = read_pointer(&root)? {
            let snapshot = load_snapshot(&snapshot_dir(&root, version), version).map_err(|e| {
                StoreError::Corrupt(format!("LATEST points to version {version}: {e}"))
            })?;
            info!(root = %root.display(), version, "artifact store recovered");
            versions.latest = Some(Arc::new(snapshot));
        } else {
            info!(root = %root.display(), "artifact store initialised empty");
        }

        Ok(Self {
            root,
            retain: retain.max(Self::MIN_RETAIN),
            versions: RwLock::new(versions),
            publish_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write_snapshot_dir(&self, snapshot: &ArtifactSnapshot) -> Result<(), StoreError> {
        let snapshots = self.root.join(SNAPSHOTS_DIR);
        let final_dir = snapshot_dir(&self.root, snapshot.version);
        let tmp_dir = snapshots.join(format!("{TMP_PREFIX}{}", dir_name(snapshot.version)));

        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)
                .map_err(|e| StoreError::io(format!("clear {}", tmp_dir.display()), e))?;
        }
        fs::create_dir_all(&tmp_dir)
            .map_err(|e| StoreError::io(format!("create {}", tmp_dir.display()), e))?;

        write_json(
            &tmp_dir.join(FORECASTS_FILE),
            &Versioned {
                version: snapshot.version,
                generated_at: snapshot.generated_at,
                items: &snapshot.forecasts,
            },
        )?;
        write_json(
            &tmp_dir.join(REGISTRY_FILE),
            &Versioned {
                version: snapshot.version,
                generated_at: snapshot.generated_at,
                items: &snapshot.registry,
            },
        )?;
        sync_dir(&tmp_dir)?;

        // Left over from a publish that crashed before LATEST moved.
        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)
                .map_err(|e| StoreError::io(format!("clear {}", final_dir.display()), e))?;
        }
        fs::rename(&tmp_dir, &final_dir)
            .map_err(|e| StoreError::io(format!("rename {}", tmp_dir.display()), e))?;
        sync_dir(&snapshots)
    }

    fn write_pointer(&self, version: u64) -> Result<(), StoreError> {
        let tmp = self.root.join(format!("{LATEST_FILE}.tmp"));
        write_and_sync(&tmp, format!("{version}\n").as_bytes())?;
        fs::rename(&tmp, self.root.join(LATEST_FILE))
            .map_err(|e| StoreError::io(format!("rename {}", tmp.display()), e))?;
        sync_dir(&self.root)
    }

    /// Delete snapshot directories beyond the retention window. Failures are
    /// logged; the published state is already durable.
    fn prune(&self, latest: u64) {
        let snapshots = self.root.join(SNAPSHOTS_DIR);
        let mut on_disk = match list_versions(&snapshots) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "cannot list snapshots for pruning");
                return;
            }
        };
        on_disk.retain(|v| *v <= latest);
        on_disk.sort_unstable_by(|a, b| b.cmp(a));
        for version in on_disk.into_iter().skip(self.retain) {
            let dir = snapshot_dir(&self.root, version);
            match fs::remove_dir_all(&dir) {
                Ok(()) => debug!(version, "pruned snapshot"),
                Err(e) => warn!(version, error = %e, "failed to prune snapshot"),
            }
        }
    }

    fn retained_on_disk(&self, version: u64) -> Result<Vec<u64>, StoreError> {
        let mut all = list_versions(&self.root.join(SNAPSHOTS_DIR))?;
        all.retain(|v| *v <= version);
        Ok(all)
    }
}

impl ArtifactStore for FsArtifactStore {
    fn publish(&self, snapshot: ArtifactSnapshot) -> Result<Arc<ArtifactSnapshot>, StoreError> {
        let _guard = self.publish_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.versions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .check_newer(snapshot.version)?;

        self.write_snapshot_dir(&snapshot)?;
        self.write_pointer(snapshot.version)?;

        let next = Arc::new(snapshot);
        self.versions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .swap(next.clone(), self.retain);

        info!(
            version = next.version,
            points = next.forecasts.len(),
            categories = next.registry.len(),
            root = %self.root.display(),
            "artifact snapshot published"
        );
        self.prune(next.version);
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
        let latest = {
            let versions = self.versions.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = versions.find(version) {
                return Ok(hit);
            }
            versions.latest.as_ref().map(|s| s.version).ok_or(StoreError::NotFound)?
        };
        if version > latest || !self.retained_on_disk(latest)?.contains(&version) {
            return Err(StoreError::UnknownVersion(version));
        }
        load_snapshot(&snapshot_dir(&self.root, version), version).map(Arc::new)
    }
}

fn dir_name(version: u64) -> String {
    format!("v{version:010}")
}

fn snapshot_dir(root: &Path, version: u64) -> PathBuf {
    root.join(SNAPSHOTS_DIR).join(dir_name(version))
}

fn read_pointer(root: &Path) -> Result<Option<u64>, StoreError> {
    let path = root.join(LATEST_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| StoreError::Corrupt(format!("{} holds '{}'", path.display(), text.trim()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(format!("read {}", path.display()), e)),
    }
}

fn load_snapshot(dir: &Path, version: u64) -> Result<ArtifactSnapshot, StoreError> {
    let forecasts: Versioned<Vec<ForecastPoint>> = read_json(&dir.join(FORECASTS_FILE))?;
    let registry: Versioned<Vec<ModelDescriptor>> = read_json(&dir.join(REGISTRY_FILE))?;
    if forecasts.version != version || registry.version != version {
        return Err(StoreError::Corrupt(format!(
            "{} mixes versions {} and {}",
            dir.display(),
            forecasts.version,
            registry.version
        )));
    }
    Ok(ArtifactSnapshot::new(
        version,
        forecasts.generated_at,
        forecasts.items,
        registry.items,
    ))
}

fn list_versions(snapshots: &Path) -> Result<Vec<u64>, StoreError> {
    let entries = fs::read_dir(snapshots)
        .map_err(|e| StoreError::io(format!("list {}", snapshots.display()), e))?;
    Ok(entries
        .filter_map(Result::ok)
        .filter_map(|e| {
            e.file_name()
                .to_str()
                .and_then(|n| n.strip_prefix('v'))
                .and_then(|n| n.parse::<u64>().ok())
        })
        .collect())
}

fn remove_stale_temp_dirs(snapshots: &Path) {
    let Ok(entries) = fs::read_dir(snapshots) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        let is_tmp = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(TMP_PREFIX));
        if is_tmp {
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => debug!(path = %entry.path().display(), "removed stale temp snapshot"),
                Err(e) => warn!(path = %entry.path().display(), error = %e, "cannot remove temp snapshot"),
            }
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    write_and_sync(path, &bytes)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(format!("read {}", path.display()), e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file =
        File::create(path).map_err(|e| StoreError::io(format!("create {}", path.display()), e))?;
    file.write_all(bytes)
        .map_err(|e| StoreError::io(format!("write {}", path.display()), e))?;
    file.sync_all()
        .map_err(|e| StoreError::io(format!("sync {}", path.display()), e))
}

fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    let f = File::open(dir).map_err(|e| StoreError::io(format!("open {}", dir.display()), e))?;
    f.sync_all()
        .map_err(|e| StoreError::io(format!("sync {}", dir.display()), e))
}
