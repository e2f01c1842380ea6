//! Where the three input datasets live between runs.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::info;

use kitchencast_ingest::{DatasetRole, IngestError, InputBundle, RawDataset};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("dataset io error: {0}")]
    Io(String),
}

/// Source of the input bundle for a run, and sink for uploads.
pub trait DatasetSource: Send + Sync {
    /// Read every dataset that is present. Absent datasets are `None`;
    /// deciding whether that is fatal is the ingestor's job.
    fn load(&self) -> Result<InputBundle, IngestError>;

    /// Replace several datasets wholesale, as one step: a concurrent `load`
    /// sees either none or all of them. Every file must be CSV with every
    /// required column; otherwise nothing is written.
    fn replace_all(&self, files: &[(DatasetRole, Vec<u8>)]) -> Result<(), DatasetError>;

    fn replace(&self, role: DatasetRole, contents: &[u8]) -> Result<(), DatasetError> {
        self.replace_all(&[(role, contents.to_vec())])
    }
}

fn validate_uploads(files: &[(DatasetRole, Vec<u8>)]) -> Result<(), IngestError> {
    for (role, contents) in files {
        RawDataset::from_csv_reader(*role, contents.as_slice())?.validate_schema()?;
    }
    Ok(())
}

fn is_blank(contents: &[u8]) -> bool {
    contents.iter().all(u8::is_ascii_whitespace)
}

/// Datasets as `sales.csv`, `tray_waste.csv` and `plate_waste.csv` in one
/// directory.
///
/// Loads share `files_lock`; a batch replacement holds it exclusively while
/// it stages and renames its files.
#[derive(Debug)]
pub struct DirectoryDatasetSource {
    dir: PathBuf,
    files_lock: RwLock<()>,
}

impl DirectoryDatasetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, DatasetError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| DatasetError::Io(format!("create {}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            files_lock: RwLock::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, role: DatasetRole) -> PathBuf {
        self.dir.join(role.file_name())
    }
}

impl DatasetSource for DirectoryDatasetSource {
    fn load(&self) -> Result<InputBundle, IngestError> {
        let _guard = self.files_lock.read().unwrap_or_else(PoisonError::into_inner);
        let mut bundle = InputBundle::default();
        for role in DatasetRole::ALL {
            let path = self.path_of(role);
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(IngestError::Csv {
                        role,
                        detail: format!("cannot open {}: {e}", path.display()),
                    });
                }
            };
            // A zero-length file counts as absent.
            if file.metadata().map(|m| m.len() == 0).unwrap_or(false) {
                continue;
            }
            bundle.set(RawDataset::from_csv_reader(role, BufReader::new(file))?);
        }
        Ok(bundle)
    }

    fn replace_all(&self, files: &[(DatasetRole, Vec<u8>)]) -> Result<(), DatasetError> {
        validate_uploads(files)?;

        let _guard = self.files_lock.write().unwrap_or_else(PoisonError::into_inner);
        let io = |what: &str, p: &Path, e: std::io::Error| {
            DatasetError::Io(format!("{what} {}: {e}", p.display()))
        };
        let mut staged = Vec::with_capacity(files.len());
        for (role, contents) in files {
            let tmp = self.dir.join(format!(".{}.upload", role.file_name()));
            let mut file = File::create(&tmp).map_err(|e| io("create", &tmp, e))?;
            file.write_all(contents).map_err(|e| io("write", &tmp, e))?;
            file.sync_all().map_err(|e| io("sync", &tmp, e))?;
            staged.push((*role, tmp, contents.len()));
        }

        for (role, tmp, bytes) in staged {
            let target = self.path_of(role);
            fs::rename(&tmp, &target).map_err(|e| io("rename", &tmp, e))?;
            info!(role = %role, bytes, path = %target.display(), "dataset replaced");
        }
        Ok(())
    }
}

/// Datasets held in memory, for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryDatasetSource {
    files: RwLock<BTreeMap<DatasetRole, Vec<u8>>>,
}

impl InMemoryDatasetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store contents without validation, like a file dropped into a
    /// directory by hand.
    pub fn put(&self, role: DatasetRole, contents: impl Into<Vec<u8>>) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(role, contents.into());
    }

    pub fn with(self, role: DatasetRole, contents: impl Into<Vec<u8>>) -> Self {
        self.put(role, contents);
        self
    }
}

impl DatasetSource for InMemoryDatasetSource {
    fn load(&self) -> Result<InputBundle, IngestError> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        let mut bundle = InputBundle::default();
        for (role, contents) in files.iter() {
            if !is_blank(contents) {
                bundle.set(RawDataset::from_csv_reader(*role, contents.as_slice())?);
            }
        }
        Ok(bundle)
    }

    fn replace_all(&self, files: &[(DatasetRole, Vec<u8>)]) -> Result<(), DatasetError> {
        validate_uploads(files)?;
        let mut stored = self.files.write().unwrap_or_else(PoisonError::into_inner);
        for (role, contents) in files {
            stored.insert(*role, contents.clone());
        }
        Ok(())
    }
}
