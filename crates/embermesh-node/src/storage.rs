//! File-backed region storage (one file per region).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use embermesh_core::{NvStorage, Region, StorageError};

/// Persists each region as a small file under the state directory.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create the state directory if needed.
    pub fn new(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    fn path(&self, region: Region) -> PathBuf {
        let file = match region {
            Region::Identity => "identity.bin",
            Region::Location => "location.bin",
        };
        self.dir.join(file)
    }
}

impl NvStorage for FileStorage {
    fn read(&mut self, region: Region) -> Option<Vec<u8>> {
        match fs::read(self.path(region)) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                tracing::warn!(%err, ?region, "region read failed, treating as absent");
                None
            }
        }
    }

    fn write(&mut self, region: Region, data: &[u8]) -> Result<(), StorageError> {
        fs::write(self.path(region), data).map_err(|err| StorageError::Write(err.to_string()))
    }
}
