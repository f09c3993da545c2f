//! JSON snapshot files for the dependency index and the route table.
//!
//! Snapshots are regenerated wholesale. Writes go to a temporary file in the
//! target directory and are renamed into place, so concurrent writers resolve
//! as last-writer-wins and readers never see a partial document.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("snapshot `{path}` is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write snapshot `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Read a snapshot. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, SnapshotError> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SnapshotError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(|source| SnapshotError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Serialize `value` and atomically replace the file at `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), SnapshotError> {
    let encoded = serde_json::to_vec(value)?;
    let write_error = |source| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    };

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory).map_err(write_error)?;

    let mut file = NamedTempFile::new_in(directory).map_err(write_error)?;
    file.write_all(&encoded).map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;
    file.persist(path).map_err(|err| write_error(err.error))?;
    Ok(())
}
