use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;
use tracing::{debug, warn};

use crate::config::ResolvedConfig;
use crate::domain::ModelId;
use crate::error::HarvestError;

const TEMP_PREFIX: &str = ".modeldb-harvest";

#[derive(Debug, Clone)]
pub struct Store {
    archive_dir: Utf8PathBuf,
    checkpoint_path: Utf8PathBuf,
}

impl Store {
    pub fn new(config: &ResolvedConfig) -> Self {
        Self::new_with_paths(config.archive_dir.clone(), config.checkpoint_path.clone())
    }

    pub fn new_with_paths(archive_dir: Utf8PathBuf, checkpoint_path: Utf8PathBuf) -> Self {
        Self {
            archive_dir,
            checkpoint_path,
        }
    }

    pub fn archive_dir(&self) -> &Utf8Path {
        &self.archive_dir
    }

    pub fn checkpoint_path(&self) -> &Utf8Path {
        &self.checkpoint_path
    }

    pub fn archive_path(&self, id: ModelId) -> Utf8PathBuf {
        self.archive_dir.join(format!("{id}.zip"))
    }

    pub fn ensure_archive_dir(&self) -> Result<(), HarvestError> {
        fs::create_dir_all(self.archive_dir.as_std_path())
            .map_err(|err| HarvestError::Filesystem(format!("create {}: {err}", self.archive_dir)))?;
        remove_stale_temp_files(&self.archive_dir)
    }

    pub fn write_archive(&self, id: ModelId, content: &[u8]) -> Result<Utf8PathBuf, HarvestError> {
        let path = self.archive_path(id);
        write_bytes_atomic(&path, content)?;
        Ok(path)
    }
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), HarvestError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| HarvestError::Filesystem(format!("create {parent}: {err}")))?;
    let mut temp = Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(parent.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|err| HarvestError::Filesystem(format!("write {path}: {err}")))?;
    temp.persist(path.as_std_path())
        .map_err(|err| HarvestError::Filesystem(format!("persist {path}: {}", err.error)))?;
    Ok(())
}

// An interrupted run exits without unwinding, which can strand a temp file.
fn remove_stale_temp_files(dir: &Utf8Path) -> Result<(), HarvestError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| HarvestError::Filesystem(format!("read {dir}: {err}")))?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let file = name.to_string_lossy();
        if !file.starts_with(TEMP_PREFIX) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => debug!(dir = %dir, file = %file, "removed stale temp file"),
            Err(err) => warn!(dir = %dir, file = %file, error = %err, "cannot remove stale temp file"),
        }
    }
    Ok(())
}
