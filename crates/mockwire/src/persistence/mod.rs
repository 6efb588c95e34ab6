//! File-system handler for static mappings, recorded mappings and body files.
//!
//! Static mapping files are JSON documents holding one mapping or an array of
//! mappings. Multiple server instances sharing a directory get last-writer-wins
//! semantics; there is no cross-process locking.

use crate::error::PersistenceError;
use crate::mapping::MappingModel;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-system collaborator used by the server.
pub trait FileSystemHandler: Send + Sync {
    /// Read every `*.json` mapping document in `dir`, sorted by file name.
    /// A missing directory yields no mappings.
    fn read_all(&self, dir: &Path) -> Result<Vec<MappingModel>, PersistenceError>;

    /// Write one mapping document, creating parent directories.
    fn write(&self, path: &Path, mapping: &MappingModel) -> Result<(), PersistenceError>;

    /// Read a response body file.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, PersistenceError>;
}

/// `FileSystemHandler` backed by the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystemHandler;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl FileSystemHandler for LocalFileSystemHandler {
    fn read_all(&self, dir: &Path) -> Result<Vec<MappingModel>, PersistenceError> {
        if !dir.is_dir() {
            debug!("Mappings directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(io_error(dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json")
            })
            .collect();
        files.sort();

        let mut mappings = Vec::new();
        for path in files {
            let content = std::fs::read(&path).map_err(io_error(&path))?;
            let parsed =
                MappingModel::parse_many(&content).map_err(|source| PersistenceError::Json {
                    path: path.clone(),
                    source,
                })?;
            debug!("Loaded {} mapping(s) from {}", parsed.len(), path.display());
            mappings.extend(parsed);
        }
        Ok(mappings)
    }

    fn write(&self, path: &Path, mapping: &MappingModel) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let json = serde_json::to_string_pretty(mapping).map_err(|source| PersistenceError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_error(path))
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, PersistenceError> {
        std::fs::read(path).map_err(io_error(path))
    }
}

/// Path of the snapshot file for a mapping: `<dir>/<guid>.json`.
pub fn mapping_file_path(dir: &Path, guid: &uuid::Uuid) -> PathBuf {
    dir.join(format!("{guid}.json"))
}
