use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use pressroom_logging::press_debug;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::ServiceError;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub location: String,
}

/// Keyed blob storage for uploads and intermediate artifacts. Keys use `/`.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<StoredObject, ServiceError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Object store over a local directory. Every write goes to a temp file that
/// is renamed over the target.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, PersistError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(PersistError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    pub fn write_atomic(&self, key: &str, bytes: &[u8]) -> Result<PathBuf, PersistError> {
        let target = self.path_for(key)?;
        let dir = target.parent().unwrap_or(&self.root);
        ensure_output_dir(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        if target.exists() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<StoredObject, ServiceError> {
        let store = self.clone();
        let (owned_key, owned_bytes) = (key.to_string(), bytes.to_vec());
        let path = off_runtime(move || store.write_atomic(&owned_key, &owned_bytes)).await?;
        press_debug!("stored {key} ({} bytes)", bytes.len());
        Ok(StoredObject {
            key: key.to_string(),
            size: bytes.len() as u64,
            location: path.display().to_string(),
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        let path = self.path_for(key)?;
        match off_runtime(move || fs::read(path)).await {
            Ok(bytes) => Ok(bytes),
            Err(ServiceError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                Err(ServiceError::NotFound(key.to_string()))
            }
            Err(err) => Err(err),
        }
    }
}

/// Runs blocking file work on tokio's blocking pool.
pub(crate) async fn off_runtime<T, E>(work: impl FnOnce() -> Result<T, E> + Send + 'static) -> Result<T, ServiceError>
where
    T: Send + 'static,
    E: Into<ServiceError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| ServiceError::Io(io::Error::other(err)))?
        .map_err(Into::into)
}
