//! Persistence boundary for trained models.
//!
//! A [`ModelStore`] only moves opaque blobs under a name. The pipeline never
//! touches it directly: callers load a [`ReductionModel`] once and pass it by
//! reference into population and query.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::ReductionModel;
use crate::storage::{StoreError, StoreResult};

/// Fixed logical name of the live model.
pub const CURRENT_MODEL_KEY: &str = "current_reduction_model";

/// Named blob storage for fitted models.
pub trait ModelStore {
    /// Store `blob` under `name`, replacing any previous blob.
    fn put_blob(&mut self, name: &str, blob: &[u8]) -> StoreResult<()>;

    /// Fetch the blob stored under `name`.
    fn get_blob(&self, name: &str) -> StoreResult<Option<Vec<u8>>>;
}

/// Persist `model` as the current model.
pub fn save_model<S: ModelStore + ?Sized>(store: &mut S, model: &ReductionModel) -> Result<()> {
    let blob = model.to_blob()?;
    store.put_blob(CURRENT_MODEL_KEY, &blob)?;
    info!(
        "Saved reduction model {} ({} bytes)",
        model.generation(),
        blob.len()
    );
    Ok(())
}

/// Load the current model.
pub fn load_model<S: ModelStore + ?Sized>(store: &S) -> Result<ReductionModel> {
    let blob = store
        .get_blob(CURRENT_MODEL_KEY)?
        .ok_or_else(|| Error::ModelNotFound(CURRENT_MODEL_KEY.to_string()))?;
    let model = ReductionModel::from_blob(&blob)?;
    debug!("Loaded reduction model {}", model.generation());
    Ok(model)
}

/// In-memory blob store (for testing).
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for MemoryModelStore {
    fn put_blob(&mut self, name: &str, blob: &[u8]) -> StoreResult<()> {
        self.blobs.insert(name.to_string(), blob.to_vec());
        Ok(())
    }

    fn get_blob(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.blobs.get(name).cloned())
    }
}

/// Blob store keeping one file per name in a directory.
///
/// Writes go to a temporary file that is renamed into place, so readers see
/// either the old blob or the new one.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(io_error)?;
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> StoreResult<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !name.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidData(format!("invalid model name '{}'", name)));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }
}

impl ModelStore for FileModelStore {
    fn put_blob(&mut self, name: &str, blob: &[u8]) -> StoreResult<()> {
        let path = self.path_for(name)?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(io_error)?;
            file.write_all(blob).map_err(io_error)?;
            file.sync_all().map_err(io_error)?;
        }
        fs::rename(&tmp, &path).map_err(io_error)?;
        Ok(())
    }

    fn get_blob(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }
}

fn io_error(e: std::io::Error) -> StoreError {
    match e.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted => {
            StoreError::Unavailable(e.to_string())
        }
        _ => StoreError::Backend(format!("IO: {}", e)),
    }
}
