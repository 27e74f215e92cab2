//! Whole-file JSON collection storage.
//!
//! The file is the entire state of the collection. Readers parse it fresh on
//! every call; writers go through [`JsonStore::mutate`], which holds the
//! collection lock across read, modify and write.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::ordering::Record;

/// A JSON array of `T` persisted at a single path.
#[derive(Debug)]
pub struct JsonStore<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> JsonStore<T> {
    /// Open (or create) the collection file at `path`.
    ///
    /// Missing parent directories are created and a missing file is
    /// initialised to an empty array. An existing file is left untouched.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        if !fs::try_exists(&path).await? {
            write_atomic(&path, b"[]").await?;
            info!(path = %path.display(), "Created empty collection");
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full collection.
    pub async fn get(&self) -> Result<Vec<T>> {
        let raw = fs::read(&self.path).await?;
        let records = serde_json::from_slice(&raw)?;
        Ok(records)
    }

    /// Apply `f` to the collection and persist the result.
    ///
    /// Mutations are serialized. If `f` returns an error nothing is written
    /// and the error is handed back unchanged.
    pub async fn mutate<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<T>) -> Result<R>,
    {
        let _guard = self.write_lock.lock().await;

        let mut records = self.get().await?;
        let out = f(&mut records)?;

        let json = serde_json::to_vec_pretty(&records)?;
        write_atomic(&self.path, &json).await?;

        debug!(path = %self.path.display(), count = records.len(), "Collection saved");
        Ok(out)
    }
}

/// Write `data` next to `path` and rename it into place.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, data).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
