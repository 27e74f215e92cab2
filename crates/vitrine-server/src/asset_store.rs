use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use tokio::fs;
use tracing::{debug, info, warn};

use vitrine_shared::constants::{IMAGES_DIR, IMAGES_URI_PREFIX, MODELS_DIR, MODELS_URI_PREFIX};
use vitrine_shared::format::extension_of;

use crate::error::ServerError;

/// Which public sub-directory an upload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Model,
    Image,
}

impl AssetKind {
    fn uri_prefix(self) -> &'static str {
        match self {
            AssetKind::Model => MODELS_URI_PREFIX,
            AssetKind::Image => IMAGES_URI_PREFIX,
        }
    }
}

/// Uploaded model and image files under the public directory.
#[derive(Debug, Clone)]
pub struct AssetStore {
    public_dir: PathBuf,
    max_size: usize,
}

impl AssetStore {
    pub async fn new(public_dir: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        for sub in [MODELS_DIR, IMAGES_DIR] {
            let dir = public_dir.join(sub);
            fs::create_dir_all(&dir).await.map_err(|e| {
                ServerError::Asset(format!(
                    "Failed to create asset directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        info!(path = %public_dir.display(), "Asset store initialized");

        Ok(Self {
            public_dir,
            max_size,
        })
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Write an uploaded file and return its server-relative URI.
    ///
    /// The stored name is `{field}-{unix_millis}-{random}.{ext}`, keeping the
    /// extension of `original_name`.
    pub async fn store_upload(
        &self,
        kind: AssetKind,
        field: &str,
        original_name: &str,
        data: &[u8],
    ) -> Result<String, ServerError> {
        if data.len() > self.max_size {
            return Err(ServerError::PayloadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let uri = format!("{}{}", kind.uri_prefix(), unique_file_name(field, original_name));
        let path = self.resolve_uri(&uri)?;

        fs::write(&path, data)
            .await
            .map_err(|e| ServerError::Asset(format!("Failed to write {}: {}", uri, e)))?;

        debug!(uri = %uri, size = data.len(), "Stored upload");
        Ok(uri)
    }

    /// Delete the file behind `uri`. A missing file is not an error;
    /// returns whether something was removed.
    pub async fn delete_uri(&self, uri: &str) -> Result<bool, ServerError> {
        let path = self.resolve_uri(uri)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(uri = %uri, "Deleted asset");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServerError::Asset(format!("Failed to delete {}: {}", uri, e))),
        }
    }

    /// Best-effort deletion used for cleanup paths; failures are logged.
    pub async fn discard(&self, uri: &str) {
        if let Err(e) = self.delete_uri(uri).await {
            warn!(uri = %uri, error = %e, "Could not remove asset");
        }
    }

    pub async fn exists(&self, uri: &str) -> bool {
        match self.resolve_uri(uri) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Map a `/models/..` or `/images/..` URI to a path under the public
    /// directory. Other prefixes and traversal attempts are refused.
    pub fn resolve_uri(&self, uri: &str) -> Result<PathBuf, ServerError> {
        let (sub, rest) = if let Some(rest) = uri.strip_prefix(MODELS_URI_PREFIX) {
            (MODELS_DIR, rest)
        } else if let Some(rest) = uri.strip_prefix(IMAGES_URI_PREFIX) {
            (IMAGES_DIR, rest)
        } else {
            return Err(ServerError::BadRequest(format!("Not an asset URI: {uri}")));
        };

        let base = self.public_dir.join(sub);
        ensure_within(&base, Path::new(rest))
    }
}

/// Join `relative` onto `base`, rejecting anything that would escape it.
fn ensure_within(base: &Path, relative: &Path) -> Result<PathBuf, ServerError> {
    let mut resolved = base.to_path_buf();
    let mut pushed = false;
    for component in relative.components() {
        match component {
            Component::Normal(c) => {
                resolved.push(c);
                pushed = true;
            }
            Component::CurDir => {}
            _ => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
        }
    }
    if !pushed {
        return Err(ServerError::BadRequest("Empty asset path".to_string()));
    }
    Ok(resolved)
}

fn unique_file_name(field: &str, original_name: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let field: String = field
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    match extension_of(original_name).filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        Some(ext) => format!("{field}-{millis}-{suffix}.{ext}"),
        None => format!("{field}-{millis}-{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (AssetStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::new(dir.path().join("public"), 1024 * 1024)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_store_and_delete() {
        let (store, _dir) = test_store().await;
        let uri = store
            .store_upload(AssetKind::Model, "modelFile", "Cube.GLB", b"glTF")
            .await
            .unwrap();
        assert!(uri.starts_with("/models/modelFile-"));
        assert!(uri.ends_with(".GLB"));
        assert!(store.exists(&uri).await);

        assert!(store.delete_uri(&uri).await.unwrap());
        assert!(!store.exists(&uri).await);
        assert!(!store.delete_uri(&uri).await.unwrap());
    }

    #[tokio::test]
    async fn test_images_go_to_images_dir() {
        let (store, _dir) = test_store().await;
        let uri = store
            .store_upload(AssetKind::Image, "thumbnailFile", "thumb.png", b"png")
            .await
            .unwrap();
        let path = store.resolve_uri(&uri).unwrap();
        assert!(path.starts_with(store.public_dir().join("images")));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_empty_accepted_oversized_rejected() {
        let (store, _dir) = test_store().await;
        let uri = store
            .store_upload(AssetKind::Image, "f", "a.png", b"")
            .await
            .unwrap();
        assert!(store.exists(&uri).await);

        let big = vec![0u8; 1024 * 1024 + 1];
        assert!(matches!(
            store.store_upload(AssetKind::Model, "f", "a.ply", &big).await,
            Err(ServerError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_traversal_and_foreign_prefixes() {
        let store = AssetStore {
            public_dir: PathBuf::from("/srv/public"),
            max_size: 10,
        };
        assert!(store.resolve_uri("/models/../../etc/passwd").is_err());
        assert!(store.resolve_uri("/data/models.json").is_err());
        assert!(store.resolve_uri("/images/").is_err());
        assert_eq!(
            store.resolve_uri("/images/thumb1.svg").unwrap(),
            PathBuf::from("/srv/public/images/thumb1.svg")
        );
    }

    #[test]
    fn test_unique_file_name_shape() {
        let name = unique_file_name("modelFile", "scan.final.ply");
        let parts: Vec<&str> = name.split('-').collect();
        assert_eq!(parts[0], "modelFile");
        assert!(parts[1].parse::<i64>().is_ok());
        assert!(parts[2].ends_with(".ply"));
        assert!(!unique_file_name("f", "noext").contains('.'));
    }
}
