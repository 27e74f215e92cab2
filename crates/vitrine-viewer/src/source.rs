//! Where asset bytes come from.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::LoadError;

/// Receives load progress as a percentage, 0 to 100.
pub type Progress<'a> = &'a (dyn Fn(u8) + Send + Sync);

#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch the asset behind a server-relative URI. Returns
    /// [`LoadError::Superseded`] as soon as `cancel` fires.
    async fn fetch(
        &self,
        uri: &str,
        progress: Progress<'_>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, LoadError>;
}

/// Fetches assets from a running server.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn url_for(&self, uri: &str) -> String {
        format!("{}/{}", self.base_url, uri.trim_start_matches('/'))
    }
}

#[async_trait]
impl AssetSource for HttpSource {
    async fn fetch(
        &self,
        uri: &str,
        progress: Progress<'_>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, LoadError> {
        let url = self.url_for(uri);
        progress(0);

        let mut response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LoadError::Superseded),
            response = self.client.get(&url).send() => response?,
        };

        if !response.status().is_success() {
            return Err(LoadError::Http {
                status: response.status().as_u16(),
                url,
            });
        }

        let total = response.content_length().filter(|len| *len > 0);
        let mut body = BytesMut::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        let mut last_reported = 0u8;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LoadError::Superseded),
                chunk = response.chunk() => chunk?,
            };
            let Some(chunk) = chunk else { break };
            body.extend_from_slice(&chunk);

            if let Some(total) = total {
                let pct = ((body.len() as u64 * 100) / total).min(99) as u8;
                if pct > last_reported {
                    last_reported = pct;
                    progress(pct);
                }
            }
        }

        debug!(url = %url, size = body.len(), "Fetched asset");
        progress(100);
        Ok(body.freeze())
    }
}

/// Reads assets straight from a local public directory, the same layout
/// the server serves from.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a server-relative URI to a file under the root, refusing
    /// anything that would leave it.
    pub fn resolve(&self, uri: &str) -> Result<PathBuf, LoadError> {
        let relative = Path::new(uri.trim_start_matches('/'));
        let mut path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(c) => path.push(c),
                Component::CurDir => {}
                _ => return Err(LoadError::Fetch(format!("Refusing path outside root: {uri}"))),
            }
        }
        Ok(path)
    }
}

#[async_trait]
impl AssetSource for DirSource {
    async fn fetch(
        &self,
        uri: &str,
        progress: Progress<'_>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, LoadError> {
        let path = self.resolve(uri)?;
        progress(0);

        let data = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LoadError::Superseded),
            data = tokio::fs::read(&path) => data?,
        };

        progress(100);
        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[test]
    fn test_http_url_joining() {
        let source = HttpSource::new("http://localhost:3000/");
        assert_eq!(
            source.url_for("/models/a.glb"),
            "http://localhost:3000/models/a.glb"
        );
    }

    #[test]
    fn test_dir_resolve_refuses_traversal() {
        let source = DirSource::new("/srv/public");
        assert_eq!(
            source.resolve("/models/a.glb").unwrap(),
            PathBuf::from("/srv/public/models/a.glb")
        );
        assert!(source.resolve("/models/../../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_dir_fetch_reports_progress() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/a.obj"), b"v 0 0 0").unwrap();

        let seen = Mutex::new(Vec::new());
        let record = |p: u8| seen.lock().unwrap().push(p);
        let source = DirSource::new(dir.path());
        let bytes = source
            .fetch("/models/a.obj", &record, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(&bytes[..], b"v 0 0 0");
        assert_eq!(*seen.lock().unwrap(), vec![0, 100]);
    }

    #[tokio::test]
    async fn test_dir_fetch_cancelled() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.obj"), b"v 0 0 0").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = DirSource::new(dir.path())
            .fetch("/a.obj", &|_| {}, &cancel)
            .await;
        assert!(matches!(result, Err(LoadError::Superseded)));
    }

    #[tokio::test]
    async fn test_dir_fetch_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = DirSource::new(dir.path())
            .fetch("/models/none.glb", &|_| {}, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(LoadError::Io(_))));
    }
}
