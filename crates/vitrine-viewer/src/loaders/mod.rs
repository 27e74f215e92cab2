//! Format dispatch: one loader per model format.

pub mod mesh;
pub mod ply;
pub mod splat;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use vitrine_shared::{LoaderKind, ModelFormat};

use crate::error::LoadError;
use crate::renderable::{LoadRequest, LoadedModel, Renderable};
use crate::source::{AssetSource, Progress};

pub use mesh::MeshLoader;
pub use ply::PlySplatLoader;
pub use splat::SplatLoader;

#[async_trait]
pub trait ModelLoader: Send + Sync {
    fn kind(&self) -> LoaderKind;

    /// Formats this loader is registered for by default.
    fn formats(&self) -> &'static [ModelFormat];

    async fn load(&self, request: &LoadRequest, bytes: Bytes) -> Result<Renderable, LoadError>;
}

/// Maps each [`ModelFormat`] to the loader that handles it.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: HashMap<ModelFormat, Arc<dyn ModelLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the mesh, PLY-splat and splat loaders.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MeshLoader));
        registry.register(Arc::new(PlySplatLoader));
        registry.register(Arc::new(SplatLoader));
        registry
    }

    /// Register `loader` for every format it declares, replacing any
    /// previous loader for those formats.
    pub fn register(&mut self, loader: Arc<dyn ModelLoader>) {
        for format in loader.formats() {
            self.loaders.insert(*format, loader.clone());
        }
    }

    /// Parse a stored format string (case-insensitive extension).
    pub fn parse_format(raw: &str) -> Result<ModelFormat, LoadError> {
        Ok(ModelFormat::from_extension(raw)?)
    }

    pub fn loader_for(&self, format: ModelFormat) -> Result<Arc<dyn ModelLoader>, LoadError> {
        self.loaders
            .get(&format)
            .cloned()
            .ok_or_else(|| LoadError::Unsupported(format.to_string()))
    }

    /// Fetch and decode one model. Cancellation at any point yields
    /// [`LoadError::Superseded`].
    pub async fn load(
        &self,
        source: &dyn AssetSource,
        request: &LoadRequest,
        progress: Progress<'_>,
        cancel: &CancellationToken,
    ) -> Result<LoadedModel, LoadError> {
        let loader = self.loader_for(request.format)?;
        debug!(
            model_id = request.model_id,
            format = %request.format,
            kind = ?loader.kind(),
            "Dispatching load"
        );

        let bytes = source.fetch(&request.path, progress, cancel).await?;
        if bytes.is_empty() {
            return Err(LoadError::Empty(request.path.clone()));
        }

        let renderable = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LoadError::Superseded),
            renderable = loader.load(request, bytes) => renderable?,
        };
        if cancel.is_cancelled() {
            return Err(LoadError::Superseded);
        }

        info!(
            model_id = request.model_id,
            format = %request.format,
            points = renderable.positions.len(),
            "Model decoded"
        );

        Ok(LoadedModel {
            kind: renderable.kind,
            model_id: request.model_id,
            format: request.format,
            renderable,
        })
    }
}

/// Run a CPU-bound decoder off the async runtime.
pub(crate) async fn decode_blocking<F>(decode: F) -> Result<Renderable, LoadError>
where
    F: FnOnce() -> Result<Renderable, LoadError> + Send + 'static,
{
    tokio::task::spawn_blocking(decode)
        .await
        .map_err(|e| LoadError::parse("decoder", e))?
}
