//! The seam between the controller and whatever draws the scene.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use vitrine_shared::RecordId;

use crate::camera::CameraState;
use crate::error::LoadError;
use crate::framing::Fit;
use crate::renderable::LoadedModel;

#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Add a decoded model to the scene with its fitted transform.
    async fn attach(&self, model: &LoadedModel, fit: &Fit) -> Result<(), LoadError>;

    /// Remove a model and release its GPU resources. May be slow; the
    /// controller bounds it with a timeout.
    async fn detach(&self, model_id: RecordId);

    /// Draw one frame from `camera`.
    fn present(&self, camera: &CameraState);
}

/// A surface that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    detach_delay: Duration,
    log: Mutex<SurfaceLog>,
}

#[derive(Debug, Clone, Default)]
pub struct SurfaceLog {
    pub attached: Vec<RecordId>,
    pub detached: Vec<RecordId>,
    pub frames: Vec<CameraState>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `detach` take this long, to exercise cleanup timeouts.
    pub fn with_detach_delay(delay: Duration) -> Self {
        Self {
            detach_delay: delay,
            ..Self::default()
        }
    }

    pub fn log(&self) -> SurfaceLog {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl RenderSurface for HeadlessSurface {
    async fn attach(&self, model: &LoadedModel, _fit: &Fit) -> Result<(), LoadError> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .attached
            .push(model.model_id);
        Ok(())
    }

    async fn detach(&self, model_id: RecordId) {
        if !self.detach_delay.is_zero() {
            tokio::time::sleep(self.detach_delay).await;
        }
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .detached
            .push(model_id);
    }

    fn present(&self, camera: &CameraState) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frames
            .push(*camera);
    }
}
