//! Drives one viewer: which model is shown, loading it, tearing down the
//! previous one and moving the camera.
//!
//! Loads are generation-numbered. Starting a load cancels the token of the
//! one in flight, and any result that comes back for an older generation is
//! dropped as [`LoadError::Superseded`], so a slow model can never replace
//! the one the user picked after it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vitrine_shared::{Model, RecordId};

use crate::camera::{CameraState, CameraTween};
use crate::client::ModelDirectory;
use crate::config::ViewerConfig;
use crate::error::LoadError;
use crate::framing::{self, Fit, FramingTunables};
use crate::loaders::LoaderRegistry;
use crate::renderable::{LoadRequest, LoadedModel};
use crate::source::AssetSource;
use crate::surface::RenderSurface;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ViewerState {
    Idle,
    #[serde(rename_all = "camelCase")]
    Loading { model_id: RecordId, progress: u8 },
    #[serde(rename_all = "camelCase")]
    Loaded { model_id: RecordId },
    Errored { message: String },
}

struct Overlay {
    message: String,
    shown_at: Instant,
}

struct Inner {
    models: Vec<Model>,
    current: Option<usize>,
    state: ViewerState,
    loaded: Option<(LoadedModel, Fit)>,
    camera: CameraState,
    active: Option<CancellationToken>,
    generation: u64,
    overlay: Option<Overlay>,
}

pub struct ViewerController {
    config: ViewerConfig,
    tunables: FramingTunables,
    registry: LoaderRegistry,
    directory: Arc<dyn ModelDirectory>,
    source: Arc<dyn AssetSource>,
    surface: Arc<dyn RenderSurface>,
    inner: Mutex<Inner>,
}

impl ViewerController {
    pub fn new(
        config: ViewerConfig,
        directory: Arc<dyn ModelDirectory>,
        source: Arc<dyn AssetSource>,
        surface: Arc<dyn RenderSurface>,
    ) -> Self {
        let camera = CameraState::initial(config.fov_radians());
        Self {
            config,
            tunables: FramingTunables::default(),
            registry: LoaderRegistry::with_defaults(),
            directory,
            source,
            surface,
            inner: Mutex::new(Inner {
                models: Vec::new(),
                current: None,
                state: ViewerState::Idle,
                loaded: None,
                camera,
                active: None,
                generation: 0,
                overlay: None,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ViewerState {
        self.inner().state.clone()
    }

    pub fn models(&self) -> Vec<Model> {
        self.inner().models.clone()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.inner().current
    }

    pub fn current_model(&self) -> Option<Model> {
        let inner = self.inner();
        inner.current.and_then(|i| inner.models.get(i).cloned())
    }

    pub fn current_fit(&self) -> Option<Fit> {
        self.inner().loaded.as_ref().map(|(_, fit)| fit.clone())
    }

    pub fn camera(&self) -> CameraState {
        self.inner().camera
    }

    /// The error overlay, if one is showing. Overlays dismiss themselves
    /// once `overlay_duration` has passed.
    pub fn overlay(&self) -> Option<String> {
        let mut inner = self.inner();
        let expired = inner
            .overlay
            .as_ref()
            .is_some_and(|o| o.shown_at.elapsed() >= self.config.overlay_duration);
        if expired {
            inner.overlay = None;
        }
        inner.overlay.as_ref().map(|o| o.message.clone())
    }

    /// Fetch the model list and show the first model. `Ok(None)` when the
    /// list is empty.
    pub async fn init(&self) -> Result<Option<Fit>, LoadError> {
        let models = match self.directory.list_models().await {
            Ok(models) => models,
            Err(e) => {
                self.fail(None, &e);
                return Err(e);
            }
        };
        info!(count = models.len(), "Model list fetched");

        let empty = models.is_empty();
        {
            let mut inner = self.inner();
            inner.models = models;
            inner.current = None;
        }
        if empty {
            return Ok(None);
        }
        self.select(0).await.map(Some)
    }

    /// Show the model at `index` in the list.
    pub async fn select(&self, index: usize) -> Result<Fit, LoadError> {
        let model = self
            .inner()
            .models
            .get(index)
            .cloned()
            .ok_or(LoadError::NotInList(index))?;
        self.load(Some(index), model).await
    }

    pub async fn show_next(&self) -> Result<Option<Fit>, LoadError> {
        let next = {
            let inner = self.inner();
            let len = inner.models.len();
            if len == 0 {
                return Ok(None);
            }
            inner.current.map_or(0, |i| (i + 1) % len)
        };
        self.select(next).await.map(Some)
    }

    pub async fn show_previous(&self) -> Result<Option<Fit>, LoadError> {
        let previous = {
            let inner = self.inner();
            let len = inner.models.len();
            if len == 0 {
                return Ok(None);
            }
            inner.current.map_or(len - 1, |i| (i + len - 1) % len)
        };
        self.select(previous).await.map(Some)
    }

    /// Show `model`, which need not be in the fetched list.
    pub async fn load_model(&self, model: &Model) -> Result<Fit, LoadError> {
        let index = self.inner().models.iter().position(|m| m.id == model.id);
        self.load(index, model.clone()).await
    }

    /// Move the camera back to the framing computed for the shown model.
    /// Returns `false` when no model is shown. Like a load, the move is
    /// cancelled by the next load, reset or dispose.
    pub async fn reset_camera(&self) -> bool {
        let token = CancellationToken::new();
        let target = {
            let mut inner = self.inner();
            let Some((_, fit)) = inner.loaded.as_ref() else {
                return false;
            };
            let target = fit.framing.camera;
            if let Some(active) = inner.active.replace(token.clone()) {
                active.cancel();
            }
            target
        };
        debug!("Resetting camera");
        self.animate_camera(target, &token).await;
        self.release(&token);
        true
    }

    /// Cancel any load, release the shown model and go back to idle.
    pub async fn dispose(&self) {
        let previous = {
            let mut inner = self.inner();
            if let Some(active) = inner.active.take() {
                active.cancel();
            }
            inner.generation += 1;
            inner.state = ViewerState::Idle;
            inner.overlay = None;
            inner.loaded.take()
        };
        if let Some((old, _)) = previous {
            self.teardown(old.model_id).await;
        }
        info!("Viewer disposed");
    }

    async fn load(&self, index: Option<usize>, model: Model) -> Result<Fit, LoadError> {
        let token = CancellationToken::new();
        let (generation, previous) = {
            let mut inner = self.inner();
            if let Some(active) = inner.active.replace(token.clone()) {
                active.cancel();
            }
            inner.generation += 1;
            inner.current = index;
            inner.state = ViewerState::Loading {
                model_id: model.id,
                progress: 0,
            };
            (inner.generation, inner.loaded.take())
        };
        info!(model_id = model.id, name = %model.name, generation, "Loading model");

        if let Some((old, _)) = previous {
            self.teardown(old.model_id).await;
        }

        match self.fetch_and_fit(generation, &model, &token).await {
            Ok((loaded, fit)) => self.show(generation, loaded, fit, &token).await,
            Err(LoadError::Superseded) => {
                debug!(model_id = model.id, generation, "Load superseded");
                Err(LoadError::Superseded)
            }
            Err(e) => {
                self.fail(Some(generation), &e);
                Err(e)
            }
        }
    }

    async fn fetch_and_fit(
        &self,
        generation: u64,
        model: &Model,
        token: &CancellationToken,
    ) -> Result<(LoadedModel, Fit), LoadError> {
        let request = LoadRequest::for_model(model)?;
        let progress = |pct: u8| self.set_progress(generation, pct);

        let loaded = self
            .registry
            .load(self.source.as_ref(), &request, &progress, token)
            .await?;
        let fit = framing::fit(
            &loaded.renderable,
            &request.hint_text(),
            self.config.fov_radians(),
            &self.tunables,
        );
        Ok((loaded, fit))
    }

    async fn show(
        &self,
        generation: u64,
        loaded: LoadedModel,
        fit: Fit,
        token: &CancellationToken,
    ) -> Result<Fit, LoadError> {
        if !self.is_current(generation) {
            return Err(LoadError::Superseded);
        }
        if let Err(e) = self.surface.attach(&loaded, &fit).await {
            self.fail(Some(generation), &e);
            return Err(e);
        }

        let model_id = loaded.model_id;
        let still_current = {
            let mut inner = self.inner();
            if inner.generation == generation {
                inner.loaded = Some((loaded, fit.clone()));
                inner.state = ViewerState::Loaded { model_id };
                inner.overlay = None;
                true
            } else {
                false
            }
        };
        if !still_current {
            // A newer load started while this one was being attached.
            self.teardown(model_id).await;
            return Err(LoadError::Superseded);
        }

        info!(
            model_id,
            inverted = fit.inverted,
            distance = fit.framing.distance,
            "Model shown"
        );
        self.animate_camera(fit.framing.camera, token).await;
        self.release(token);
        Ok(fit)
    }

    /// Drop the active token once its animation has run to the end. A
    /// cancelled token has already been replaced or taken.
    fn release(&self, token: &CancellationToken) {
        let mut inner = self.inner();
        if !token.is_cancelled() {
            inner.active = None;
        }
    }

    async fn teardown(&self, model_id: RecordId) {
        match tokio::time::timeout(self.config.cleanup_timeout, self.surface.detach(model_id)).await
        {
            Ok(()) => debug!(model_id, "Previous model released"),
            Err(_) => warn!(
                model_id,
                timeout_ms = self.config.cleanup_timeout.as_millis() as u64,
                "Cleanup timed out, continuing"
            ),
        }
    }

    async fn animate_camera(&self, to: CameraState, token: &CancellationToken) {
        let from = self.inner().camera;
        let tween = CameraTween::new(from, to, self.config.tween_duration);
        let start = Instant::now();
        let mut ticker =
            tokio::time::interval(self.config.frame_interval.max(Duration::from_millis(1)));

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }
            let elapsed = start.elapsed();
            let camera = tween.sample(elapsed);
            self.surface.present(&camera);
            self.inner().camera = camera;
            if tween.is_finished(elapsed) {
                break;
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner().generation == generation
    }

    fn set_progress(&self, generation: u64, pct: u8) {
        let mut inner = self.inner();
        if inner.generation != generation {
            return;
        }
        if let ViewerState::Loading { progress, .. } = &mut inner.state {
            *progress = pct;
        }
    }

    /// Record a failure unless a newer load has taken over.
    fn fail(&self, generation: Option<u64>, err: &LoadError) {
        let mut inner = self.inner();
        if generation.is_some_and(|g| g != inner.generation) {
            return;
        }
        warn!(error = %err, "Viewer load failed");
        inner.state = ViewerState::Errored {
            message: err.to_string(),
        };
        inner.overlay = Some(Overlay {
            message: err.to_string(),
            shown_at: Instant::now(),
        });
        inner.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::TempDir;

    use crate::client::StaticDirectory;
    use crate::source::{DirSource, Progress};
    use crate::surface::HeadlessSurface;

    fn model(id: RecordId, file: &str) -> Model {
        let format = file.rsplit('.').next().unwrap_or_default().to_string();
        Model {
            id,
            name: format!("model {id}"),
            description: None,
            path: format!("/models/{file}"),
            format,
            thumbnail: format!("/images/{id}.png"),
            order: id,
            background_id: None,
        }
    }

    fn fast_config() -> ViewerConfig {
        ViewerConfig {
            tween_duration: Duration::from_millis(20),
            frame_interval: Duration::from_millis(5),
            cleanup_timeout: Duration::from_millis(100),
            ..ViewerConfig::default()
        }
    }

    struct Fixture {
        dir: TempDir,
        models: Vec<Model>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let models_dir = dir.path().join("models");
        std::fs::create_dir_all(&models_dir).unwrap();
        std::fs::write(models_dir.join("a.obj"), "v 0 0 0\nv 4 2 1\n").unwrap();
        std::fs::write(models_dir.join("b.obj"), "v 0 0 0\nv 40 20 10\n").unwrap();
        std::fs::write(models_dir.join("c.obj"), "v -1 -1 -1\nv 1 1 1\n").unwrap();
        Fixture {
            dir,
            models: vec![model(1, "a.obj"), model(2, "b.obj"), model(3, "c.obj")],
        }
    }

    fn controller(
        fx: &Fixture,
        config: ViewerConfig,
        source: Arc<dyn AssetSource>,
        surface: Arc<HeadlessSurface>,
    ) -> ViewerController {
        ViewerController::new(
            config,
            Arc::new(StaticDirectory(fx.models.clone())),
            source,
            surface,
        )
    }

    /// Delays one asset so a second load can overtake it.
    struct SlowSource {
        inner: DirSource,
        slow_uri: String,
        delay: Duration,
    }

    #[async_trait]
    impl AssetSource for SlowSource {
        async fn fetch(
            &self,
            uri: &str,
            progress: Progress<'_>,
            cancel: &CancellationToken,
        ) -> Result<Bytes, LoadError> {
            if uri == self.slow_uri {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(LoadError::Superseded),
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
            self.inner.fetch(uri, progress, cancel).await
        }
    }

    #[tokio::test]
    async fn test_init_shows_first_model() {
        let fx = fixture();
        let surface = Arc::new(HeadlessSurface::new());
        let viewer = controller(
            &fx,
            fast_config(),
            Arc::new(DirSource::new(fx.dir.path())),
            surface.clone(),
        );

        let fit = viewer.init().await.unwrap().unwrap();
        assert_eq!(viewer.state(), ViewerState::Loaded { model_id: 1 });
        assert_eq!(viewer.current_index(), Some(0));
        assert_eq!(viewer.models().len(), 3);

        let log = surface.log();
        assert_eq!(log.attached, vec![1]);
        assert!(!log.frames.is_empty());
        assert!(viewer
            .camera()
            .position
            .abs_diff_eq(fit.framing.camera.position, 1e-3));
    }

    #[tokio::test]
    async fn test_init_with_empty_list() {
        let viewer = ViewerController::new(
            fast_config(),
            Arc::new(StaticDirectory::default()),
            Arc::new(DirSource::new("/nonexistent")),
            Arc::new(HeadlessSurface::new()),
        );
        assert!(viewer.init().await.unwrap().is_none());
        assert_eq!(viewer.state(), ViewerState::Idle);
        assert!(viewer.show_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_navigation_wraps_and_detaches_previous() {
        let fx = fixture();
        let surface = Arc::new(HeadlessSurface::new());
        let viewer = controller(
            &fx,
            fast_config(),
            Arc::new(DirSource::new(fx.dir.path())),
            surface.clone(),
        );
        viewer.init().await.unwrap();

        viewer.show_previous().await.unwrap();
        assert_eq!(viewer.current_model().unwrap().id, 3);
        viewer.show_next().await.unwrap();
        assert_eq!(viewer.current_model().unwrap().id, 1);
        viewer.show_next().await.unwrap();
        assert_eq!(viewer.current_model().unwrap().id, 2);

        let log = surface.log();
        assert_eq!(log.attached, vec![1, 3, 1, 2]);
        assert_eq!(log.detached, vec![1, 3, 1]);

        assert!(matches!(
            viewer.select(9).await,
            Err(LoadError::NotInList(9))
        ));
    }

    #[tokio::test]
    async fn test_newer_load_supersedes_slow_one() {
        let fx = fixture();
        let surface = Arc::new(HeadlessSurface::new());
        let source = SlowSource {
            inner: DirSource::new(fx.dir.path()),
            slow_uri: "/models/a.obj".into(),
            delay: Duration::from_millis(500),
        };
        let viewer = Arc::new(controller(
            &fx,
            fast_config(),
            Arc::new(source),
            surface.clone(),
        ));

        let slow = {
            let viewer = viewer.clone();
            tokio::spawn(async move { viewer.select(0).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(viewer.state(), ViewerState::Loading { model_id: 1, .. }));

        viewer.select(1).await.unwrap();
        let slow_result = slow.await.unwrap();

        assert!(matches!(slow_result, Err(LoadError::Superseded)));
        assert_eq!(viewer.state(), ViewerState::Loaded { model_id: 2 });
        assert_eq!(surface.log().attached, vec![2]);
    }

    #[tokio::test]
    async fn test_failure_sets_errored_and_overlay_expires() {
        let fx = fixture();
        let config = ViewerConfig {
            overlay_duration: Duration::from_millis(50),
            ..fast_config()
        };
        let viewer = controller(
            &fx,
            config,
            Arc::new(DirSource::new(fx.dir.path())),
            Arc::new(HeadlessSurface::new()),
        );

        let missing = model(8, "missing.glb");
        assert!(matches!(
            viewer.load_model(&missing).await,
            Err(LoadError::Io(_))
        ));
        assert!(matches!(viewer.state(), ViewerState::Errored { .. }));
        assert!(viewer.overlay().is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(viewer.overlay().is_none());

        let collada = model(9, "scene.dae");
        assert!(matches!(
            viewer.load_model(&collada).await,
            Err(LoadError::Unsupported(_))
        ));
        assert!(matches!(viewer.state(), ViewerState::Errored { .. }));
    }

    #[tokio::test]
    async fn test_slow_cleanup_is_bounded() {
        let fx = fixture();
        let surface = Arc::new(HeadlessSurface::with_detach_delay(Duration::from_secs(5)));
        let viewer = controller(
            &fx,
            fast_config(),
            Arc::new(DirSource::new(fx.dir.path())),
            surface.clone(),
        );
        viewer.init().await.unwrap();

        let started = std::time::Instant::now();
        viewer.show_next().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(viewer.state(), ViewerState::Loaded { model_id: 2 });
        assert!(surface.log().detached.is_empty());
    }

    #[tokio::test]
    async fn test_dispose_releases_model() {
        let fx = fixture();
        let surface = Arc::new(HeadlessSurface::new());
        let viewer = controller(
            &fx,
            fast_config(),
            Arc::new(DirSource::new(fx.dir.path())),
            surface.clone(),
        );
        viewer.init().await.unwrap();
        viewer.dispose().await;

        assert_eq!(viewer.state(), ViewerState::Idle);
        assert_eq!(surface.log().detached, vec![1]);
        assert!(viewer.current_fit().is_none());
    }

    fn slow_tween_config() -> ViewerConfig {
        ViewerConfig {
            tween_duration: Duration::from_millis(600),
            frame_interval: Duration::from_millis(5),
            ..fast_config()
        }
    }

    #[tokio::test]
    async fn test_dispose_stops_camera_tween() {
        let fx = fixture();
        let surface = Arc::new(HeadlessSurface::new());
        let viewer = Arc::new(controller(
            &fx,
            slow_tween_config(),
            Arc::new(DirSource::new(fx.dir.path())),
            surface.clone(),
        ));

        let init = {
            let viewer = viewer.clone();
            tokio::spawn(async move { viewer.init().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(viewer.state(), ViewerState::Loaded { model_id: 1 });

        viewer.dispose().await;
        let frames_at_dispose = surface.log().frames.len();
        let camera_at_dispose = viewer.camera();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(init.is_finished());
        assert!(init.await.unwrap().is_ok());
        assert_eq!(surface.log().frames.len(), frames_at_dispose);
        assert_eq!(viewer.camera(), camera_at_dispose);
        assert_eq!(viewer.state(), ViewerState::Idle);
    }

    #[tokio::test]
    async fn test_reset_camera_returns_to_framing() {
        let fx = fixture();
        let surface = Arc::new(HeadlessSurface::new());
        let viewer = controller(
            &fx,
            fast_config(),
            Arc::new(DirSource::new(fx.dir.path())),
            surface.clone(),
        );
        assert!(!viewer.reset_camera().await);

        let fit = viewer.init().await.unwrap().unwrap();
        let frames_before = surface.log().frames.len();

        assert!(viewer.reset_camera().await);
        assert!(surface.log().frames.len() > frames_before);
        assert!(viewer
            .camera()
            .position
            .abs_diff_eq(fit.framing.camera.position, 1e-3));
    }

    #[tokio::test]
    async fn test_dispose_cancels_camera_reset() {
        let fx = fixture();
        let surface = Arc::new(HeadlessSurface::new());
        let viewer = Arc::new(controller(
            &fx,
            slow_tween_config(),
            Arc::new(DirSource::new(fx.dir.path())),
            surface.clone(),
        ));
        viewer.init().await.unwrap();

        let reset = {
            let viewer = viewer.clone();
            tokio::spawn(async move { viewer.reset_camera().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        viewer.dispose().await;
        let frames_at_dispose = surface.log().frames.len();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(reset.is_finished());
        assert!(reset.await.unwrap());
        assert_eq!(surface.log().frames.len(), frames_at_dispose);
    }
}
