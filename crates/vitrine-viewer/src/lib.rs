pub mod bounds;
pub mod camera;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod framing;
pub mod loaders;
pub mod renderable;
pub mod source;
pub mod surface;

pub use camera::CameraState;
pub use client::{ApiClient, ModelDirectory, StaticDirectory};
pub use config::ViewerConfig;
pub use controller::{ViewerController, ViewerState};
pub use error::LoadError;
pub use framing::{Fit, FramingTunables};
pub use loaders::{LoaderRegistry, ModelLoader};
pub use renderable::{LoadRequest, LoadedModel, Renderable};
pub use source::{AssetSource, DirSource, HttpSource};
pub use surface::{HeadlessSurface, RenderSurface};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the fmt subscriber, honouring `RUST_LOG` when set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vitrine_viewer=debug,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
