//! Viewer configuration.

use std::time::Duration;

use tracing::warn;

use vitrine_shared::constants::DEFAULT_HTTP_PORT;

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Base URL of the server, without a trailing slash.
    /// Env: `VITRINE_SERVER_URL`
    pub server_url: String,

    /// How long teardown of the previous model may take before the next
    /// load proceeds anyway.
    pub cleanup_timeout: Duration,

    /// How long an error overlay stays visible.
    pub overlay_duration: Duration,

    /// Interval between presented frames while the camera tweens.
    pub frame_interval: Duration,

    /// Length of the camera tween to a new framing.
    pub tween_duration: Duration,

    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server_url: format!("http://127.0.0.1:{DEFAULT_HTTP_PORT}"),
            cleanup_timeout: Duration::from_secs(3),
            overlay_duration: Duration::from_secs(8),
            frame_interval: Duration::from_millis(16),
            tween_duration: Duration::from_millis(1000),
            fov_degrees: 50.0,
        }
    }
}

impl ViewerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("VITRINE_SERVER_URL") {
            let url = url.trim().trim_end_matches('/');
            if url.starts_with("http://") || url.starts_with("https://") {
                config.server_url = url.to_string();
            } else {
                warn!(value = %url, "Ignoring VITRINE_SERVER_URL without http(s) scheme");
            }
        }

        config
    }

    pub fn fov_radians(&self) -> f32 {
        self.fov_degrees.to_radians()
    }
}
