//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use vitrine_shared::constants::{
    BACKGROUNDS_FILE, DEFAULT_HTTP_PORT, MAX_UPLOAD_SIZE, MODELS_FILE,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) server.
    /// Env: `BIND_ADDR` (IP) and `PORT`
    /// Default: `0.0.0.0:3000`
    pub http_addr: SocketAddr,

    /// Directory holding `models.json` and `backgrounds.json`.
    /// Env: `DATA_DIR`
    /// Default: `./data`
    pub data_dir: PathBuf,

    /// Directory served as the public site; uploads land in its `models/`
    /// and `images/` sub-directories.
    /// Env: `PUBLIC_DIR`
    /// Default: `./public`
    pub public_dir: PathBuf,

    /// Directory served under `/admin`.
    /// Env: `ADMIN_DIR`
    /// Default: `./admin`
    pub admin_dir: PathBuf,

    /// Maximum request body size in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 512 MiB
    pub max_upload_size: usize,

    /// Write sample models when the model collection does not exist yet.
    /// Env: `SEED_SAMPLES` (true/false)
    /// Default: `true`
    pub seed_samples: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            data_dir: PathBuf::from("./data"),
            public_dir: PathBuf::from("./public"),
            admin_dir: PathBuf::from("./admin"),
            max_upload_size: MAX_UPLOAD_SIZE,
            seed_samples: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ip) = lookup("BIND_ADDR") {
            match ip.parse::<IpAddr>() {
                Ok(parsed) => config.http_addr.set_ip(parsed),
                Err(_) => tracing::warn!(value = %ip, "Invalid BIND_ADDR, using default"),
            }
        }

        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(parsed) => config.http_addr.set_port(parsed),
                Err(_) => tracing::warn!(value = %port, "Invalid PORT, using default"),
            }
        }

        if let Some(path) = lookup("DATA_DIR") {
            config.data_dir = PathBuf::from(path);
        }

        if let Some(path) = lookup("PUBLIC_DIR") {
            config.public_dir = PathBuf::from(path);
        }

        if let Some(path) = lookup("ADMIN_DIR") {
            config.admin_dir = PathBuf::from(path);
        }

        if let Some(val) = lookup("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        if let Some(val) = lookup("SEED_SAMPLES") {
            config.seed_samples = val != "false" && val != "0";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn models_path(&self) -> PathBuf {
        self.data_dir.join(MODELS_FILE)
    }

    pub fn backgrounds_path(&self) -> PathBuf {
        self.data_dir.join(BACKGROUNDS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 3000).into());
        assert_eq!(config.models_path(), PathBuf::from("./data/models.json"));
        assert!(config.seed_samples);
    }

    #[test]
    fn test_port_and_dirs_from_env() {
        let config = config_from(&[
            ("PORT", "8123"),
            ("BIND_ADDR", "127.0.0.1"),
            ("DATA_DIR", "/srv/vitrine/data"),
            ("SEED_SAMPLES", "false"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 8123).into());
        assert_eq!(
            config.backgrounds_path(),
            PathBuf::from("/srv/vitrine/data/backgrounds.json")
        );
        assert!(!config.seed_samples);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[("PORT", "http"), ("MAX_UPLOAD_SIZE", "0")]);
        assert_eq!(config.http_addr.port(), 3000);
        assert_eq!(config.max_upload_size, MAX_UPLOAD_SIZE);
    }
}
