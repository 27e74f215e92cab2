//! # vitrine-server
//!
//! Admin backend for the Vitrine model showcase.
//!
//! This binary provides:
//! - **REST API** (axum) to upload, edit, reorder and delete 3D models and
//!   background images
//! - **Flat-file persistence** of both collections as JSON arrays
//! - **Static serving** of the public viewer, the admin UI under `/admin`,
//!   and uploaded assets with 3D-specific content types
//! - **Sample seeding** so a fresh install shows a few models

mod api;
mod asset_store;
mod backgrounds_api;
mod config;
mod error;
mod models_api;
mod seed;
mod upload;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use vitrine_shared::constants::APP_NAME;
use vitrine_store::{BackgroundCatalog, ModelCatalog};

use crate::api::AppState;
use crate::asset_store::AssetStore;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vitrine_server=debug,vitrine_store=debug")),
        )
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open storage
    // -----------------------------------------------------------------------
    let assets = Arc::new(
        AssetStore::new(config.public_dir.clone(), config.max_upload_size).await?,
    );

    // Checked before opening: opening creates an empty collection.
    let fresh_install = !tokio::fs::try_exists(config.models_path()).await?;

    let models = Arc::new(ModelCatalog::open(config.models_path()).await?);
    let backgrounds = Arc::new(BackgroundCatalog::open(config.backgrounds_path()).await?);

    if fresh_install && config.seed_samples {
        seed::seed_samples(&models, assets.public_dir()).await?;
    }

    let http_addr = config.http_addr;
    let app_state = AppState {
        models,
        backgrounds,
        assets,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
