//! Decode and frame models without a GPU, printing what the viewer would do.
//!
//! ```text
//! vitrine-inspect <model-file>...   frame local files
//! vitrine-inspect --server [url]    walk every model the server lists
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use vitrine_shared::ModelFormat;
use vitrine_viewer::{
    framing, init_tracing, ApiClient, DirSource, HeadlessSurface, HttpSource, LoadRequest,
    LoaderRegistry, ViewerConfig, ViewerController,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => bail!("usage: vitrine-inspect <model-file>... | --server [url]"),
        Some("--server") => inspect_server(args.get(1).cloned()).await,
        Some(_) => {
            for arg in &args {
                inspect_file(Path::new(arg)).await?;
            }
            Ok(())
        }
    }
}

async fn inspect_file(path: &Path) -> anyhow::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file path: {}", path.display()))?;
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };

    let request = LoadRequest {
        model_id: 0,
        path: format!("/{file_name}"),
        format: ModelFormat::from_file_name(file_name)?,
        name: file_name.to_string(),
    };

    let config = ViewerConfig::default();
    let registry = LoaderRegistry::with_defaults();
    let source = DirSource::new(root);
    let loaded = registry
        .load(&source, &request, &|_| {}, &CancellationToken::new())
        .await
        .with_context(|| format!("loading {}", path.display()))?;

    let fit = framing::fit(
        &loaded.renderable,
        &request.hint_text(),
        config.fov_radians(),
        &framing::FramingTunables::default(),
    );

    let report = json!({
        "file": path.display().to_string(),
        "format": loaded.format,
        "kind": loaded.kind,
        "points": loaded.renderable.positions.len(),
        "bytes": loaded.renderable.byte_len,
        "fit": fit,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn inspect_server(url: Option<String>) -> anyhow::Result<()> {
    let mut config = ViewerConfig::from_env();
    if let Some(url) = url {
        config.server_url = url.trim_end_matches('/').to_string();
    }

    let surface = Arc::new(HeadlessSurface::new());
    let viewer = ViewerController::new(
        config.clone(),
        Arc::new(ApiClient::new(config.server_url.clone())),
        Arc::new(HttpSource::new(config.server_url.clone())),
        surface.clone(),
    );

    let first = viewer.init().await;
    let models = viewer.models();
    if models.is_empty() {
        first?;
        println!("{}", json!({ "server": config.server_url, "models": [] }));
        return Ok(());
    }

    let mut first = Some(first);
    let mut reports = Vec::with_capacity(models.len());
    for (index, model) in models.iter().enumerate() {
        let result = match first.take() {
            Some(result) => result,
            None => viewer.select(index).await.map(Some),
        };
        reports.push(match result {
            Ok(Some(fit)) => json!({ "id": model.id, "name": model.name, "fit": fit }),
            Ok(None) => json!({ "id": model.id, "name": model.name }),
            Err(e) => json!({ "id": model.id, "name": model.name, "error": e.to_string() }),
        });
    }
    viewer.dispose().await;

    let report = json!({
        "server": config.server_url,
        "models": reports,
        "framesPresented": surface.log().frames.len(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
