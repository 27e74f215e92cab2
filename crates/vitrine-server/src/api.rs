use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use vitrine_shared::format::{content_type_for_extension, extension_of};
use vitrine_shared::RecordId;
use vitrine_store::{BackgroundCatalog, ModelCatalog};

use crate::asset_store::AssetStore;
use crate::backgrounds_api;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::models_api;

#[derive(Clone)]
pub struct AppState {
    pub models: Arc<ModelCatalog>,
    pub backgrounds: Arc<BackgroundCatalog>,
    pub assets: Arc<AssetStore>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/models",
            get(models_api::list_models).post(models_api::create_model),
        )
        .route("/api/models/reorder", post(models_api::reorder_models))
        .route("/api/models/batch-delete", post(models_api::batch_delete_models))
        .route(
            "/api/models/:id",
            put(models_api::update_model).delete(models_api::delete_model),
        )
        .route(
            "/api/backgrounds",
            get(backgrounds_api::list_backgrounds).post(backgrounds_api::create_background),
        )
        .route(
            "/api/backgrounds/reorder",
            post(backgrounds_api::reorder_backgrounds),
        )
        .route(
            "/api/backgrounds/:id",
            put(backgrounds_api::update_background).delete(backgrounds_api::delete_background),
        )
        .route(
            "/public/index.html",
            get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/index.html")]) }),
        )
        .layer(DefaultBodyLimit::max(state.config.max_upload_size))
        .with_state(state.clone());

    api.nest_service("/admin", ServeDir::new(&state.config.admin_dir))
        .fallback_service(ServeDir::new(state.assets.public_dir()))
        .layer(middleware::from_fn(asset_content_type))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Override `Content-Type` for 3D asset extensions that static file
/// serving would otherwise label generically.
async fn asset_content_type(req: Request, next: Next) -> Response {
    let content_type = extension_of(req.uri().path()).and_then(content_type_for_extension);

    let mut response = next.run(req).await;
    if let Some(content_type) = content_type {
        if response.status().is_success() {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }
    response
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub(crate) struct MessageResponse {
    pub message: String,
}

/// Accept ids and positions sent either as JSON numbers or numeric strings.
pub(crate) fn json_integer(body: &Value, field: &str) -> Result<RecordId, ServerError> {
    let value = body
        .get(field)
        .ok_or_else(|| ServerError::BadRequest(format!("Missing field '{field}'")))?;

    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ServerError::BadRequest(format!("Field '{field}' must be an integer")))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;

    pub(crate) const BOUNDARY: &str = "vitrine-test-boundary";

    pub(crate) struct TestServer {
        pub state: AppState,
        pub router: Router,
        _dir: TempDir,
    }

    pub(crate) async fn test_server() -> TestServer {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            data_dir: dir.path().join("data"),
            public_dir: dir.path().join("public"),
            admin_dir: dir.path().join("admin"),
            seed_samples: false,
            ..ServerConfig::default()
        };
        std::fs::create_dir_all(&config.admin_dir).unwrap();
        std::fs::write(config.admin_dir.join("index.html"), "<h1>admin</h1>").unwrap();

        let assets = AssetStore::new(config.public_dir.clone(), config.max_upload_size)
            .await
            .unwrap();
        let state = AppState {
            models: Arc::new(ModelCatalog::open(config.models_path()).await.unwrap()),
            backgrounds: Arc::new(
                BackgroundCatalog::open(config.backgrounds_path()).await.unwrap(),
            ),
            assets: Arc::new(assets),
            config: Arc::new(config),
        };
        TestServer {
            router: build_router(state.clone()),
            state,
            _dir: dir,
        }
    }

    /// One multipart part: (field, Some(file name) for files, content).
    pub(crate) type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

    pub(crate) fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    impl TestServer {
        pub(crate) async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }

        pub(crate) async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::get(uri).body(Body::empty()).unwrap()).await
        }

        pub(crate) async fn multipart(
            &self,
            method: Method,
            uri: &str,
            parts: &[Part<'_>],
        ) -> (StatusCode, Value) {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(parts)))
                .unwrap();
            self.send(request).await
        }

        pub(crate) async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            let request = Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            self.send(request).await
        }

        pub(crate) async fn delete(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::delete(uri).body(Body::empty()).unwrap())
                .await
        }

        pub(crate) async fn upload_model(&self, name: &str, file_name: &str) -> Value {
            let (status, body) = self
                .multipart(
                    Method::POST,
                    "/api/models",
                    &[
                        ("name", None, name.as_bytes()),
                        ("description", None, b"uploaded in a test"),
                        ("modelFile", Some(file_name), b"model-bytes"),
                        ("thumbnailFile", Some("thumb.png"), b"png-bytes"),
                    ],
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            body
        }
    }

    #[tokio::test]
    async fn test_health() {
        let server = test_server().await;
        let (status, body) = server.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_static_assets_get_model_content_types() {
        let server = test_server().await;
        let model = server.upload_model("Cube", "cube.gltf").await;
        let path = model["path"].as_str().unwrap();

        let response = server
            .router
            .clone()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "model/gltf+json"
        );
    }

    #[tokio::test]
    async fn test_admin_mount_and_redirect() {
        let server = test_server().await;
        let response = server
            .router
            .clone()
            .oneshot(Request::get("/admin/index.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = server
            .router
            .clone()
            .oneshot(Request::get("/public/index.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/index.html");
    }

    #[test]
    fn test_json_integer_accepts_numbers_and_strings() {
        let body = serde_json::json!({ "a": 3, "b": "4", "c": "x", "d": 1.5 });
        assert_eq!(json_integer(&body, "a").unwrap(), 3);
        assert_eq!(json_integer(&body, "b").unwrap(), 4);
        assert!(json_integer(&body, "c").is_err());
        assert!(json_integer(&body, "d").is_err());
        assert!(json_integer(&body, "missing").is_err());
    }
}
