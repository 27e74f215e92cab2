//! Read-only access to the server's collections.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use vitrine_shared::{Background, Model};

use crate::error::LoadError;

/// Anything that can list the models to show.
#[async_trait]
pub trait ModelDirectory: Send + Sync {
    async fn list_models(&self) -> Result<Vec<Model>, LoadError>;
}

/// HTTP client for `/api/models` and `/api/backgrounds`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_backgrounds(&self) -> Result<Vec<Background>, LoadError> {
        self.get_json("/api/backgrounds").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, LoadError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(LoadError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }

        let value = resp
            .json()
            .await
            .map_err(|e| LoadError::parse("json", e))?;
        debug!(url = %url, "Fetched collection");
        Ok(value)
    }
}

#[async_trait]
impl ModelDirectory for ApiClient {
    async fn list_models(&self) -> Result<Vec<Model>, LoadError> {
        self.get_json("/api/models").await
    }
}

/// A fixed model list, for offline use and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory(pub Vec<Model>);

#[async_trait]
impl ModelDirectory for StaticDirectory {
    async fn list_models(&self) -> Result<Vec<Model>, LoadError> {
        Ok(self.0.clone())
    }
}
