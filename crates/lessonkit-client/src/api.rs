//! Shared HTTP plumbing: authorized requests and status mapping.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::{BackendConfig, EndpointsConfig};
use crate::error::ClientError;
use crate::token::TokenStore;

/// An authenticated client for the lessonkit backend.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    endpoints: EndpointsConfig,
    timeout_secs: u64,
    tokens: Arc<dyn TokenStore>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(
        backend: &BackendConfig,
        endpoints: &EndpointsConfig,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(backend.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: backend.base_url.trim_end_matches('/').to_string(),
            endpoints: endpoints.clone(),
            timeout_secs: backend.timeout_secs,
            tokens,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoints(&self) -> &EndpointsConfig {
        &self.endpoints
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Start a request carrying `Authorization: Bearer <token>`.
    pub async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self
            .tokens
            .token()
            .await
            .with_context(|| format!("failed to load token from {} store", self.tokens.name()))?
            .ok_or(ClientError::MissingToken)?;

        Ok(self
            .client
            .request(method, self.url(path))
            .bearer_auth(token))
    }

    /// Send `request` and map transport failures and error statuses.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.timeout_secs)
            } else {
                ClientError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Unauthorized { status, message });
        }
        if status == 404 {
            let url = response.url().to_string();
            return Err(ClientError::NotFound(url));
        }
        if status >= 400 {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }
        Ok(response)
    }

    /// Send `request` and decode a JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| ClientError::MalformedResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::StaticToken;

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(
            &BackendConfig {
                base_url: base_url.into(),
                ..Default::default()
            },
            &EndpointsConfig::default(),
            Arc::new(StaticToken::new("t")),
        )
        .unwrap()
    }

    #[test]
    fn url_joining() {
        let api = client("https://learn.example.com/");
        assert_eq!(api.base_url(), "https://learn.example.com");
        assert_eq!(api.url("/api/x"), "https://learn.example.com/api/x");
        assert_eq!(api.url("api/x"), "https://learn.example.com/api/x");
        assert_eq!(api.url("https://other.example.com/y"), "https://other.example.com/y");
    }
}
