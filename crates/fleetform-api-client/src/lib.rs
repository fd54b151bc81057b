//! HTTP client for the fleet backend.
//!
//! Provides a minimal client with configurable auth (Bearer token or
//! X-API-Key), generic GET and multipart helpers, and the `FormTransport`
//! implementation used by form sessions.

pub mod transport;

use std::time::Duration;

use anyhow::{Context, Result};
use fleetform_core::{EngineConfig, TransportError};
use reqwest::Client;
use serde::de::DeserializeOwned;

pub use transport::multipart_form;

/// Authentication strategy for the API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
    /// No credentials (local development backends)
    None,
}

/// HTTP client for the fleet API with configurable auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(base_url: String, auth: Auth) -> Result<Self> {
        Self::with_timeout(base_url, auth, Duration::from_secs(60))
    }

    pub fn with_timeout(base_url: String, auth: Auth, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Bearer auth when `api_token` is set, no auth otherwise.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let auth = match &config.api_token {
            Some(token) => Auth::Bearer(token.clone()),
            None => Auth::None,
        };
        Self::with_timeout(
            config.api_url.clone(),
            auth,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Create client from environment: FLEETFORM_API_URL (or API_URL), FLEETFORM_API_TOKEN.
    pub fn from_env() -> Result<Self> {
        let config = EngineConfig::from_env().context("Failed to load fleetform configuration")?;
        Self::from_config(&config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
            Auth::XApiKey(key) => request.header("X-API-Key", key.as_str()),
            Auth::None => request,
        }
    }

    /// Check the status and decode the body. Failures carry a `TransportError`
    /// so callers can recover the status code with `downcast`.
    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let text = response
            .text()
            .await
            .context("Failed to read response body")?;
        // A body-less success decodes as an empty object.
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| TransportError::Decode(e.to_string()).into())
    }

    /// GET request. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.get(&url));

        let response = request.send().await.context("Failed to send request")?;
        Self::read_json(response).await
    }

    /// POST multipart form and deserialize response.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.post(&url).multipart(form));

        let response = request.send().await.context("Failed to send request")?;
        Self::read_json(response).await
    }

    /// PUT multipart form and deserialize response.
    pub async fn put_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.put(&url).multipart(form));

        let response = request.send().await.context("Failed to send request")?;
        Self::read_json(response).await
    }
}
