//! reqwest-backed transport for the real movie service

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::Client;
use serde_json::Value;

use super::{Method, Transport, TransportError};
use crate::auth::CredentialStore;
use crate::config::ClientConfig;

/// HTTP client rooted at the configured base URL.
///
/// The persisted credential is read on every request and sent as a bearer token.
pub struct HttpTransport {
    http: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        // Every request and response body is JSON
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn bearer(&self) -> Option<String> {
        match self.credentials.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read credential, sending request without it");
                None
            }
        }
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, TransportError> {
        crate::log_api_request!(method, path);

        let url = format!("{}{}", self.base_url, path);
        let mut request = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Put => self.http.put(&url),
        };
        // Read per request so login/logout take effect immediately
        if let Some(token) = self.bearer() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let result = self.execute(request, path).await;
        crate::log_api_result!(method, path, result);
        result
    }

    async fn execute(&self, request: reqwest::RequestBuilder, path: &str) -> Result<Value, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::network(path, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::network(path, e))?;

        if !status.is_success() {
            // The service reports failures as {"message": "..."}; anything else has no message
            let message = serde_json::from_slice::<Value>(&bytes).ok().and_then(|body| {
                body.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            });
            return Err(TransportError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        // 204 or an empty 200
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<Value, TransportError> {
        self.send(Method::Get, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.send(Method::Post, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.send(Method::Put, path, Some(body)).await
    }
}
