//! Transport module - request/response access to the movie service
//!
//! Stores talk to the backend only through the [`Transport`] trait. Bodies travel as
//! `serde_json::Value`; the typed helpers below decode them into domain records.
//!
//! - `http`: reqwest-backed transport that attaches the persisted bearer credential
//! - `mock`: in-process backend seeded with demo data, used for development and tests

pub mod http;
pub mod mock;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use http::HttpTransport;
pub use mock::MockBackend;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        })
    }
}

/// Failure of a single request
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// Connection, timeout or other failure before a response arrived
    #[error("request to {path} failed: {reason}")]
    Network { path: String, reason: String },

    /// Non-2xx response
    #[error("{path} returned status {status}")]
    Status {
        path: String,
        status: u16,
        /// `message` field of the error body, when the server sent one
        message: Option<String>,
    },

    /// Response body did not have the expected shape
    #[error("unexpected response body from {path}: {reason}")]
    Decode { path: String, reason: String },

    /// Request body could not be serialized
    #[error("could not encode request body for {path}: {reason}")]
    Encode { path: String, reason: String },
}

impl TransportError {
    pub fn status(path: impl Into<String>, status: u16, message: Option<&str>) -> Self {
        TransportError::Status {
            path: path.into(),
            status,
            message: message.map(str::to_owned),
        }
    }

    pub fn network(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        TransportError::Network {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Message supplied by the server in an error response
    pub fn server_message(&self) -> Option<&str> {
        match self {
            TransportError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Request/response interface to the backend.
///
/// Implementations attach the bearer credential to every request themselves; callers
/// never pass it per call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, TransportError>;

    async fn post(&self, path: &str, body: Value) -> Result<Value, TransportError>;

    async fn put(&self, path: &str, body: Value) -> Result<Value, TransportError>;
}

fn decode<T: DeserializeOwned>(path: &str, body: Value) -> Result<T, TransportError> {
    serde_json::from_value(body).map_err(|e| TransportError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn encode<B: Serialize>(path: &str, body: &B) -> Result<Value, TransportError> {
    serde_json::to_value(body).map_err(|e| TransportError::Encode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

pub async fn get_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    path: &str,
) -> Result<T, TransportError> {
    let body = transport.get(path).await?;
    decode(path, body)
}

pub async fn post_json<B: Serialize, T: DeserializeOwned>(
    transport: &dyn Transport,
    path: &str,
    body: &B,
) -> Result<T, TransportError> {
    let body = encode(path, body)?;
    let response = transport.post(path, body).await?;
    decode(path, response)
}

pub async fn put_json<B: Serialize, T: DeserializeOwned>(
    transport: &dyn Transport,
    path: &str,
    body: &B,
) -> Result<T, TransportError> {
    let body = encode(path, body)?;
    let response = transport.put(path, body).await?;
    decode(path, response)
}
