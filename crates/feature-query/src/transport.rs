//! HTTP transport seam.
//!
//! The engine only needs GET with query parameters and an optional
//! credential. Production code uses [`ReqwestTransport`]; tests substitute a
//! scripted implementation.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

use map_common::{QueryError, QueryResult};
use ogc_protocol::{find_param, QueryParams};

/// Session credential sent with every request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    Basic { username: String, password: String },
    /// Raw `Authorization` header value
    Header { value: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credential::Header { .. } => f.debug_struct("Header").field("value", &"***").finish(),
        }
    }
}

/// Server the session talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Base URL, e.g. "https://maps.example.org/geoserver"
    pub base_url: String,
    #[serde(default)]
    pub credential: Option<Credential>,
}

impl ServiceEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn wms_url(&self) -> String {
        format!("{}/wms", self.base())
    }

    pub fn wfs_url(&self) -> String {
        format!("{}/wfs", self.base())
    }
}

/// An outgoing GET request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub params: QueryParams,
    pub credential: Option<Credential>,
}

impl HttpRequest {
    /// Parameter value by case-insensitive name.
    pub fn param(&self, name: &str) -> Option<&str> {
        find_param(&self.params, name)
    }
}

/// A received response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: Option<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for issuing GET requests against the map server.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &HttpRequest) -> QueryResult<HttpResponse>;
}

/// reqwest-backed transport.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> QueryResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> QueryError {
    if err.is_timeout() {
        QueryError::Timeout
    } else {
        QueryError::Transport(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn get(&self, request: &HttpRequest) -> QueryResult<HttpResponse> {
        let mut builder = self.client.get(&request.url).query(&request.params);
        builder = match &request.credential {
            Some(Credential::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            Some(Credential::Header { value }) => {
                builder.header(reqwest::header::AUTHORIZATION, value)
            }
            None => builder,
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Server answered with an error status");
            return Err(QueryError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        debug!(bytes = body.len(), "Response received");
        Ok(HttpResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}
