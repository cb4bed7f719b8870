//! The network boundary beneath the pipeline.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::time::Duration;
use tracing::trace;
use url::Url;

use crate::error::{ClientError, Result};
use crate::types::ApiResponse;

/// A fully resolved request ready to go on the wire.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Time left before the call's deadline, if it has one.
    pub timeout: Option<Duration>,
}

/// Sends one HTTP exchange and buffers the response.
///
/// Implemented by [`HttpTransport`]; tests and embedders may substitute
/// their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse>;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured `reqwest` client (proxies, TLS, pooling).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn http_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Http(err)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse> {
        trace!("{} {}", request.method, request.url.path());

        let mut builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(http_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(http_error)?.to_vec();

        Ok(ApiResponse::new(status, headers, body))
    }
}
