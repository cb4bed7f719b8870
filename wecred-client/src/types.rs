//! Request and response types shared by the pipeline stages.
//!
//! [`PendingRequest`] is the request-scoped context each stage receives,
//! [`CredentialPlacement`] says where the credential goes on the wire, and
//! [`ApiResponse`] is the buffered reply.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use wecred_core::AccessToken;

use crate::error::{ClientError, Result};

/// A request travelling through the pipeline.
///
/// Carries the request-scoped state the stages share: whether a credential
/// must be attached, the credential chosen for the current attempt, and the
/// deadline of the whole call.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    /// Absolute URL, or a path resolved against the base API URL.
    pub target: String,
    /// Query parameters set on top of those in `target`, replacing same-named ones.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub credential_required: bool,
    /// Credential to attach on this attempt; looked up from the manager when `None`.
    pub credential: Option<AccessToken>,
    pub deadline: Option<Instant>,
}

impl PendingRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            credential_required: false,
            credential: None,
            deadline: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    /// A POST request with a JSON body and content type.
    pub fn post_json<B: Serialize + ?Sized>(target: impl Into<String>, body: &B) -> Result<Self> {
        let payload = serde_json::to_vec(body)?;
        Ok(Self::new(Method::POST, target)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(payload))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_query(key, value);
        self
    }

    /// Set a query parameter, replacing any earlier value for `key`.
    pub fn set_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.query.retain(|(k, _)| *k != key);
        self.query.push((key, value.into()));
    }

    pub fn remove_query(&mut self, key: &str) {
        self.query.retain(|(k, _)| k != key);
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Where the credential goes on an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialPlacement {
    /// As a query parameter, e.g. `access_token=...`.
    Query(String),
    /// As a request header.
    Header(HeaderName),
}

impl Default for CredentialPlacement {
    fn default() -> Self {
        Self::Query("access_token".to_string())
    }
}

/// A buffered API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::Decode {
            message: e.to_string(),
        })
    }

    /// The body as UTF-8 text, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Whether the body is declared as JSON.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.starts_with("application/json"))
    }
}
