//! Error types shared by credential managers and the transport layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheError;

/// The presented credential is invalid.
pub const ERR_INVALID_CREDENTIAL: i64 = 40001;

/// The presented access token is invalid.
pub const ERR_INVALID_ACCESS_TOKEN: i64 = 40014;

/// The presented access token has expired.
pub const ERR_ACCESS_TOKEN_EXPIRED: i64 = 42001;

/// Codes that warrant exactly one renew-and-retry.
pub const CREDENTIAL_REJECTED_CODES: [i64; 3] = [
    ERR_INVALID_CREDENTIAL,
    ERR_INVALID_ACCESS_TOKEN,
    ERR_ACCESS_TOKEN_EXPIRED,
];

/// The upstream `{errcode, errmsg}` envelope.
///
/// `errcode == 0` means success even when the envelope is present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Error)]
#[error("API error [{code}]: {message}")]
pub struct ApiError {
    #[serde(rename = "errcode", default)]
    pub code: i64,

    #[serde(rename = "errmsg", default)]
    pub message: String,
}

impl ApiError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Whether the code signals an invalid or expired credential.
    pub fn is_credential_rejected(&self) -> bool {
        CREDENTIAL_REJECTED_CODES.contains(&self.code)
    }
}

/// Error type for credential lifecycle operations.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Cache control outcome or backend failure.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// No cache was configured for this manager.
    #[error("cache not configured")]
    CacheNotConfigured,

    /// A cached payload could not be decoded.
    #[error("corrupted cached credential: {message}")]
    Corrupted { message: String },

    /// The token endpoint answered without a usable credential.
    #[error("malformed upstream response: {message}")]
    MalformedResponse { message: String },

    /// The token endpoint returned an error envelope.
    #[error("upstream rejected credential request: {0}")]
    Upstream(ApiError),

    /// The token request could not be completed.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// App id or app secret is missing.
    #[error("invalid app credentials for '{app_id}'")]
    InvalidAuth { app_id: String },

    /// No verify ticket is available for a component token exchange.
    #[error("verify ticket not available")]
    MissingTicket,

    #[error("credential is not settable")]
    NotSettable,

    #[error("credential is not renewable")]
    NotRenewable,

    #[error("credential is not deletable")]
    NotDeletable,
}

impl CredentialError {
    /// Upstream error code carried by this error, if any.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            CredentialError::Upstream(api) => Some(api.code),
            _ => None,
        }
    }

    pub fn is_cache_miss(&self) -> bool {
        matches!(self, CredentialError::Cache(CacheError::NotFound { .. }))
    }
}
