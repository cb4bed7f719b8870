//! Credential value types and their cache serialization.
//!
//! This module provides:
//! - [`AccessToken`] - A fetched short-lived credential with a derived expiry
//! - [`CacheCodec`] - How a credential is written to and read from a [`Cache`](crate::Cache)
//! - [`Expiring`] - How long a credential should live in the cache
//! - [`RawValue`] - The secret a credential presents upstream

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CredentialError;
use crate::model::Secret;

/// Lifetime applied when the issuer reports none.
pub const DEFAULT_LIFETIME_SECONDS: i64 = 7200;

/// Longest lifetime accepted from an issuer or a cache payload (one year).
pub const MAX_LIFETIME_SECONDS: i64 = 366 * 24 * 60 * 60;

/// Encoding of a credential for cache storage.
pub trait CacheCodec: Sized {
    fn encode(&self) -> Result<Vec<u8>, CredentialError>;

    fn decode(bytes: &[u8]) -> Result<Self, CredentialError>;
}

/// A credential with a bounded remaining lifetime.
pub trait Expiring {
    /// Seconds this credential remains usable; never negative.
    fn remaining_seconds(&self) -> i64;

    fn is_expired(&self) -> bool {
        self.remaining_seconds() == 0
    }
}

/// The secret a credential presents upstream.
///
/// Two credentials with the same raw value are the same issue, whatever
/// their expiry bookkeeping says.
pub trait RawValue {
    fn raw_value(&self) -> &str;
}

/// A short-lived credential as issued by a token endpoint.
///
/// Immutable after construction. The absolute expiry is derived from the
/// issue time and the lifetime reported by the issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: Secret,
    lifetime_seconds: i64,
    issued_at: DateTime<Utc>,
}

impl AccessToken {
    /// Create a token issued now.
    ///
    /// A lifetime of zero or less falls back to [`DEFAULT_LIFETIME_SECONDS`];
    /// longer ones are capped at [`MAX_LIFETIME_SECONDS`].
    pub fn new(value: impl Into<String>, lifetime_seconds: i64) -> Self {
        let lifetime_seconds = if lifetime_seconds <= 0 {
            DEFAULT_LIFETIME_SECONDS
        } else {
            lifetime_seconds
        };
        Self::issued(value, lifetime_seconds, Utc::now())
    }

    /// Create a token with an explicit issue time.
    pub fn issued(
        value: impl Into<String>,
        lifetime_seconds: i64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            value: Secret::new(value),
            lifetime_seconds: lifetime_seconds.clamp(0, MAX_LIFETIME_SECONDS),
            issued_at,
        }
    }

    /// The raw token value. Never log the result.
    pub fn value(&self) -> &str {
        self.value.expose()
    }

    /// Lifetime in seconds as issued.
    pub fn lifetime_seconds(&self) -> i64 {
        self.lifetime_seconds
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at
            .checked_add_signed(Duration::seconds(self.lifetime_seconds))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl RawValue for AccessToken {
    fn raw_value(&self) -> &str {
        self.value.expose()
    }
}

impl Expiring for AccessToken {
    fn remaining_seconds(&self) -> i64 {
        let elapsed = (Utc::now() - self.issued_at).num_seconds();
        (self.lifetime_seconds - elapsed).clamp(0, self.lifetime_seconds)
    }
}

/// Cache payload: `{access_token, expires_in, created_at}`.
///
/// `expires_in` is the remaining lifetime at serialization time and
/// `created_at` is reconstructed so that `created_at + expires_in` equals
/// the original expiry.
#[derive(Debug, Serialize, Deserialize)]
struct CachedAccessToken {
    access_token: Secret,
    expires_in: i64,
    created_at: DateTime<Utc>,
}

impl CacheCodec for AccessToken {
    fn encode(&self) -> Result<Vec<u8>, CredentialError> {
        let remaining = self.remaining_seconds();
        let payload = CachedAccessToken {
            access_token: self.value.clone(),
            expires_in: remaining,
            created_at: self
                .expires_at()
                .checked_sub_signed(Duration::seconds(remaining))
                .unwrap_or(self.issued_at),
        };
        serde_json::to_vec(&payload).map_err(|e| CredentialError::Corrupted {
            message: format!("failed to encode access token: {}", e),
        })
    }

    fn decode(bytes: &[u8]) -> Result<Self, CredentialError> {
        let payload: CachedAccessToken =
            serde_json::from_slice(bytes).map_err(|e| CredentialError::Corrupted {
                message: format!("failed to decode access token: {}", e),
            })?;
        if payload.access_token.is_empty() {
            return Err(CredentialError::Corrupted {
                message: "cached access token is empty".to_string(),
            });
        }
        Ok(Self {
            value: payload.access_token,
            lifetime_seconds: payload.expires_in.clamp(0, MAX_LIFETIME_SECONDS),
            issued_at: payload.created_at,
        })
    }
}

impl RawValue for String {
    fn raw_value(&self) -> &str {
        self
    }
}

/// Plain string credentials such as verify tickets are stored verbatim.
impl CacheCodec for String {
    fn encode(&self) -> Result<Vec<u8>, CredentialError> {
        Ok(self.as_bytes().to_vec())
    }

    fn decode(bytes: &[u8]) -> Result<Self, CredentialError> {
        let value = String::from_utf8(bytes.to_vec()).map_err(|e| CredentialError::Corrupted {
            message: format!("cached value is not UTF-8: {}", e),
        })?;
        if value.is_empty() {
            return Err(CredentialError::Corrupted {
                message: "empty value".to_string(),
            });
        }
        Ok(value)
    }
}
