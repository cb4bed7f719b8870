//! Domain model types for wecred.
//!
//! This module defines the core types used throughout wecred:
//! - [`AppId`] - Identity (tenant) a credential is scoped to
//! - [`BizTag`] - Kind of credential stored under an identity
//! - [`Secret`] - A redacting wrapper for sensitive strings
//! - [`AppCredentials`] - The app id / app secret pair used for token exchange

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Identifier of an application registered with the upstream platform.
///
/// App ids are case-sensitive and used verbatim as the cache owner.
///
/// # Examples
///
/// ```
/// use wecred_core::AppId;
///
/// let app = AppId::new("wx1234567890");
/// assert_eq!(app.as_str(), "wx1234567890");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppId(String);

impl AppId {
    /// Create a new app id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the app id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AppId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AppId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Kind of credential stored for an application.
///
/// One live credential exists per `(AppId, BizTag)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BizTag {
    /// Short-lived API access token.
    AccessToken,

    /// JS-SDK API ticket, derived from an access token.
    JsTicket,

    /// Push-delivered component verify ticket (third-party platforms).
    VerifyTicket,
}

impl BizTag {
    /// Get the string representation used in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            BizTag::AccessToken => "access-token",
            BizTag::JsTicket => "js-ticket",
            BizTag::VerifyTicket => "verify-ticket",
        }
    }
}

impl fmt::Display for BizTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is zeroed when the secret is dropped.
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Application credentials exchanged for access tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCredentials {
    pub app_id: AppId,
    pub app_secret: Secret,
}

impl AppCredentials {
    pub fn new(app_id: impl Into<AppId>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: Secret::new(app_secret),
        }
    }

    /// Both the id and the secret are present.
    pub fn is_complete(&self) -> bool {
        !self.app_id.is_empty() && !self.app_secret.is_empty()
    }
}
