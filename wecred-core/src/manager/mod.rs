//! Credential lifecycle management.
//!
//! This module provides:
//! - [`CredentialManager`] - Trait for get / set / renew / delete of one credential
//! - [`CachingManager`] - Cache-or-fetch manager for issued credentials
//! - [`StoredCredential`] - Externally supplied credential kept in the cache
//! - [`StaticCredential`] - Fixed pass-through value
//! - [`Fetch`] - The upstream fetch seam used by [`CachingManager`]
//!
//! Each variant decides which operations it supports; unsupported ones
//! return `NotSettable`, `NotRenewable` or `NotDeletable`.

use async_trait::async_trait;
use std::future::Future;

use crate::error::CredentialError;

mod caching;
mod stored;

pub use caching::CachingManager;
pub use stored::{DEFAULT_VERIFY_TICKET_TTL_SECONDS, StaticCredential, StoredCredential};

/// A credential handed out by a manager.
///
/// `persist_error` is set when the credential is usable for the current call
/// but could not be written to the cache (for example, no cache configured).
#[derive(Debug)]
pub struct Issued<T> {
    credential: T,
    persist_error: Option<CredentialError>,
}

impl<T> Issued<T> {
    /// A credential that was read from, or durably written to, the cache.
    pub fn fresh(credential: T) -> Self {
        Self {
            credential,
            persist_error: None,
        }
    }

    /// A usable credential whose cache write failed.
    pub fn degraded(credential: T, error: CredentialError) -> Self {
        Self {
            credential,
            persist_error: Some(error),
        }
    }

    pub fn credential(&self) -> &T {
        &self.credential
    }

    pub fn persist_error(&self) -> Option<&CredentialError> {
        self.persist_error.as_ref()
    }

    pub fn into_inner(self) -> T {
        self.credential
    }

    pub fn into_parts(self) -> (T, Option<CredentialError>) {
        (self.credential, self.persist_error)
    }
}

/// Trait for managing the lifecycle of one credential under one `(owner, tag)`.
///
/// # Example
///
/// ```rust,ignore
/// use wecred_core::{CredentialManager, AccessToken};
///
/// async fn current(manager: &dyn CredentialManager<AccessToken>) -> Result<String, wecred_core::CredentialError> {
///     let issued = manager.get().await?;
///     Ok(issued.credential().value().to_string())
/// }
/// ```
#[async_trait]
pub trait CredentialManager<T: Send + Sync + 'static>: Send + Sync {
    /// Return the current credential, obtaining one if none is cached.
    async fn get(&self) -> Result<Issued<T>, CredentialError>;

    /// Replace the current credential with an externally supplied one.
    async fn set(&self, credential: T) -> Result<(), CredentialError>;

    /// Discard the current credential and obtain a new one.
    async fn renew(&self) -> Result<Issued<T>, CredentialError>;

    /// Renew after upstream refused `rejected`.
    ///
    /// Managers that know a newer credential than `rejected` may return it
    /// instead of fetching. The default always renews.
    async fn renew_rejected(&self, rejected: &T) -> Result<Issued<T>, CredentialError> {
        let _ = rejected;
        self.renew().await
    }

    /// Remove the current credential.
    async fn delete(&self) -> Result<(), CredentialError>;
}

/// Obtains a new credential from upstream.
#[async_trait]
pub trait Fetch<T>: Send + Sync {
    async fn fetch(&self) -> Result<T, CredentialError>;
}

/// [`Fetch`] adapter for async closures.
pub struct FetchFn<F>(F);

/// Wrap an async closure as a [`Fetch`] implementation.
///
/// ```rust,ignore
/// let fetcher = fetch_fn(|| async { Ok(AccessToken::new("token", 7200)) });
/// ```
pub fn fetch_fn<F>(f: F) -> FetchFn<F> {
    FetchFn(f)
}

#[async_trait]
impl<T, F, Fut> Fetch<T> for FetchFn<F>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, CredentialError>> + Send + 'static,
{
    async fn fetch(&self) -> Result<T, CredentialError> {
        (self.0)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_parts() {
        let issued = Issued::degraded(7u32, CredentialError::CacheNotConfigured);
        assert_eq!(*issued.credential(), 7);
        assert!(matches!(
            issued.persist_error(),
            Some(CredentialError::CacheNotConfigured)
        ));

        let (value, err) = Issued::fresh(3u32).into_parts();
        assert_eq!(value, 3);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_renew_rejected_defaults_to_renew() {
        let manager = StaticCredential::new("fixed".to_string());
        let result = manager.renew_rejected(&"fixed".to_string()).await;
        assert!(matches!(result, Err(CredentialError::NotRenewable)));
    }

    #[tokio::test]
    async fn test_fetch_fn_adapter() {
        let fetcher = fetch_fn(|| async { Ok::<_, CredentialError>("ticket".to_string()) });
        assert_eq!(fetcher.fetch().await.unwrap(), "ticket");
    }
}
