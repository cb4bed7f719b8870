//! # wecred Core
//!
//! Core library for wecred credential management.
//!
//! This crate provides:
//! - Domain types for application identities and credential tags
//! - An expiring key-value [`Cache`] abstraction with an in-memory backend
//! - The [`AccessToken`] credential model and its cache serialization form
//! - [`CredentialManager`] implementations for fetched, stored, and static credentials
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wecred_core::{AccessToken, AppId, BizTag, CachingManager, CredentialManager, MemoryCache};
//!
//! async fn token(fetcher: Arc<dyn wecred_core::Fetch<AccessToken>>) -> Result<String, wecred_core::CredentialError> {
//!     let cache = Arc::new(MemoryCache::new());
//!     let manager = CachingManager::new(AppId::new("wx-app"), BizTag::AccessToken, Some(cache), fetcher);
//!     let issued = manager.get().await?;
//!     Ok(issued.credential().value().to_string())
//! }
//! ```

pub mod cache;
pub mod credential;
pub mod error;
pub mod manager;
pub mod model;

// Re-export commonly used types at crate root
pub use model::{
    AppCredentials,
    AppId,
    BizTag,
    Secret,
};

pub use cache::{
    Cache,
    CacheError,
    MemoryCache,
    cache_key,
};

pub use credential::{
    AccessToken,
    CacheCodec,
    Expiring,
    RawValue,
    DEFAULT_LIFETIME_SECONDS,
    MAX_LIFETIME_SECONDS,
};

pub use error::{
    ApiError,
    CredentialError,
};

pub use manager::{
    CachingManager,
    CredentialManager,
    DEFAULT_VERIFY_TICKET_TTL_SECONDS,
    Fetch,
    FetchFn,
    Issued,
    StaticCredential,
    StoredCredential,
    fetch_fn,
};
