//! Managers for credentials that are supplied rather than fetched.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{CredentialManager, Issued};
use crate::cache::Cache;
use crate::credential::CacheCodec;
use crate::error::CredentialError;
use crate::model::{AppId, BizTag};

/// Default lifetime of a pushed verify ticket, in seconds.
pub const DEFAULT_VERIFY_TICKET_TTL_SECONDS: i64 = 43200;

/// A credential pushed in from outside and kept in the cache.
///
/// Used for component verify tickets: the platform delivers them to a
/// callback, the application [`set`](CredentialManager::set)s them, and
/// token fetches read them back. They cannot be renewed from here.
pub struct StoredCredential<T = String> {
    owner: AppId,
    tag: BizTag,
    cache: Option<Arc<dyn Cache>>,
    ttl_seconds: i64,
    _credential: std::marker::PhantomData<fn() -> T>,
}

impl<T> StoredCredential<T> {
    /// A non-positive `ttl_seconds` uses [`DEFAULT_VERIFY_TICKET_TTL_SECONDS`].
    pub fn new(owner: AppId, tag: BizTag, cache: Option<Arc<dyn Cache>>, ttl_seconds: i64) -> Self {
        let ttl_seconds = if ttl_seconds <= 0 {
            DEFAULT_VERIFY_TICKET_TTL_SECONDS
        } else {
            ttl_seconds
        };
        Self {
            owner,
            tag,
            cache,
            ttl_seconds,
            _credential: std::marker::PhantomData,
        }
    }

    /// A verify-ticket store for `owner` with the default TTL.
    pub fn verify_ticket(owner: AppId, cache: Option<Arc<dyn Cache>>) -> Self {
        Self::new(owner, BizTag::VerifyTicket, cache, DEFAULT_VERIFY_TICKET_TTL_SECONDS)
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    fn cache(&self) -> Result<&Arc<dyn Cache>, CredentialError> {
        self.cache.as_ref().ok_or(CredentialError::CacheNotConfigured)
    }
}

#[async_trait]
impl<T> CredentialManager<T> for StoredCredential<T>
where
    T: CacheCodec + Send + Sync + 'static,
{
    async fn get(&self) -> Result<Issued<T>, CredentialError> {
        let bytes = self
            .cache()?
            .get(self.owner.as_str(), self.tag.as_str())
            .await?;
        Ok(Issued::fresh(T::decode(&bytes)?))
    }

    async fn set(&self, credential: T) -> Result<(), CredentialError> {
        let bytes = credential.encode()?;
        self.cache()?
            .set(self.owner.as_str(), self.tag.as_str(), &bytes, self.ttl_seconds)
            .await?;
        debug!("Stored {} for {}", self.tag, self.owner);
        Ok(())
    }

    async fn renew(&self) -> Result<Issued<T>, CredentialError> {
        Err(CredentialError::NotRenewable)
    }

    async fn delete(&self) -> Result<(), CredentialError> {
        let cache = self.cache()?;
        let current = cache.get(self.owner.as_str(), self.tag.as_str()).await?;
        cache
            .delete(self.owner.as_str(), self.tag.as_str(), Some(&current))
            .await?;
        Ok(())
    }
}

/// A fixed credential returned unconditionally, such as the app identity itself.
#[derive(Debug, Clone)]
pub struct StaticCredential<T> {
    value: T,
}

impl<T> StaticCredential<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

#[async_trait]
impl<T> CredentialManager<T> for StaticCredential<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self) -> Result<Issued<T>, CredentialError> {
        Ok(Issued::fresh(self.value.clone()))
    }

    async fn set(&self, _credential: T) -> Result<(), CredentialError> {
        Err(CredentialError::NotSettable)
    }

    async fn renew(&self) -> Result<Issued<T>, CredentialError> {
        Err(CredentialError::NotRenewable)
    }

    async fn delete(&self) -> Result<(), CredentialError> {
        Err(CredentialError::NotDeletable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::model::AppCredentials;

    fn ticket_store() -> (StoredCredential<String>, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let store = StoredCredential::verify_ticket(
            AppId::new("component-app"),
            Some(cache.clone() as Arc<dyn Cache>),
        );
        (store, cache)
    }

    #[tokio::test]
    async fn test_stored_set_then_get() {
        let (store, cache) = ticket_store();
        store.set("ticket@@@abc".to_string()).await.unwrap();

        let ticket = store.get().await.unwrap().into_inner();
        assert_eq!(ticket, "ticket@@@abc");
        assert_eq!(
            cache.get("component-app", "verify-ticket").await.unwrap(),
            b"ticket@@@abc"
        );
    }

    #[tokio::test]
    async fn test_stored_get_missing() {
        let (store, _cache) = ticket_store();
        let result = store.get().await;
        assert!(result.unwrap_err().is_cache_miss());
    }

    #[tokio::test]
    async fn test_stored_empty_value_is_corrupted() {
        let (store, cache) = ticket_store();
        cache.set("component-app", "verify-ticket", b"", 60).await.unwrap();
        assert!(matches!(
            store.get().await,
            Err(CredentialError::Corrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_stored_cannot_renew() {
        let (store, _cache) = ticket_store();
        assert!(matches!(
            store.renew().await,
            Err(CredentialError::NotRenewable)
        ));
    }

    #[tokio::test]
    async fn test_stored_delete() {
        let (store, _cache) = ticket_store();
        store.set("ticket".to_string()).await.unwrap();
        store.delete().await.unwrap();
        assert!(store.get().await.unwrap_err().is_cache_miss());
    }

    #[tokio::test]
    async fn test_stored_without_cache() {
        let store: StoredCredential<String> =
            StoredCredential::verify_ticket(AppId::new("component-app"), None);
        assert!(matches!(
            store.set("ticket".to_string()).await,
            Err(CredentialError::CacheNotConfigured)
        ));
        assert!(matches!(
            store.get().await,
            Err(CredentialError::CacheNotConfigured)
        ));
    }

    #[test]
    fn test_stored_default_ttl() {
        let store: StoredCredential<String> =
            StoredCredential::new(AppId::new("a"), BizTag::VerifyTicket, None, 0);
        assert_eq!(store.ttl_seconds(), DEFAULT_VERIFY_TICKET_TTL_SECONDS);
    }

    #[tokio::test]
    async fn test_static_credential_capabilities() {
        let creds = AppCredentials::new("wx-app", "secret");
        let manager = StaticCredential::new(creds.clone());

        assert_eq!(manager.get().await.unwrap().into_inner(), creds);
        assert!(matches!(
            manager.set(creds.clone()).await,
            Err(CredentialError::NotSettable)
        ));
        assert!(matches!(
            manager.renew().await,
            Err(CredentialError::NotRenewable)
        ));
        assert!(matches!(
            manager.delete().await,
            Err(CredentialError::NotDeletable)
        ));
    }
}
