//! Cache-or-fetch credential manager.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use super::{CredentialManager, Fetch, Issued};
use crate::cache::{Cache, CacheError, cache_key};
use crate::credential::{CacheCodec, Expiring, RawValue};
use crate::error::CredentialError;
use crate::model::{AppId, BizTag};

/// Manager for credentials issued by an upstream endpoint.
///
/// This implementation:
/// - Serves the credential from the [`Cache`] while it is live
/// - Fetches through its [`Fetch`] implementation on a miss or on [`renew`](CredentialManager::renew)
/// - Writes fetched credentials back with a TTL equal to their remaining lifetime
/// - Rejects [`set`](CredentialManager::set), since issued credentials are not externally supplied
///
/// Fetches are serialized per manager. Callers that were waiting while
/// another renewal completed receive that renewal's credential instead of
/// fetching again. [`renew_rejected`](CredentialManager::renew_rejected)
/// fetches only while the rejected credential is still the current one.
///
/// # Type Parameters
///
/// * `T` - The credential type, e.g. [`AccessToken`](crate::AccessToken)
pub struct CachingManager<T> {
    owner: AppId,
    tag: BizTag,
    cache: Option<Arc<dyn Cache>>,
    fetcher: Arc<dyn Fetch<T>>,
    generation: AtomicU64,
    latest: Mutex<Option<T>>,
}

impl<T> CachingManager<T>
where
    T: CacheCodec + Expiring + RawValue + Clone + Send + Sync + 'static,
{
    /// Create a manager for the credential stored under `(owner, tag)`.
    ///
    /// Without a cache every `get` fetches, and fetched credentials are
    /// returned as [`Issued::degraded`].
    pub fn new(
        owner: AppId,
        tag: BizTag,
        cache: Option<Arc<dyn Cache>>,
        fetcher: Arc<dyn Fetch<T>>,
    ) -> Self {
        Self {
            owner,
            tag,
            cache,
            fetcher,
            generation: AtomicU64::new(0),
            latest: Mutex::new(None),
        }
    }

    pub fn owner(&self) -> &AppId {
        &self.owner
    }

    pub fn tag(&self) -> BizTag {
        self.tag
    }

    fn cache(&self) -> Result<&Arc<dyn Cache>, CredentialError> {
        self.cache.as_ref().ok_or(CredentialError::CacheNotConfigured)
    }

    /// Read and decode the cached credential, treating an expired one as a miss.
    async fn read_cached(&self) -> Result<T, CredentialError> {
        let cache = self.cache()?;
        let bytes = cache.get(self.owner.as_str(), self.tag.as_str()).await?;
        let credential = T::decode(&bytes)?;
        if credential.is_expired() {
            return Err(CacheError::NotFound {
                key: cache_key(self.owner.as_str(), self.tag.as_str()),
            }
            .into());
        }
        Ok(credential)
    }

    async fn persist(&self, credential: &T) -> Result<(), CredentialError> {
        let cache = self.cache()?;
        let bytes = credential.encode()?;
        cache
            .set(
                self.owner.as_str(),
                self.tag.as_str(),
                &bytes,
                credential.remaining_seconds(),
            )
            .await?;
        Ok(())
    }

    /// Renew unless another renewal finished since `observed` was read.
    async fn renew_after(&self, observed: u64) -> Result<Issued<T>, CredentialError> {
        let latest = self.latest.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            if let Some(credential) = latest.as_ref().filter(|c| !c.is_expired()) {
                debug!(
                    "Reusing credential renewed concurrently for {}:{}",
                    self.owner, self.tag
                );
                return Ok(Issued::fresh(credential.clone()));
            }
        }

        self.fetch_locked(latest).await
    }

    /// The live credential that replaced `rejected`, if there is one.
    ///
    /// The cache decides when it holds a readable entry; otherwise the last
    /// credential this manager fetched does.
    async fn successor_of(&self, rejected: &T, latest: &Option<T>) -> Option<T> {
        match self.read_cached().await {
            Ok(cached) => (cached.raw_value() != rejected.raw_value()).then_some(cached),
            Err(_) => latest
                .as_ref()
                .filter(|c| !c.is_expired() && c.raw_value() != rejected.raw_value())
                .cloned(),
        }
    }

    /// Discard the cached value and fetch, holding the fetch lock.
    async fn fetch_locked(
        &self,
        mut latest: MutexGuard<'_, Option<T>>,
    ) -> Result<Issued<T>, CredentialError> {
        if let Err(e) = self.delete().await {
            debug!("Nothing discarded for {}:{} before renewal: {}", self.owner, self.tag, e);
        }

        let credential = match self.fetcher.fetch().await {
            Ok(credential) => credential,
            Err(e) => {
                error!("Failed to fetch credential for {}:{}: {}", self.owner, self.tag, e);
                return Err(e);
            }
        };

        info!(
            "Fetched credential for {}:{} (expires in {}s)",
            self.owner,
            self.tag,
            credential.remaining_seconds()
        );

        *latest = Some(credential.clone());
        self.generation.fetch_add(1, Ordering::AcqRel);

        match self.persist(&credential).await {
            Ok(()) => Ok(Issued::fresh(credential)),
            Err(e) => {
                warn!(
                    "Credential for {}:{} will not be reused across calls: {}",
                    self.owner, self.tag, e
                );
                Ok(Issued::degraded(credential, e))
            }
        }
    }
}

#[async_trait]
impl<T> CredentialManager<T> for CachingManager<T>
where
    T: CacheCodec + Expiring + RawValue + Clone + Send + Sync + 'static,
{
    async fn get(&self) -> Result<Issued<T>, CredentialError> {
        let observed = self.generation.load(Ordering::Acquire);

        match self.read_cached().await {
            Ok(credential) => {
                debug!("Using cached credential for {}:{}", self.owner, self.tag);
                return Ok(Issued::fresh(credential));
            }
            Err(e) => debug!("No usable cached credential for {}:{}: {}", self.owner, self.tag, e),
        }

        self.renew_after(observed).await
    }

    async fn set(&self, _credential: T) -> Result<(), CredentialError> {
        Err(CredentialError::NotSettable)
    }

    async fn renew(&self) -> Result<Issued<T>, CredentialError> {
        let observed = self.generation.load(Ordering::Acquire);
        self.renew_after(observed).await
    }

    async fn renew_rejected(&self, rejected: &T) -> Result<Issued<T>, CredentialError> {
        let latest = self.latest.lock().await;

        if let Some(credential) = self.successor_of(rejected, &latest).await {
            debug!(
                "Credential for {}:{} already replaced, skipping renewal",
                self.owner, self.tag
            );
            return Ok(Issued::fresh(credential));
        }

        self.fetch_locked(latest).await
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
