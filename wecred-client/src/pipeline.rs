//! Ordered request stages wrapped around a [`Transport`].
//!
//! A [`Pipeline`] holds its stages outermost first. Each [`Stage`] receives
//! the request and a [`Next`] handle that runs the remaining stages and
//! finally the transport. The standard client pipeline is, from the outside in:
//!
//! 1. [`RenewAndRetry`] - renews the credential and retries once on rejection
//! 2. [`RetryClassification`] - marks credential-rejection codes as retryable
//! 3. [`CredentialInjection`] - attaches the current credential
//! 4. [`BaseStage`] - resolves relative targets and validates responses

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, warn};
use url::Url;
use wecred_core::{AccessToken, ApiError, CredentialManager};

use crate::error::{ClientError, Result};
use crate::transport::{OutboundRequest, Transport};
use crate::types::{ApiResponse, CredentialPlacement, PendingRequest};

/// One link in the request chain.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn handle(&self, request: PendingRequest, next: Next<'_>) -> Result<ApiResponse>;
}

/// The stages below the current one, ending at the transport.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    /// Run the rest of the chain. May be called more than once.
    pub async fn run(self, request: PendingRequest) -> Result<ApiResponse> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    transport: self.transport,
                };
                stage.handle(request, next).await
            }
            None => self.transport.send(into_outbound(request)?).await,
        }
    }
}

/// Merge query overrides into the target and compute the remaining budget.
fn into_outbound(request: PendingRequest) -> Result<OutboundRequest> {
    let mut url = Url::parse(&request.target).map_err(|_| ClientError::InvalidUrl {
        url: request.target.clone(),
    })?;

    if !request.query.is_empty() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !request.query.iter().any(|(o, _)| o == k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().chain(request.query.iter()));
    }

    let timeout = match request.deadline {
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClientError::Timeout);
            }
            Some(remaining)
        }
        None => None,
    };

    Ok(OutboundRequest {
        method: request.method,
        url,
        headers: request.headers,
        body: request.body,
        timeout,
    })
}

/// An ordered list of stages over one transport.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    transport: Arc<dyn Transport>,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            stages: Vec::new(),
            transport,
        }
    }

    /// Append a stage inside those already added.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Base stage only, for token endpoints that take no access token.
    pub fn base(base_url: Url, transport: Arc<dyn Transport>) -> Self {
        Self::new(transport).with_stage(BaseStage::new(base_url))
    }

    /// The full credential-aware chain.
    pub fn standard(
        base_url: Url,
        manager: Arc<dyn CredentialManager<AccessToken>>,
        placement: CredentialPlacement,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::new(transport)
            .with_stage(RenewAndRetry::new(manager.clone()))
            .with_stage(RetryClassification)
            .with_stage(CredentialInjection::new(manager, placement))
            .with_stage(BaseStage::new(base_url))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run a request through every stage, bounded by its deadline.
    pub async fn execute(&self, request: PendingRequest) -> Result<ApiResponse> {
        let next = Next {
            stages: &self.stages,
            transport: self.transport.as_ref(),
        };

        match request.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, next.run(request))
                .await
                .map_err(|_| ClientError::Timeout)?,
            None => next.run(request).await,
        }
    }
}

/// Resolves relative targets and turns failed responses into errors.
///
/// Only 2xx statuses succeed. JSON bodies are checked for a non-zero
/// `errcode`, which is returned as [`ClientError::Api`].
pub struct BaseStage {
    base_url: Url,
}

impl BaseStage {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl Stage for BaseStage {
    async fn handle(&self, mut request: PendingRequest, next: Next<'_>) -> Result<ApiResponse> {
        match Url::parse(&request.target) {
            Ok(_) => {}
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let resolved = self.base_url.join(&request.target).map_err(|_| {
                    ClientError::InvalidUrl {
                        url: request.target.clone(),
                    }
                })?;
                request.target = resolved.into();
            }
            Err(_) => {
                return Err(ClientError::InvalidUrl {
                    url: request.target,
                });
            }
        }

        let response = next.run(request).await?;

        if !response.status.is_success() {
            return Err(ClientError::Status {
                status: response.status.as_u16(),
            });
        }

        if response.is_json() {
            let envelope: ApiError =
                serde_json::from_slice(&response.body).map_err(|e| ClientError::Decode {
                    message: e.to_string(),
                })?;
            if !envelope.is_success() {
                debug!("API returned error {}", envelope.code);
                return Err(ClientError::Api(envelope));
            }
        }

        Ok(response)
    }
}

/// Attaches a credential to requests that need one.
pub struct CredentialInjection {
    manager: Arc<dyn CredentialManager<AccessToken>>,
    placement: CredentialPlacement,
}

impl CredentialInjection {
    pub fn new(
        manager: Arc<dyn CredentialManager<AccessToken>>,
        placement: CredentialPlacement,
    ) -> Self {
        Self { manager, placement }
    }

    fn detach(&self, request: &mut PendingRequest) {
        match &self.placement {
            CredentialPlacement::Query(name) => request.remove_query(name),
            CredentialPlacement::Header(name) => {
                request.headers.remove(name);
            }
        }
    }

    fn attach(&self, request: &mut PendingRequest, token: &AccessToken) -> Result<()> {
        match &self.placement {
            CredentialPlacement::Query(name) => request.set_query(name.clone(), token.value()),
            CredentialPlacement::Header(name) => {
                let mut value = HeaderValue::from_str(token.value()).map_err(|_| {
                    ClientError::InvalidHeader {
                        name: name.to_string(),
                    }
                })?;
                value.set_sensitive(true);
                request.headers.insert(name.clone(), value);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for CredentialInjection {
    async fn handle(&self, mut request: PendingRequest, next: Next<'_>) -> Result<ApiResponse> {
        if !request.credential_required {
            return next.run(request).await;
        }

        self.detach(&mut request);

        let token = match request.credential.take() {
            Some(token) => token,
            None => current_credential(self.manager.as_ref()).await?,
        };

        self.attach(&mut request, &token)?;
        request.credential = Some(token);
        next.run(request).await
    }
}

async fn current_credential(manager: &dyn CredentialManager<AccessToken>) -> Result<AccessToken> {
    let (token, persist_error) = manager.get().await?.into_parts();
    if let Some(e) = persist_error {
        warn!("Using credential that could not be cached: {}", e);
    }
    Ok(token)
}

/// Marks credential-rejection codes on credential-bearing requests as retryable.
pub struct RetryClassification;

#[async_trait]
impl Stage for RetryClassification {
    async fn handle(&self, request: PendingRequest, next: Next<'_>) -> Result<ApiResponse> {
        let credential_required = request.credential_required;

        match next.run(request).await {
            Err(ClientError::Api(e)) if credential_required && e.is_credential_rejected() => {
                debug!("Credential rejected with code {}", e.code);
                Err(ClientError::CredentialRejected(e))
            }
            other => other,
        }
    }
}

/// Renews the credential and re-issues the request once after a rejection.
///
/// The first attempt is pinned to the manager's current credential, so the
/// renewal knows which credential was refused and skips the fetch when a
/// concurrent call already replaced it.
pub struct RenewAndRetry {
    manager: Arc<dyn CredentialManager<AccessToken>>,
}

impl RenewAndRetry {
    pub fn new(manager: Arc<dyn CredentialManager<AccessToken>>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Stage for RenewAndRetry {
    async fn handle(&self, mut request: PendingRequest, next: Next<'_>) -> Result<ApiResponse> {
        if !request.credential_required {
            return next.run(request).await;
        }

        let presented = current_credential(self.manager.as_ref()).await?;
        request.credential = Some(presented.clone());

        let primary = match next.run(request.clone()).await {
            Err(ClientError::CredentialRejected(e)) => e,
            other => return other,
        };

        warn!("Credential rejected ({}), renewing and retrying once", primary);

        let token = match self.manager.renew_rejected(&presented).await {
            Ok(issued) => issued.into_inner(),
            Err(e) => {
                error!("Credential renewal failed: {}", e);
                return Err(ClientError::RetryFailed {
                    primary,
                    retry: Box::new(ClientError::Credential(e)),
                });
            }
        };

        request.credential = Some(token);
        next.run(request)
            .await
            .map_err(|e| ClientError::RetryFailed {
                primary,
                retry: Box::new(e.settle()),
            })
    }
}
