//! Token endpoint fetchers used by [`CachingManager`](wecred_core::CachingManager).
//!
//! - [`ClientCredentialFetcher`] - `client_credential` grant with app id and secret
//! - [`ComponentTokenFetcher`] - third-party platform token exchanged for a verify ticket

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use wecred_core::{AccessToken, AppCredentials, CredentialError, CredentialManager, Fetch};

use crate::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::error::ClientError;
use crate::pipeline::Pipeline;
use crate::types::{ApiResponse, PendingRequest};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ComponentTokenResponse {
    #[serde(default)]
    component_access_token: String,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Serialize)]
struct ComponentTokenRequest<'a> {
    component_appid: &'a str,
    component_appsecret: &'a str,
    component_verify_ticket: &'a str,
}

/// Map a pipeline failure onto the credential error taxonomy.
pub(crate) fn credential_error(err: ClientError) -> CredentialError {
    match err {
        ClientError::Api(api) | ClientError::CredentialRejected(api) => {
            CredentialError::Upstream(api)
        }
        ClientError::Credential(e) => e,
        ClientError::Decode { message } => CredentialError::MalformedResponse { message },
        other => CredentialError::Transport {
            message: other.to_string(),
        },
    }
}

fn decode<T: serde::de::DeserializeOwned>(response: &ApiResponse) -> Result<T, CredentialError> {
    response
        .json()
        .map_err(|e| CredentialError::MalformedResponse {
            message: e.to_string(),
        })
}

/// Load the app identity and check that it can be presented upstream.
async fn identity(
    manager: &dyn CredentialManager<AppCredentials>,
) -> Result<AppCredentials, CredentialError> {
    let app = manager.get().await?.into_inner();
    if !app.is_complete() {
        return Err(CredentialError::InvalidAuth {
            app_id: app.app_id.to_string(),
        });
    }
    Ok(app)
}

/// Fetches access tokens with the `client_credential` grant.
///
/// Sends `GET {token_url}?grant_type=client_credential&appid=..&secret=..`
/// and reads `{access_token, expires_in}`.
pub struct ClientCredentialFetcher {
    identity: Arc<dyn CredentialManager<AppCredentials>>,
    token_url: String,
    pipeline: Pipeline,
    timeout: Duration,
}

impl ClientCredentialFetcher {
    /// `pipeline` should not inject credentials; [`Pipeline::base`] is typical.
    pub fn new(
        identity: Arc<dyn CredentialManager<AppCredentials>>,
        token_url: impl Into<String>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            identity,
            token_url: token_url.into(),
            pipeline,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Fetch<AccessToken> for ClientCredentialFetcher {
    async fn fetch(&self) -> Result<AccessToken, CredentialError> {
        let app = identity(self.identity.as_ref()).await?;

        let mut request = PendingRequest::get(self.token_url.as_str())
            .with_query("grant_type", "client_credential")
            .with_query("appid", app.app_id.as_str())
            .with_query("secret", app.app_secret.expose());
        request.deadline = Some(Instant::now() + self.timeout);

        debug!("Requesting access token for {}", app.app_id);
        let response = self
            .pipeline
            .execute(request)
            .await
            .map_err(credential_error)?;

        let body: TokenResponse = decode(&response)?;
        if body.access_token.is_empty() {
            return Err(CredentialError::MalformedResponse {
                message: "response has no access_token".to_string(),
            });
        }

        Ok(AccessToken::new(body.access_token, body.expires_in))
    }
}

/// Fetches third-party platform access tokens.
///
/// Reads the current verify ticket at fetch time and POSTs
/// `{component_appid, component_appsecret, component_verify_ticket}`,
/// reading `{component_access_token, expires_in}`.
pub struct ComponentTokenFetcher {
    identity: Arc<dyn CredentialManager<AppCredentials>>,
    tickets: Arc<dyn CredentialManager<String>>,
    token_url: String,
    pipeline: Pipeline,
    timeout: Duration,
}

impl ComponentTokenFetcher {
    pub fn new(
        identity: Arc<dyn CredentialManager<AppCredentials>>,
        tickets: Arc<dyn CredentialManager<String>>,
        token_url: impl Into<String>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            identity,
            tickets,
            token_url: token_url.into(),
            pipeline,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn ticket(&self) -> Result<String, CredentialError> {
        match self.tickets.get().await {
            Ok(issued) => Ok(issued.into_inner()),
            Err(e) if e.is_cache_miss() || matches!(e, CredentialError::CacheNotConfigured) => {
                Err(CredentialError::MissingTicket)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Fetch<AccessToken> for ComponentTokenFetcher {
    async fn fetch(&self) -> Result<AccessToken, CredentialError> {
        let app = identity(self.identity.as_ref()).await?;
        let ticket = self.ticket().await?;

        let payload = ComponentTokenRequest {
            component_appid: app.app_id.as_str(),
            component_appsecret: app.app_secret.expose(),
            component_verify_ticket: &ticket,
        };
        let mut request = PendingRequest::post_json(self.token_url.as_str(), &payload)
            .map_err(credential_error)?;
        request.deadline = Some(Instant::now() + self.timeout);

        debug!("Requesting component access token for {}", app.app_id);
        let response = self
            .pipeline
            .execute(request)
            .await
            .map_err(credential_error)?;

        let body: ComponentTokenResponse = decode(&response)?;
        if body.component_access_token.is_empty() {
            return Err(CredentialError::MalformedResponse {
                message: "response has no component_access_token".to_string(),
            });
        }

        Ok(AccessToken::new(body.component_access_token, body.expires_in))
    }
}
