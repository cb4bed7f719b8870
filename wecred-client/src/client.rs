//! The client facade.
//!
//! [`WeChatClient`] ties the token manager, the request pipeline and the
//! optional ticket managers together; [`WeChatClientBuilder`] assembles it
//! from a [`ClientConfig`] and per-field overrides.

use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use url::Url;
use wecred_core::{
    AccessToken, AppCredentials, AppId, BizTag, Cache, CachingManager, CredentialManager, Fetch,
    Issued, StaticCredential, StoredCredential,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::fetch::{ClientCredentialFetcher, ComponentTokenFetcher};
use crate::pipeline::Pipeline;
use crate::ticket::{JsTicket, JsTicketFetcher};
use crate::transport::{HttpTransport, Transport};
use crate::types::{ApiResponse, CredentialPlacement, PendingRequest};

/// Query parameter used by third-party platform APIs.
const COMPONENT_CREDENTIAL_PARAM: &str = "component_access_token";

/// Client for WeChat-style APIs.
///
/// Requests that need a credential get the cached access token attached;
/// a token the API rejects is renewed and the request retried once.
///
/// Cloning is cheap and clones share the token manager.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use wecred_client::WeChatClient;
/// use wecred_core::{AppCredentials, MemoryCache};
///
/// #[tokio::main]
/// async fn main() -> wecred_client::Result<()> {
///     let client = WeChatClient::builder(AppCredentials::new("wx-app", "app-secret"))
///         .cache(Arc::new(MemoryCache::new()))
///         .build()?;
///
///     let response = client.get("/cgi-bin/get_api_domain_ip", true).await?;
///     println!("{}", response.text());
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct WeChatClient {
    app_id: AppId,
    pipeline: Pipeline,
    tokens: Arc<dyn CredentialManager<AccessToken>>,
    tickets: Option<Arc<dyn CredentialManager<String>>>,
    cache: Option<Arc<dyn Cache>>,
    request_timeout: Duration,
    js_tickets: Arc<OnceLock<Arc<CachingManager<JsTicket>>>>,
}

impl WeChatClient {
    pub fn builder(credentials: AppCredentials) -> WeChatClientBuilder {
        WeChatClientBuilder::new(credentials)
    }

    /// Builder for a third-party platform (component) client.
    ///
    /// Tokens are exchanged for the verify ticket stored in `cache`; feed
    /// pushed tickets in through [`verify_tickets`](Self::verify_tickets).
    pub fn third_party_platform(component: AppCredentials, cache: Arc<dyn Cache>) -> WeChatClientBuilder {
        let tickets = Arc::new(StoredCredential::<String>::verify_ticket(
            component.app_id.clone(),
            Some(cache.clone()),
        ));
        WeChatClientBuilder::new(component)
            .cache(cache)
            .verify_tickets(tickets)
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    /// Send a GET request.
    pub async fn get(&self, path: &str, credential_required: bool) -> Result<ApiResponse> {
        self.do_request(PendingRequest::get(path), credential_required)
            .await
    }

    /// Send a POST request with a JSON body.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        credential_required: bool,
    ) -> Result<ApiResponse> {
        let request = PendingRequest::post_json(path, body)?;
        self.do_request(request, credential_required).await
    }

    /// Send a request through the pipeline.
    ///
    /// Unless the request already has a deadline, it gets one from the
    /// configured timeout. The deadline covers the renewal and the retry.
    pub async fn do_request(
        &self,
        mut request: PendingRequest,
        credential_required: bool,
    ) -> Result<ApiResponse> {
        request.credential_required = credential_required;
        request.credential = None;
        if request.deadline.is_none() {
            request.deadline = Some(Instant::now() + self.request_timeout);
        }

        debug!("{} {} (credential: {})", request.method, request.target, credential_required);
        self.pipeline.execute(request).await
    }

    /// The current access token, fetched on a cache miss.
    pub async fn get_access_token(&self) -> Result<Issued<AccessToken>> {
        Ok(self.tokens.get().await?)
    }

    /// A newly fetched access token, replacing the cached one.
    pub async fn fetch_access_token(&self) -> Result<Issued<AccessToken>> {
        Ok(self.tokens.renew().await?)
    }

    pub fn token_manager(&self) -> Arc<dyn CredentialManager<AccessToken>> {
        self.tokens.clone()
    }

    /// Verify-ticket store of a third-party platform client.
    pub fn verify_tickets(&self) -> Option<Arc<dyn CredentialManager<String>>> {
        self.tickets.clone()
    }

    /// The manager for JS-SDK tickets fetched through this client.
    ///
    /// Created on first use and shared by all clones of this client.
    pub fn js_ticket_manager(&self) -> Arc<CachingManager<JsTicket>> {
        self.js_tickets
            .get_or_init(|| {
                // The fetcher's client gets its own slot so the manager does not own itself.
                let fetch_client = WeChatClient {
                    js_tickets: Arc::default(),
                    ..self.clone()
                };
                Arc::new(CachingManager::new(
                    self.app_id.clone(),
                    BizTag::JsTicket,
                    self.cache.clone(),
                    Arc::new(JsTicketFetcher::new(fetch_client)),
                ))
            })
            .clone()
    }
}

/// Builder for creating a [`WeChatClient`] with custom configuration.
pub struct WeChatClientBuilder {
    credentials: AppCredentials,
    config: ClientConfig,
    cache: Option<Arc<dyn Cache>>,
    transport: Option<Arc<dyn Transport>>,
    placement: Option<CredentialPlacement>,
    request_timeout: Option<Duration>,
    tokens: Option<Arc<dyn CredentialManager<AccessToken>>>,
    tickets: Option<Arc<dyn CredentialManager<String>>>,
}

impl WeChatClientBuilder {
    pub fn new(credentials: AppCredentials) -> Self {
        Self {
            credentials,
            config: ClientConfig::default(),
            cache: None,
            transport: None,
            placement: None,
            request_timeout: None,
            tokens: None,
            tickets: None,
        }
    }

    /// Take URLs, timeout and credential parameter from `config`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Without a cache every call fetches a new token.
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn http_client(self, http: reqwest::Client) -> Self {
        self.transport(Arc::new(HttpTransport::with_client(http)))
    }

    pub fn base_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_api_url = url.into();
        self
    }

    pub fn access_token_url(mut self, url: impl Into<String>) -> Self {
        self.config.access_token_url = url.into();
        self
    }

    pub fn component_token_url(mut self, url: impl Into<String>) -> Self {
        self.config.component_token_url = url.into();
        self
    }

    /// Deadline for each call, taking precedence over the config file.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn credential_placement(mut self, placement: CredentialPlacement) -> Self {
        self.placement = Some(placement);
        self
    }

    /// Use a custom token manager instead of the built-in fetcher.
    pub fn token_manager(mut self, tokens: Arc<dyn CredentialManager<AccessToken>>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Exchange tokens for verify tickets read from `tickets`.
    pub fn verify_tickets(mut self, tickets: Arc<dyn CredentialManager<String>>) -> Self {
        self.tickets = Some(tickets);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<WeChatClient> {
        let base_url = parse_url(&self.config.base_api_url)?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new()));
        let request_timeout = self
            .request_timeout
            .unwrap_or_else(|| self.config.request_timeout());
        let app_id = self.credentials.app_id.clone();

        let tokens = match self.tokens {
            Some(tokens) => tokens,
            None => {
                let identity: Arc<dyn CredentialManager<AppCredentials>> =
                    Arc::new(StaticCredential::new(self.credentials));
                let token_pipeline = Pipeline::base(base_url.clone(), transport.clone());

                let fetcher: Arc<dyn Fetch<AccessToken>> = match &self.tickets {
                    Some(tickets) => {
                        parse_url(&self.config.component_token_url)?;
                        Arc::new(
                            ComponentTokenFetcher::new(
                                identity,
                                tickets.clone(),
                                self.config.component_token_url.as_str(),
                                token_pipeline,
                            )
                            .with_timeout(request_timeout),
                        )
                    }
                    None => {
                        parse_url(&self.config.access_token_url)?;
                        Arc::new(
                            ClientCredentialFetcher::new(
                                identity,
                                self.config.access_token_url.as_str(),
                                token_pipeline,
                            )
                            .with_timeout(request_timeout),
                        )
                    }
                };

                Arc::new(CachingManager::new(
                    app_id.clone(),
                    BizTag::AccessToken,
                    self.cache.clone(),
                    fetcher,
                ))
            }
        };

        let placement = match self.placement {
            Some(placement) => placement,
            None if self.tickets.is_some() => {
                CredentialPlacement::Query(COMPONENT_CREDENTIAL_PARAM.to_string())
            }
            None => CredentialPlacement::Query(self.config.credential_param.clone()),
        };

        let pipeline = Pipeline::standard(base_url, tokens.clone(), placement, transport);

        Ok(WeChatClient {
            app_id,
            pipeline,
            tokens,
            tickets: self.tickets,
            cache: self.cache,
            request_timeout,
            js_tickets: Arc::default(),
        })
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|_| ClientError::InvalidUrl {
        url: raw.to_string(),
    })
}
