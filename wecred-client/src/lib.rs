//! wecred Client Library
//!
//! An async client for WeChat-style HTTP APIs that keeps its access token
//! cached and renews it when the API rejects it.
//!
//! # Overview
//!
//! Every call goes through an ordered [`Pipeline`] of stages over a
//! [`Transport`]. For requests that need a credential, the pipeline attaches
//! the current access token from a [`CredentialManager`](wecred_core::CredentialManager);
//! if the API answers with one of the credential-rejection codes, the token
//! is renewed and the request re-issued exactly once.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wecred_client::WeChatClient;
//! use wecred_core::{AppCredentials, MemoryCache};
//!
//! #[tokio::main]
//! async fn main() -> wecred_client::Result<()> {
//!     let client = WeChatClient::builder(AppCredentials::new("wx-app", "app-secret"))
//!         .cache(Arc::new(MemoryCache::new()))
//!         .build()?;
//!
//!     let user = client
//!         .get("/cgi-bin/user/info?openid=o6_bmjrPTlm6_2sgVt7hMZOPfL2M", true)
//!         .await?;
//!     let info: serde_json::Value = user.json()?;
//!     println!("{}", info["nickname"]);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Third-Party Platforms
//!
//! Component tokens are exchanged for a verify ticket that the platform
//! pushes to a callback. Store each ticket as it arrives:
//!
//! ```no_run
//! use std::sync::Arc;
//! use wecred_client::WeChatClient;
//! use wecred_core::{AppCredentials, Cache, MemoryCache};
//!
//! # async fn example(pushed_ticket: String) -> wecred_client::Result<()> {
//! let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
//! let client = WeChatClient::third_party_platform(
//!     AppCredentials::new("component-app", "component-secret"),
//!     cache,
//! )
//! .build()?;
//!
//! if let Some(tickets) = client.verify_tickets() {
//!     tickets.set(pushed_ticket).await?;
//! }
//! let token = client.get_access_token().await?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod ticket;
pub mod transport;
pub mod types;

pub use client::{WeChatClient, WeChatClientBuilder};

pub use config::{ClientConfig, ConfigError, load_config, load_config_from};
pub use error::{ClientError, Result};
pub use fetch::{ClientCredentialFetcher, ComponentTokenFetcher};
pub use pipeline::{
    BaseStage, CredentialInjection, Next, Pipeline, RenewAndRetry, RetryClassification, Stage,
};
pub use ticket::{JS_TICKET_PATH, JsTicket, JsTicketFetcher};
pub use transport::{HttpTransport, OutboundRequest, Transport};
pub use types::{ApiResponse, CredentialPlacement, PendingRequest};
