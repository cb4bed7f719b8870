//! JS-SDK API tickets.
//!
//! A JS ticket is a second credential derived from the access token: it is
//! fetched through an authenticated call and cached under
//! [`BizTag::JsTicket`](wecred_core::BizTag::JsTicket) next to the token.

use async_trait::async_trait;
use serde::Deserialize;
use wecred_core::{AccessToken, CacheCodec, CredentialError, Expiring, Fetch, RawValue};

use crate::client::WeChatClient;
use crate::fetch::credential_error;

/// Endpoint for the `jsapi` ticket, relative to the base API URL.
pub const JS_TICKET_PATH: &str = "/cgi-bin/ticket/getticket?type=jsapi";

/// A JS-SDK ticket with its expiry.
///
/// Shares the cache payload layout of [`AccessToken`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsTicket(AccessToken);

impl JsTicket {
    /// A non-positive lifetime falls back to the default of 7200 seconds.
    pub fn new(value: impl Into<String>, lifetime_seconds: i64) -> Self {
        Self(AccessToken::new(value, lifetime_seconds))
    }

    pub fn value(&self) -> &str {
        self.0.value()
    }

    pub fn lifetime_seconds(&self) -> i64 {
        self.0.lifetime_seconds()
    }
}

impl Expiring for JsTicket {
    fn remaining_seconds(&self) -> i64 {
        self.0.remaining_seconds()
    }
}

impl RawValue for JsTicket {
    fn raw_value(&self) -> &str {
        self.0.raw_value()
    }
}

impl CacheCodec for JsTicket {
    fn encode(&self) -> Result<Vec<u8>, CredentialError> {
        self.0.encode()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CredentialError> {
        AccessToken::decode(bytes).map(Self)
    }
}

#[derive(Debug, Deserialize)]
struct TicketResponse {
    #[serde(default)]
    ticket: String,
    #[serde(default)]
    expires_in: i64,
}

/// Fetches JS tickets through an authenticated client.
///
/// A rejected access token is renewed and the ticket request retried once
/// by the client's pipeline.
pub struct JsTicketFetcher {
    client: WeChatClient,
}

impl JsTicketFetcher {
    pub fn new(client: WeChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch<JsTicket> for JsTicketFetcher {
    async fn fetch(&self) -> Result<JsTicket, CredentialError> {
        let response = self
            .client
            .get(JS_TICKET_PATH, true)
            .await
            .map_err(credential_error)?;

        let body: TicketResponse =
            response
                .json()
                .map_err(|e| CredentialError::MalformedResponse {
                    message: e.to_string(),
                })?;
        if body.ticket.is_empty() {
            return Err(CredentialError::MalformedResponse {
                message: "response has no ticket".to_string(),
            });
        }

        Ok(JsTicket::new(body.ticket, body.expires_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_codec_round_trip() {
        let ticket = JsTicket::new("sM4AOVdWfPE4DxkXGEs8VM", 7200);
        let decoded = JsTicket::decode(&ticket.encode().unwrap()).unwrap();
        assert_eq!(decoded.value(), ticket.value());
        assert!(!decoded.is_expired());
    }

    #[test]
    fn test_ticket_default_lifetime() {
        assert_eq!(JsTicket::new("t", -1).lifetime_seconds(), 7200);
    }
}
