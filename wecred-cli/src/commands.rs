//! Command implementations.
//!
//! Each command writes its result to the given writer so it can be
//! exercised without a terminal.

use anyhow::{Context, Result, bail};
use chrono::SecondsFormat;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use wecred_client::{ApiResponse, ClientConfig, WeChatClient, load_config, load_config_from};
use wecred_core::{Expiring, MemoryCache, Secret};

/// Output format for `wecred token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub base_url: Option<String>,
}

/// Load the config file and apply overrides.
pub fn resolve_config(path: Option<&Path>, overrides: Overrides) -> Result<ClientConfig> {
    let mut config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    debug!("Loaded config from {:?}", config.config_path);

    if let Some(app_id) = overrides.app_id {
        config.app.app_id = app_id;
    }
    if let Some(app_secret) = overrides.app_secret {
        config.app.app_secret = Secret::new(app_secret);
    }
    if let Some(base_url) = overrides.base_url {
        config.base_api_url = base_url;
    }

    Ok(config)
}

/// Build a client with an in-process token cache.
pub fn build_client(config: ClientConfig) -> Result<WeChatClient> {
    let credentials = config.app.credentials();
    if !credentials.is_complete() {
        warn!("App credentials are incomplete; credentialed calls will fail");
    }

    WeChatClient::builder(credentials)
        .config(config)
        .cache(Arc::new(MemoryCache::new()))
        .build()
        .context("Failed to build client")
}

/// Print the current access token, or a freshly fetched one.
pub async fn token(
    client: &WeChatClient,
    refresh: bool,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let issued = if refresh {
        client.fetch_access_token().await
    } else {
        client.get_access_token().await
    }
    .with_context(|| format!("Failed to obtain access token for {}", client.app_id()))?;

    if let Some(e) = issued.persist_error() {
        debug!("Token not cached: {}", e);
    }

    let token = issued.credential();
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "app_id": client.app_id().as_str(),
                "access_token": token.value(),
                "expires_in": token.remaining_seconds(),
                "expires_at": token.expires_at().to_rfc3339_opts(SecondsFormat::Secs, true),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        }
        OutputFormat::Text => {
            writeln!(out, "{}", token.value())?;
        }
    }
    Ok(())
}

/// Issue a GET request and print the response body.
pub async fn get(
    client: &WeChatClient,
    path: &str,
    credential_required: bool,
    out: &mut impl Write,
) -> Result<()> {
    let response = client
        .get(path, credential_required)
        .await
        .with_context(|| format!("GET {} failed", path))?;
    print_response(&response, out)
}

/// Issue a POST request with a JSON body and print the response body.
pub async fn post(
    client: &WeChatClient,
    path: &str,
    body: &str,
    credential_required: bool,
    out: &mut impl Write,
) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(body).context("Request body is not valid JSON")?;
    if !payload.is_object() && !payload.is_array() {
        bail!("Request body must be a JSON object or array");
    }

    let response = client
        .post_json(path, &payload, credential_required)
        .await
        .with_context(|| format!("POST {} failed", path))?;
    print_response(&response, out)
}

fn print_response(response: &ApiResponse, out: &mut impl Write) -> Result<()> {
    if response.is_json() {
        let value: serde_json::Value = response.json()?;
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    } else {
        writeln!(out, "{}", response.text())?;
    }
    Ok(())
}
