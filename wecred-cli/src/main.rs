//! wecred CLI
//!
//! Command-line interface for obtaining access tokens and calling APIs.
//!
//! # Usage
//!
//! ```bash
//! # Print the current access token
//! WECRED_APP_ID=wx-app WECRED_APP_SECRET=... wecred token
//!
//! # Force a new token and show its expiry
//! wecred token --refresh --format json
//!
//! # Call an API with the token attached
//! wecred get /cgi-bin/get_api_domain_ip
//!
//! # POST a JSON body
//! wecred post /cgi-bin/menu/create '{"button": []}'
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::{OutputFormat, Overrides};

#[derive(Parser)]
#[command(name = "wecred")]
#[command(about = "Access tokens and authenticated calls for WeChat APIs")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "WECRED_CONFIG")]
    config: Option<PathBuf>,

    /// App id, overriding the config file
    #[arg(long, global = true, env = "WECRED_APP_ID")]
    app_id: Option<String>,

    /// App secret, overriding the config file
    #[arg(long, global = true, env = "WECRED_APP_SECRET", hide_env_values = true)]
    app_secret: Option<String>,

    /// Base API URL, overriding the config file
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an access token
    Token {
        /// Fetch a new token instead of using a cached one
        #[arg(short, long)]
        refresh: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Send a GET request
    Get {
        /// API path (e.g., /cgi-bin/get_api_domain_ip) or absolute URL
        path: String,

        /// Do not attach an access token
        #[arg(long)]
        no_credential: bool,
    },

    /// Send a POST request with a JSON body
    Post {
        /// API path or absolute URL
        path: String,

        /// JSON request body
        body: String,

        /// Do not attach an access token
        #[arg(long)]
        no_credential: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = commands::resolve_config(
        cli.config.as_deref(),
        Overrides {
            app_id: cli.app_id,
            app_secret: cli.app_secret,
            base_url: cli.base_url,
        },
    )?;
    let client = commands::build_client(config)?;
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Token { refresh, format } => {
            commands::token(&client, refresh, format, &mut out).await
        }
        Commands::Get { path, no_credential } => {
            commands::get(&client, &path, !no_credential, &mut out).await
        }
        Commands::Post {
            path,
            body,
            no_credential,
        } => commands::post(&client, &path, &body, !no_credential, &mut out).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_command() {
        let cli = Cli::try_parse_from(["wecred", "token", "--refresh", "--format", "json"]).unwrap();
        match cli.command {
            Commands::Token { refresh, format } => {
                assert!(refresh);
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("expected token command"),
        }
    }

    #[test]
    fn test_parse_post_command() {
        let cli = Cli::try_parse_from([
            "wecred",
            "--verbose",
            "post",
            "/cgi-bin/menu/create",
            "{}",
            "--no-credential",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Post {
                path,
                body,
                no_credential,
            } => {
                assert_eq!(path, "/cgi-bin/menu/create");
                assert_eq!(body, "{}");
                assert!(no_credential);
            }
            _ => panic!("expected post command"),
        }
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["wecred", "token", "--format", "yaml"]).is_err());
    }
}
