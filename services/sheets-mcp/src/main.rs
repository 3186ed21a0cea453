//! Google Sheets MCP server
//!
//! Single-binary stdio service that:
//! 1. Resolves Google credentials once through the ordered strategy chain
//! 2. Serves MCP JSON-RPC on stdin/stdout
//! 3. Calls Sheets v4 and Drive v3 with the resolved credential
//!
//! `google-sheets-mcp login` runs the interactive OAuth flow instead and
//! writes the token file the chain reads on the next start.

mod backend;
mod config;
mod error;
mod login;
mod protocol;
mod provider_impl;
mod resources;
mod server;
mod tools;

use anyhow::{Context, Result};
use auth_chain::AuthEnv;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::backend::GoogleSheetsBackend;
use crate::config::Config;
use crate::provider_impl::CredentialProvider;
use crate::server::McpServer;

/// Command-line options: `[login] [--config <path>]`.
#[derive(Debug, Default, PartialEq)]
struct Cli {
    login: bool,
    config_path: Option<String>,
}

fn parse_args(args: &[String]) -> Cli {
    let mut cli = Cli::default();
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--config" => cli.config_path = rest.next().cloned(),
            "login" => cli.login = true,
            _ => {}
        }
    }
    cli
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr; stdout carries the protocol
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args);

    info!(version = env!("CARGO_PKG_VERSION"), "starting google-sheets-mcp");

    let (config_path, explicit) = Config::resolve_path(cli.config_path.as_deref());
    info!(path = %config_path.display(), explicit, "loading configuration");
    let config = Config::load(&config_path, explicit)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let env = AuthEnv::from_env().with_token_url(config.endpoints.token_url.clone());

    if cli.login {
        let stdin = BufReader::new(tokio::io::stdin());
        login::run(&env, &http, stdin, tokio::io::stderr()).await?;
        return Ok(());
    }

    let credential = match auth_chain::resolve(&env, &http).await {
        Ok(credential) => Arc::new(credential),
        Err(e) => {
            error!(error = %e, "failed to initialize Google credentials");
            return Err(e).context("authentication failed");
        }
    };
    info!(
        source = credential.source(),
        kind = credential.kind().as_str(),
        "Google credentials ready"
    );

    match config.server.drive_folder_id.as_deref() {
        Some(folder) => info!(folder, "using Drive folder context"),
        None => info!("no Drive folder configured, using My Drive"),
    }

    let provider = Arc::new(CredentialProvider::new(credential));
    let backend = Arc::new(GoogleSheetsBackend::new(
        http,
        provider,
        config.endpoints.sheets_url.clone(),
        config.endpoints.drive_url.clone(),
    ));
    let server = McpServer::new(
        backend,
        config.server.name.clone(),
        config.server.drive_folder_id.clone(),
    );

    info!("serving MCP on stdio");
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = server.serve(stdin, tokio::io::stdout()) => {
            result.context("stdio transport failed")?;
        }
        _ = shutdown_signal() => {}
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
